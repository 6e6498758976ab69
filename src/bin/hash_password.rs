use std::env;
use std::process;

fn main() {
    let Some(password) = env::args().nth(1) else {
        eprintln!("Usage: hash_password <password>");
        process::exit(1);
    };

    match jobboard::auth::password::hash_password(&password) {
        Ok(hash) => println!("{hash}"),
        Err(err) => {
            eprintln!("hashing failed: {err}");
            process::exit(1);
        }
    }
}
