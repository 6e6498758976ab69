use std::env;

use anyhow::{bail, Context, Result};
use diesel::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use jobboard::{
    access::Role,
    auth::password,
    config::AppConfig,
    db,
    models::NewUser,
    schema::users,
};

const USAGE: &str = "Usage:\n  maintenance migrate\n  maintenance create-user <email> <password> <role>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["migrate"] => migrate(),
        ["create-user", email, password, role] => create_user(email, password, role),
        [cmd, ..] => {
            eprintln!("Unknown or incomplete command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        [] => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }
}

fn connect() -> Result<db::PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded jobboard configuration"
    );
    db::init_pool_with_size(&config.database_url, 1)
}

fn migrate() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    let applied = db::run_migrations(&mut conn)?;
    println!("Applied {applied} migration(s).");
    Ok(())
}

fn create_user(email: &str, plain_password: &str, role: &str) -> Result<()> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || plain_password.is_empty() {
        bail!("email and password must not be empty");
    }
    let role: Role = role.parse().map_err(|err| anyhow::anyhow!("{err}"))?;

    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let user = NewUser {
        id: Uuid::new_v4(),
        email: email.clone(),
        password_hash: password::hash_password(plain_password)?,
        role: role.as_str().to_string(),
    };
    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)
        .with_context(|| format!("failed to insert user {email}"))?;

    println!("Created {role} {email} ({})", user.id);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
