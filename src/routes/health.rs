use axum::{extract::State, http::StatusCode, response::Json};
use diesel::{dsl::sql, prelude::*, sql_types::Text};
use serde::Serialize;
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct DbPing {
    pub ok: bool,
    pub db: String,
    pub version: String,
}

pub async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn db_ping(State(state): State<AppState>) -> AppResult<Json<DbPing>> {
    let mut conn = state.db()?;
    let (db, version): (String, String) =
        diesel::select((sql::<Text>("current_database()"), sql::<Text>("version()")))
            .get_result(&mut conn)?;
    Ok(Json(DbPing {
        ok: true,
        db,
        version,
    }))
}
