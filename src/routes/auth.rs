use axum::{extract::State, http::StatusCode, Json};
use diesel::{prelude::*, result::DatabaseErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    access::Role,
    auth::{password, AuthenticatedUser},
    cascade::{DeletionPlan, DeletionRoot},
    error::{AppError, AppResult},
    models::{NewUser, User},
    schema::users,
    state::AppState,
};

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn credentials(email: Option<String>, password: Option<String>) -> AppResult<(String, String)> {
    let email = email.as_deref().map(normalize_email).unwrap_or_default();
    let password = password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    Ok((email, password))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let (email, password) = credentials(payload.email, payload.password)?;

    // Admins are seeded by operators, never self-registered.
    let role = match payload.role.as_deref() {
        None => Role::User,
        Some(raw) => match raw.parse::<Role>() {
            Ok(role @ (Role::User | Role::Recruiter)) => role,
            Ok(Role::Admin) => return Err(AppError::forbidden("cannot sign up as admin")),
            Err(err) => return Err(AppError::bad_request(err.to_string())),
        },
    };

    let password_hash = password::hash_password(&password)?;
    let new_user = NewUser {
        id: Uuid::new_v4(),
        email: email.clone(),
        password_hash,
        role: role.as_str().to_string(),
    };

    let mut conn = state.db()?;
    match diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("email already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    tracing::info!(user_id = %new_user.id, role = %role, "user signed up");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: new_user.id,
            email,
            role,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (email, password) = credentials(payload.email, payload.password)?;
    let mut conn = state.db()?;

    let user: User = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    let access_token = state.jwt.generate_token(&user.email, &user.role)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.jwt.expires_in_seconds(),
    }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}

pub async fn delete_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let plan = DeletionPlan::for_root(DeletionRoot::User(user.user_id));
    conn.transaction::<_, AppError, _>(|conn| {
        plan.execute(conn)?;
        Ok(())
    })?;

    tracing::info!(user_id = %user.user_id, "account deleted by its owner");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = credentials(Some(" ".into()), Some("pw".into())).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(credentials(Some("a@x.com".into()), None).is_err());
        assert!(credentials(Some("a@x.com".into()), Some("pw".into())).is_ok());
    }
}
