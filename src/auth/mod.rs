pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    access::{Actor, Capability, Role},
    error::AppError,
    models::User,
    schema::users,
    state::AppState,
};

/// Identity resolved from a bearer token and re-read from the live user row.
///
/// The role claim inside the token is not trusted; the stored role governs.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    #[serde(rename = "id")]
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        let mut conn = state.db()?;
        let user: User = users::table
            .filter(users::email.eq(&claims.sub))
            .first(&mut conn)
            .optional()?
            .ok_or_else(AppError::unauthorized)?;

        let role = user.role.parse::<Role>().map_err(|err| {
            tracing::warn!(user_id = %user.id, error = %err, "user row carries an unknown role");
            AppError::unauthorized()
        })?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            email: user.email,
            role,
        })
    }
}

/// Caller with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        Capability::AdminOnly.check(user.role).ensure()?;
        Ok(AdminUser(user))
    }
}

/// Caller with the admin or recruiter role.
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthenticatedUser);

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        Capability::AdminOrRecruiter.check(user.role).ensure()?;
        Ok(StaffUser(user))
    }
}
