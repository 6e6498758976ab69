use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use std::fmt::Display;

use crate::applications::LifecycleError;
use crate::notifications::NotificationError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "precondition_failed", message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "resource not found")
    }

    pub fn not_found_msg(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    /// The cause is logged; clients only see a generic message.
    pub fn internal<E: Display>(error: E) -> Self {
        tracing::error!(error = %error, "internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal server error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.kind,
            message: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found(),
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::conflict("resource already exists")
            }
            _ => AppError::internal(value),
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::JobNotFound => AppError::not_found_msg("job not found"),
            LifecycleError::ApplicationNotFound => AppError::not_found_msg("application not found"),
            LifecycleError::AlreadyApplied => AppError::conflict("application already exists"),
            LifecycleError::AlreadyMatched => AppError::conflict("application already matched"),
            LifecycleError::ProfileRequired => {
                AppError::precondition_failed("profile required before applying")
            }
            LifecycleError::IncompleteProfile => AppError::precondition_failed(
                "profile must include contact email and CV before applying",
            ),
            LifecycleError::NotCompanyOwner => {
                AppError::forbidden("application belongs to another company")
            }
            LifecycleError::Database(err) => AppError::from(err),
        }
    }
}

impl From<NotificationError> for AppError {
    fn from(value: NotificationError) -> Self {
        match value {
            NotificationError::NotFound => AppError::not_found_msg("notification not found"),
            NotificationError::Database(err) => AppError::from(err),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::AppError;
    use crate::applications::LifecycleError;

    #[test]
    fn lifecycle_errors_map_to_taxonomy() {
        let cases = [
            (LifecycleError::JobNotFound, StatusCode::NOT_FOUND, "not_found"),
            (LifecycleError::AlreadyApplied, StatusCode::CONFLICT, "conflict"),
            (LifecycleError::AlreadyMatched, StatusCode::CONFLICT, "conflict"),
            (
                LifecycleError::ProfileRequired,
                StatusCode::BAD_REQUEST,
                "precondition_failed",
            ),
            (
                LifecycleError::IncompleteProfile,
                StatusCode::BAD_REQUEST,
                "precondition_failed",
            ),
            (LifecycleError::NotCompanyOwner, StatusCode::FORBIDDEN, "forbidden"),
        ];

        for (error, status, kind) in cases {
            let mapped = AppError::from(error);
            assert_eq!(mapped.status(), status);
            assert_eq!(mapped.kind(), kind);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::internal("connection refused on 10.0.0.3:5432");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("10.0.0.3"));
    }

    #[test]
    fn diesel_not_found_is_not_found() {
        let err = AppError::from(diesel::result::Error::NotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
