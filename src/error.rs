use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::entities::order::Status;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Store(#[from] DbErr),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Store(_) => "STORE_FAILURE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// A write rejected by a unique or foreign key constraint becomes a
    /// `Conflict`; any other store error is passed through.
    pub fn conflict_on_constraint(err: DbErr, message: &str) -> Self {
        match err.sql_err() {
            Some(
                SqlErr::UniqueConstraintViolation(_) | SqlErr::ForeignKeyConstraintViolation(_),
            ) => Self::Conflict(message.to_owned()),
            _ => Self::Store(err),
        }
    }

    /// Text sent to the client. Store and internal failures stay opaque.
    pub fn public_message(&self) -> String {
        match self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_owned(),
            other => other.to_string(),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: &'static str,
}

/// Attached to failed responses so the logging middleware can report the
/// full detail that is kept out of the body.
#[derive(Clone, Debug)]
pub struct LoggedError {
    pub code: &'static str,
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.public_message(),
            code: self.code(),
        };
        let mut response = (self.status(), Json(body)).into_response();
        response.extensions_mut().insert(LoggedError {
            code: self.code(),
            detail: self.to_string(),
        });
        response
    }
}

/// `Json<T>` that also runs `validator` rules. Both malformed bodies and
/// rule violations surface as `ApiError::Validation`.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_are_opaque() {
        let err = ApiError::Store(DbErr::Custom("no such table: orders".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "STORE_FAILURE");
        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.to_string().contains("no such table"));
    }

    #[test]
    fn transition_errors_are_bad_requests() {
        let err = ApiError::InvalidTransition {
            from: Status::Delivered,
            to: Status::Cancelled,
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Cannot move order from Delivered to Cancelled");
    }

    #[test]
    fn response_carries_logged_detail() {
        let response = ApiError::Internal("token signing failed".into()).into_response();
        let logged = response.extensions().get::<LoggedError>().unwrap();
        assert_eq!(logged.code, "INTERNAL_ERROR");
        assert!(logged.detail.contains("token signing failed"));
    }
}
