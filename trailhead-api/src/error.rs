//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::error::{ErrorKind, WriteFailure};
use serde::Serialize;
use std::fmt;
use thiserror::Error as ThisError;

/// Result type alias using the application error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
///
/// Operational variants (`BadRequest` through `RateLimitExceeded`) carry a
/// user-safe message that is surfaced verbatim. `Database`, `External`,
/// `Config` and `Internal` are unexpected faults: their detail goes to the
/// server log only and the client receives a generic message.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Malformed input, bad identifier, invalid reset token
    #[error("{0}")]
    BadRequest(String),

    /// Missing/invalid/expired credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but insufficient role
    #[error("{0}")]
    Forbidden(String),

    /// No such resource
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation
    #[error("{0}")]
    Conflict(String),

    /// Schema/DTO validation failure
    #[error("Invalid input data. {0}")]
    Validation(String),

    /// Rate limit exceeded
    #[error("Too many requests from this IP, please try again in an hour!")]
    RateLimitExceeded,

    /// Unexpected database failure
    #[error("{0}")]
    Database(Box<mongodb::error::Error>),

    /// Upstream collaborator (payments, email) failure
    #[error("External service error: {0}")]
    External(String),

    /// Unexpected internal fault
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
///
/// `status` follows the API envelope convention: `"fail"` for client errors,
/// `"error"` for server faults.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: if status_code.is_client_error() {
                "fail"
            } else {
                "error"
            },
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::External(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether this is an anticipated, user-facing failure.
    pub fn is_operational(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::Database(_) | Self::Internal(_) | Self::External(_)
        )
    }

    /// The message the client is allowed to see.
    pub fn public_message(&self) -> String {
        if self.is_operational() {
            self.to_string()
        } else {
            "Something went wrong.".to_string()
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if !self.is_operational() {
            tracing::error!(status = %status, "unexpected error: {self}");
        }

        let body = ErrorResponse::new(status, self.public_message());
        (status, Json(body)).into_response()
    }
}

fn duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == 11000,
        ErrorKind::Command(ce) => ce.code == 11000,
        _ => false,
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        if duplicate_key(&err) {
            Error::Conflict("Duplicate field value. Please use another value!".to_string())
        } else {
            Error::Database(Box::new(err))
        }
    }
}

impl From<bson::oid::Error> for Error {
    fn from(err: bson::oid::Error) -> Self {
        Error::BadRequest(format!("Invalid id: {err}"))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as JwtKind;
        match err.kind() {
            JwtKind::ExpiredSignature => {
                Error::Unauthorized("Your token has expired! Please log in again.".to_string())
            }
            _ => Error::Unauthorized("Invalid token. Please log in again!".to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{field}: {msg}"),
                    None => format!("{field}: {}", e.code),
                })
            })
            .collect();
        messages.sort();
        Error::Validation(messages.join(". "))
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON encoding failed: {err}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(format!("I/O error: {err}"))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::External(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for Error {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Error::BadRequest(format!("Invalid multipart payload: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::RateLimitExceeded.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            Error::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_status_field() {
        let fail = ErrorResponse::new(StatusCode::NOT_FOUND, "missing");
        assert_eq!(fail.status, "fail");

        let error = ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(error.status, "error");
    }

    #[test]
    fn test_internal_detail_is_not_leaked() {
        let err = Error::Internal("secret connection string".into());
        assert_eq!(err.public_message(), "Something went wrong.");

        let err = Error::NotFound("No tour found with that ID".into());
        assert_eq!(err.public_message(), "No tour found with that ID");
    }

    #[test]
    fn test_malformed_object_id_maps_to_bad_request() {
        let err: Error = bson::oid::ObjectId::parse_str("not-an-id").unwrap_err().into();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_garbage_token_maps_to_unauthorized() {
        let decode = jsonwebtoken::decode::<serde_json::Value>(
            "garbage",
            &jsonwebtoken::DecodingKey::from_secret(b"secret"),
            &jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256),
        );
        let err: Error = decode.unwrap_err().into();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_validation_errors_join_messages() {
        use validator::Validate;

        #[derive(Validate)]
        struct Probe {
            #[validate(length(min = 8, message = "must be at least 8 characters"))]
            password: String,
            #[validate(email(message = "must be a valid email"))]
            email: String,
        }

        let probe = Probe {
            password: "short".into(),
            email: "nope".into(),
        };
        let err: Error = probe.validate().unwrap_err().into();
        let text = err.to_string();
        assert!(text.contains("password: must be at least 8 characters"));
        assert!(text.contains("email: must be a valid email"));
    }
}
