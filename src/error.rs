use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::models::ErrorResponse;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy for the whole service. Handlers convert these into the
/// `{"error": <kind>, "message": <text>}` envelope; only the coarse kind
/// crosses the HTTP boundary, details stay in the logs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no jokes found matching the given criteria")]
    NotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("setup and punchline are required")]
    MissingFields,

    #[error("invalid JSON request body")]
    InvalidJson,

    #[error("missing or invalid API token")]
    Unauthorized,

    #[error("too many requests")]
    RateLimited,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Machine-readable error kind used in the response envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound => "not_found",
            Error::InvalidInput(_) => "invalid_input",
            Error::MissingFields => "missing_fields",
            Error::InvalidJson => "invalid_json",
            Error::Unauthorized => "unauthorized",
            Error::RateLimited => "rate_limit_exceeded",
            Error::Database(_) | Error::Config(_) | Error::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) | Error::MissingFields | Error::InvalidJson => {
                StatusCode::BAD_REQUEST
            }
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::Database(_) | Error::Config(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Human-readable message for the envelope. Internal failures get a
    /// generic message so storage details never leak to clients.
    fn public_message(&self) -> String {
        match self {
            Error::NotFound => "No jokes found matching your criteria".to_string(),
            Error::InvalidInput(_) => "Invalid search query, category, or tags".to_string(),
            Error::MissingFields => "Setup and punchline are required".to_string(),
            Error::InvalidJson => "Invalid JSON request body".to_string(),
            Error::Unauthorized => "Missing or invalid API token".to_string(),
            Error::RateLimited => "Too many requests, please try again later".to_string(),
            Error::Database(_) | Error::Config(_) | Error::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err = Error::NotFound;
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_invalid_input_maps_to_400() {
        let err = Error::InvalidInput("empty category".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_missing_fields_maps_to_400() {
        let err = Error::MissingFields;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "missing_fields");
    }

    #[test]
    fn test_rate_limited_maps_to_429() {
        let err = Error::RateLimited;
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.kind(), "rate_limit_exceeded");
    }

    #[test]
    fn test_database_errors_are_internal_and_generic() {
        let err = Error::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), "internal_error");
        // Storage details must not reach the client.
        assert_eq!(err.public_message(), "An internal error occurred");
    }
}
