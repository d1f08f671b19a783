//! Client error types.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    /// Authentication failed (missing, expired or rejected credential).
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_)) || matches!(self, Error::Api { status: 404, .. })
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_)) || matches!(self, Error::Api { status: 401, .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error body returned by the server (`{"detail": ...}`).
///
/// `detail` is a string for handled errors and a list of objects for
/// request validation failures.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    pub detail: serde_json::Value,
}

impl ErrorResponse {
    pub(crate) fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::Auth("expired".into()).is_auth_error());
        assert!(
            Error::Api {
                status: 401,
                message: "x".into()
            }
            .is_auth_error()
        );
        assert!(
            Error::Api {
                status: 503,
                message: "x".into()
            }
            .is_server_error()
        );
        assert!(Error::NotFound("n".into()).is_not_found());
        assert!(!Error::Config("c".into()).is_auth_error());
    }

    #[test]
    fn test_error_response_message() {
        let body: ErrorResponse = serde_json::from_str(r#"{"detail":"Not authenticated"}"#).unwrap();
        assert_eq!(body.message(), "Not authenticated");

        let body: ErrorResponse =
            serde_json::from_str(r#"{"detail":[{"loc":["query","limit"]}]}"#).unwrap();
        assert!(body.message().contains("limit"));
    }
}
