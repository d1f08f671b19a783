//! Error types for the notification core.

/// Error type for notification operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// REST collaborator call failed.
    #[error("API error: {0}")]
    Client(#[from] stackit_client::Error),

    /// Push frame could not be decoded.
    #[error("malformed push event: {0}")]
    Decode(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The configured push endpoint can't be used.
    #[error("invalid push endpoint: {0}")]
    Endpoint(String),

    /// Send or receive on the push connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The alert could not be shown.
    #[error("alert failed: {0}")]
    Alert(String),
}

impl Error {
    /// Check if the server rejected the session credential.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Client(e) if e.is_auth_error())
    }
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, Error>;
