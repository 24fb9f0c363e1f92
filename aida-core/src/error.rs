//! Error types for the AIDA chat client

use thiserror::Error;

/// The main error type for AIDA client operations
#[derive(Error, Debug)]
pub enum Error {
    /// Credentials are missing or were rejected by the backend
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The backend could not be reached or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// The backend was reached but reported a failure
    #[error("API error: {0}")]
    Api(String),

    /// Local persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Whether this error came from the remote side of a call
    /// (auth, network or API), as opposed to local failures.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Network(_) | Error::Api(_))
    }
}

/// A specialized Result type for AIDA client operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
