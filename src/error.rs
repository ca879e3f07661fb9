// Error types for the circles data layer.
// Covers document store transport failures, path parsing, and configuration errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CirclesError {
    #[error("Document store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired credentials")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Document store error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid document path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Malformed document response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl CirclesError {
    /// Whether a manual retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CirclesError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            CirclesError::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<figment::Error> for CirclesError {
    fn from(e: figment::Error) -> Self {
        CirclesError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CirclesError>;
