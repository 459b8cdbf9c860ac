//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Token acquisition failed.
    #[error("Authentication failed: {0}")]
    Auth(#[from] graphlink_oauth::Error),

    /// No usable access token; the request was not sent.
    #[error("No usable access token: {0}")]
    MissingToken(String),

    /// Graph answered with an error status.
    #[error("Graph API error ({status}): {code}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Graph error code (e.g. `ErrorInvalidRecipients`).
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Transport failure talking to Graph.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid caller input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of [`Error`] for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Token acquisition or authorization failed.
    Auth,
    /// The API call failed or could not be made.
    Api,
}

impl Error {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(_) | Self::MissingToken(_) | Self::Api { status: 401, .. } => {
                ErrorKind::Auth
            }
            _ => ErrorKind::Api,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
