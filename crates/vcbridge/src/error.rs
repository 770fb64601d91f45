//! Error types for vcbridge
//!
//! Design goals:
//! - Human-readable messages that name what went wrong
//! - No leakage of secrets (passwords never appear in any message)
//! - Clear categorization for programmatic handling

use thiserror::Error;

/// Result type alias using vcbridge's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// vcbridge error types.
#[derive(Error, Debug)]
pub enum Error {
    /// A required credential field is absent or empty.
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    /// Stored credential record could not be decoded.
    #[error("invalid credential record: {0}")]
    InvalidCredential(String),

    /// I/O error while reading a record or running a child process.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error from the HTTP client.
    #[error("network error: {0}")]
    Network(String),

    /// TLS configuration or handshake setup error.
    #[error("tls error: {0}")]
    Tls(String),

    /// A transport layer could not be configured.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Create a missing-field error for the named credential field.
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Self::Tls(err.to_string())
    }
}
