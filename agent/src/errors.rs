//! Error types for the DDI agent

use thiserror::Error;

/// Errors raised by the byte-stream transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a firmware installer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    #[error("Installer not started")]
    NotStarted,

    #[error("Image size mismatch: expected {expected} bytes, wrote {written}")]
    SizeMismatch { expected: u64, written: u64 },

    #[error("Read from transport failed after {written} bytes: {reason}")]
    Stream { written: u64, reason: String },

    #[error("Server refused download with status {0}")]
    Refused(u16),

    #[error("Installer error #{code}: {message}")]
    Device { code: i32, message: String },
}

impl InstallError {
    /// Numeric code in the style of a flash updater's error register
    pub fn code(&self) -> i32 {
        match self {
            InstallError::NotStarted => 1,
            InstallError::SizeMismatch { .. } => 2,
            InstallError::Stream { .. } => 3,
            InstallError::Refused(_) => 4,
            InstallError::Device { code, .. } => *code,
        }
    }
}

/// Main error type for the DDI agent
#[derive(Error, Debug)]
pub enum DdiError {
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    TransportError(#[from] TransportError),

    #[error("Install error: {0}")]
    InstallError(#[from] InstallError),

    #[error("HTTP error {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed response: {0}")]
    ParseError(String),

    #[error("Response body exceeds {0} bytes")]
    DocumentTooLarge(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

