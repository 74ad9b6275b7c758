//! Client error types
//!
//! Every fallible operation in the crate returns [`ClientError`]. Callers that
//! need to branch on the failure class use [`ClientError::kind`].

use thiserror::Error;

/// Coarse, machine-checkable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Authoritative DNS lookup failed or returned no records
    Resolution,
    /// Connection failure, unexpected HTTP status or malformed response
    Network,
    /// A request exceeded its deadline
    Timeout,
    /// Invalid local input
    Validation,
    /// Local filesystem failure
    Io,
}

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Resolution error for {hostname}: {message}")]
    Resolution { hostname: String, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Part {part_number} response carried no ETag header")]
    MissingEtag { part_number: u32 },

    #[error("Endpoint {hostname} not ready after {attempts} attempts")]
    ProbeExhausted { hostname: String, attempts: u32 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Resolution { .. } => ErrorKind::Resolution,
            ClientError::Network(_)
            | ClientError::HttpStatus { .. }
            | ClientError::MissingEtag { .. }
            | ClientError::ProbeExhausted { .. } => ErrorKind::Network,
            ClientError::Timeout(_) => ErrorKind::Timeout,
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether a caller may reasonably retry the whole operation
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Resolution { .. }
            | ClientError::Network(_)
            | ClientError::Timeout(_)
            | ClientError::ProbeExhausted { .. } => true,
            ClientError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ClientError>;
