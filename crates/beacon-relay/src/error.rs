//! Error types for the relay client

use thiserror::Error;

/// Relay client errors
#[derive(Debug, Error)]
pub enum RelayError {
    // ============ Authorization Errors ============
    /// An authenticated operation was attempted before login
    #[error("Operation '{0}' requires authorization")]
    RequiresAuthorization(String),

    /// Login did not produce an access token
    #[error("Login failed: {0}")]
    Login(String),

    // ============ Sync Errors ============
    /// The poll loop gave up after too many consecutive sync failures
    #[error("Sync failed {0} times in a row, polling halted")]
    MaxRetriesExceeded(u32),

    /// The client was stopped
    #[error("Relay client stopped")]
    Stopped,

    // ============ Transport Errors ============
    /// Connection, timeout or body read failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status returned by the relay
    #[error("HTTP {status} from relay{}: {message}", errcode_suffix(.errcode))]
    Http {
        status: u16,
        errcode: Option<String>,
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ============ Room Errors ============
    /// No known room matches
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    // ============ Protocol Errors ============
    /// A payload could not be sealed or opened; returned by [`PayloadCipher`]
    /// implementations outside this crate
    ///
    /// [`PayloadCipher`]: crate::transport::PayloadCipher
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// Beacon message or identifier error
    #[error(transparent)]
    Protocol(#[from] beacon_core::Error),
}

impl RelayError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Network(_) => true,
            RelayError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Relay error code (`M_FORBIDDEN`, ...), if the relay sent one
    pub fn errcode(&self) -> Option<&str> {
        match self {
            RelayError::Http { errcode, .. } => errcode.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RelayError::Serialization(err.to_string())
        } else {
            RelayError::Network(err.to_string())
        }
    }
}

fn errcode_suffix(errcode: &Option<String>) -> String {
    errcode
        .as_ref()
        .map(|code| format!(" ({code})"))
        .unwrap_or_default()
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RelayError>;
