//! Error types for Beacon protocol operations

use thiserror::Error;

/// Result type alias for Beacon protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while addressing peers, decoding wire messages or
/// accessing storage
#[derive(Debug, Error)]
pub enum Error {
    // ============ Identifier Errors ============
    /// Malformed peer identifier
    #[error("Invalid identifier value: {0}")]
    InvalidValue(String),

    // ============ Wire Decoding Errors ============
    /// Unknown `type` discriminator for the given protocol version
    #[error("Unknown message type '{message_type}' for protocol version {version}")]
    UnknownType {
        version: String,
        message_type: String,
    },

    /// The message body does not match the shape declared by its discriminator
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The message declares a protocol version this SDK does not speak
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    // ============ Encoding Errors ============
    /// The canonical message has no representation in the target version
    #[error("Message '{message}' cannot be represented in protocol version {version}")]
    UnsupportedForVersion { version: String, message: String },

    /// No handler is registered for the blockchain identifier
    #[error("Unsupported blockchain: {0}")]
    UnsupportedChain(String),

    // ============ Semantic Errors ============
    /// Inconsistent field combination in a response
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// A response does not match any known peer
    #[error("Origin mismatch: {0}")]
    OriginMismatch(String),

    // ============ Storage Errors ============
    /// Storage collaborator failure
    #[error("Storage error: {0}")]
    Storage(String),

    // ============ Serialization Errors ============
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for [`Error::UnknownType`]
    pub fn unknown_type(version: impl Into<String>, message_type: impl Into<String>) -> Self {
        Error::UnknownType {
            version: version.into(),
            message_type: message_type.into(),
        }
    }

    /// Shorthand for [`Error::UnsupportedForVersion`]
    pub fn unsupported_for_version(version: impl Into<String>, message: impl Into<String>) -> Self {
        Error::UnsupportedForVersion {
            version: version.into(),
            message: message.into(),
        }
    }

    /// Check if this error was raised while decoding wire input
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownType { .. }
                | Error::MalformedPayload(_)
                | Error::UnsupportedVersion(_)
                | Error::InvalidMessage(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidValue(e.to_string())
    }
}
