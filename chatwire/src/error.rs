//! Error types for chatwire clients.

use thiserror::Error;

/// Result type for chatwire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// chatwire client errors.
///
/// Inbound traffic never produces an `Err` that escapes a client: these values
/// are delivered to error callbacks instead. Outbound operations return them
/// directly.
#[derive(Debug, Error)]
pub enum Error {
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The transport socket refused or failed a write.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// No transport socket is connected.
    #[error("Not connected to server")]
    NotConnected,

    /// Server answered a request with an error object.
    #[error("Server error {code}: {message}")]
    Server { code: i64, message: String },

    /// An inbound message could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The connection was torn down while the request was pending.
    #[error("Connection closed before a response arrived")]
    Disconnected,

    /// Configuration rejected by `validate()`.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a server error from an RPC error object.
    pub fn server(code: i64, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Server error code, if this is a server error.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}
