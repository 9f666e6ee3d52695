//! Shared error type across udprpc crates.

use thiserror::Error;

/// Stable status codes (logs, metrics labels, test vectors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Truncated or malformed byte stream.
    Framing,
    /// Parity trailer mismatch.
    Integrity,
    /// Type or field unknown to the receiver.
    Schema,
    /// Domain handler failure.
    Handler,
    /// Invalid input outside the wire format (config, payload fields).
    BadRequest,
    /// Socket or filesystem failure.
    Io,
    /// Internal error.
    Internal,
}

impl StatusCode {
    /// String representation used in logs and vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Framing => "FRAMING_ERROR",
            StatusCode::Integrity => "INTEGRITY_ERROR",
            StatusCode::Schema => "SCHEMA_ERROR",
            StatusCode::Handler => "HANDLER_ERROR",
            StatusCode::BadRequest => "BAD_REQUEST",
            StatusCode::Io => "IO_ERROR",
            StatusCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("framing error: {0}")]
    Framing(String),
    #[error("integrity error: parity trailer {actual:#04x}, computed {expected:#04x}")]
    Integrity { expected: u8, actual: u8 },
    #[error("schema error: {0}")]
    Schema(String),
    #[error("{0}")]
    Handler(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("io: {0}")]
    Io(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RpcError {
    /// Map an error to its stable status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RpcError::Framing(_) => StatusCode::Framing,
            RpcError::Integrity { .. } => StatusCode::Integrity,
            RpcError::Schema(_) => StatusCode::Schema,
            RpcError::Handler(_) => StatusCode::Handler,
            RpcError::BadRequest(_) => StatusCode::BadRequest,
            RpcError::Io(_) => StatusCode::Io,
            RpcError::Internal(_) => StatusCode::Internal,
        }
    }

    /// Errors raised while turning a datagram into an envelope.
    /// These are answered with a synthesized reply and never recorded.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            RpcError::Framing(_) | RpcError::Integrity { .. } | RpcError::Schema(_)
        )
    }
}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        RpcError::Io(e.to_string())
    }
}
