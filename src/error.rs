//! Error types for RPC operations
//!
//! Only `Timeout` and `Remote` reach application code as outcomes of
//! `execute`; transport and decode failures are contained at the call site or
//! inside the receive loop.

use serde_json::Value;
use thiserror::Error;

/// Main error type for RPC operations
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request {id} timed out after {timeout_ms}ms")]
    Timeout { id: String, timeout_ms: u64 },

    /// Reply explicitly carried an error payload. The payload is preserved
    /// verbatim from the wire document.
    #[error("remote error for request {id}")]
    Remote { id: String, error: Value },

    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("JSON encode/decode failed")]
    Malformed(#[source] serde_json::Error),

    #[error("request id {0} is already in flight")]
    DuplicateId(String),

    #[error("connection is closed")]
    Closed,

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl RpcError {
    /// Create a timeout error
    pub fn timeout(id: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            id: id.into(),
            timeout_ms,
        }
    }

    /// Create a remote error carrying the reply's error payload verbatim
    pub fn remote(id: impl Into<String>, error: Value) -> Self {
        Self::Remote {
            id: id.into(),
            error,
        }
    }

    /// True when this is the distinct timeout outcome of `execute`
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;
