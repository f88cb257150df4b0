//! Cache error types.

use thiserror::Error;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors talking to the verdict cache. None are retried.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{command} rejected by server: {message}")]
    Server { command: String, message: String },

    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },

    #[error("stored value under {key} is not a verdict: {value:?}")]
    InvalidVerdict { key: String, value: String },
}
