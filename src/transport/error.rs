// ABOUTME: Transport-specific error types.
// ABOUTME: Separates auth, network, and transfer failures for clean attribution.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed: no valid credentials")]
    Auth,

    #[error("network error: {0}")]
    Network(String),

    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("command timed out after {0:?}")]
    CommandTimeout(Duration),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("SSH agent not available: {0}")]
    AgentUnavailable(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("transfer interrupted after {sent} of {total} bytes: {reason}")]
    TransferInterrupted {
        sent: u64,
        total: u64,
        reason: String,
    },

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
