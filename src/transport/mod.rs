// ABOUTME: Remote transport abstraction: command execution and file upload.
// ABOUTME: The production implementation runs over SSH; tests use mocks.

mod error;
mod ssh;

pub use error::{Error, Result};
pub use ssh::{SshConnector, SshTransport, TransportOptions};

use crate::credential::Credential;
use crate::config::TargetConfig;
use async_trait::async_trait;
use std::path::Path;

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Progress of one file transfer.
///
/// `sent` is monotonically non-decreasing across callbacks; the terminal
/// callback has `sent == total`, including for zero-byte files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub sent: u64,
    pub total: u64,
}

impl TransferProgress {
    pub fn is_complete(&self) -> bool {
        self.sent == self.total
    }
}

/// Callback invoked after each uploaded chunk.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(TransferProgress) + Send);

/// Tracks transfer progress and decides which callbacks to emit.
///
/// Kept separate from the SSH plumbing so the callback contract is
/// testable without a server.
#[derive(Debug)]
pub struct ProgressTracker {
    sent: u64,
    total: u64,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        Self { sent: 0, total }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Record `n` more bytes and return the progress to report.
    pub fn advance(&mut self, n: u64) -> TransferProgress {
        self.sent += n;
        TransferProgress {
            sent: self.sent,
            total: self.total,
        }
    }

    /// The terminal callback for transfers that emitted no chunks.
    ///
    /// A zero-byte file produces no `advance` calls, yet the contract
    /// requires one final callback with `sent == total`.
    pub fn finish(&self) -> Option<TransferProgress> {
        if self.sent == 0 {
            Some(TransferProgress {
                sent: self.sent,
                total: self.total,
            })
        } else {
            None
        }
    }
}

/// An authenticated remote session.
///
/// `exec` does not interpret exit codes: commands with benign non-zero
/// exits (like killing a process that may not exist) are the caller's
/// business. `close` is idempotent and safe on failed sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    async fn upload(
        &self,
        local: &Path,
        remote: &str,
        on_progress: ProgressFn<'_>,
    ) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Establishes transport sessions.
///
/// Split from [`Transport`] so the coordinator can be driven by a mock
/// connector in tests, and so connect-stage failures attribute cleanly.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    async fn connect(
        &self,
        target: &TargetConfig,
        user: &str,
        credential: &Credential,
    ) -> Result<Self::Transport>;
}
