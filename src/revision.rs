// ABOUTME: Build identifier resolution from source control.
// ABOUTME: Falls back to `git rev-parse HEAD` when no build id is given.

use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),

    #[error("git rev-parse failed (exit {code:?}): {stderr}")]
    GitFailed { code: Option<i32>, stderr: String },

    #[error("git rev-parse produced no output")]
    Empty,
}

pub type Result<T> = std::result::Result<T, RevisionError>;

/// Resolve the build id: an explicit value wins, otherwise the current
/// revision hash of the working directory.
pub async fn resolve_build_id(explicit: Option<String>) -> Result<String> {
    if let Some(build_id) = explicit {
        return Ok(build_id);
    }

    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(RevisionError::GitFailed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let revision = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if revision.is_empty() {
        return Err(RevisionError::Empty);
    }
    Ok(revision)
}
