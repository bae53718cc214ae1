// ABOUTME: Stage-tagged deployment errors.
// ABOUTME: Every failure names the stage it happened in, for fast diagnosis.

use crate::credential::CredentialError;
use crate::release::ReleaseError;
use crate::swap::SwapError;
use crate::transport;
use std::fmt;
use thiserror::Error;

/// The deployment stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Name,
    Connect,
    Upload,
    Swap,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Name => "release naming",
            Stage::Connect => "connect",
            Stage::Upload => "upload",
            Stage::Swap => "swap",
        };
        write!(f, "{name}")
    }
}

/// A deployment failure wrapped with the stage it occurred in.
#[derive(Debug, Error)]
#[error("deploy failed during {stage}: {source}")]
pub struct DeployError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl DeployError {
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// The underlying cause of a stage failure.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Transport(#[from] transport::Error),

    #[error(transparent)]
    Swap(#[from] SwapError),
}

pub type Result<T> = std::result::Result<T, DeployError>;
