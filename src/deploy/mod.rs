// ABOUTME: Deployment orchestration module.
// ABOUTME: Exports the coordinator and stage-tagged error types.

mod coordinator;
mod error;

pub use coordinator::{DeployCoordinator, DeployOutcome, DeployRequest};
pub use error::{DeployError, Result, Stage, StageError};
