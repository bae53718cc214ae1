// ABOUTME: Deployment coordinator: name, connect, upload, swap.
// ABOUTME: Strictly sequential stages; the session is closed on every exit path.

use super::error::{DeployError, Result, Stage};
use crate::command::CommandLine;
use crate::config::Config;
use crate::credential::CredentialSource;
use crate::release::{ReleaseId, ReleaseNamer};
use crate::swap::{self, LaunchSpec};
use crate::transport::{Connector, ProgressFn, Transport};
use std::path::Path;

/// Inputs for one deploy invocation.
#[derive(Debug)]
pub struct DeployRequest<'a> {
    /// Build identifier, e.g. a revision hash.
    pub build_id: &'a str,
    /// Local artifact to upload.
    pub artifact: &'a Path,
    /// Remove the local artifact when the invocation returns.
    pub cleanup_artifact: bool,
}

/// What a successful deploy produced.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub release_id: ReleaseId,
    pub remote_path: String,
}

/// Sequences one deployment against a single target host.
///
/// One coordinator invocation owns one transport session; concurrent deploys
/// to the same host are not coordinated beyond the uniqueness of release
/// ids (two swaps racing on one port are a documented limitation).
pub struct DeployCoordinator {
    namer: ReleaseNamer,
    config: Config,
    user: String,
    directory: String,
}

impl DeployCoordinator {
    pub fn new(config: Config) -> std::result::Result<Self, crate::release::ReleaseError> {
        let namer = ReleaseNamer::new(&config.service)?;
        let user = config.target.resolved_user();
        let directory = config.target.resolved_directory(&user);
        Ok(Self {
            namer,
            config,
            user,
            directory,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Run one deploy: release naming, connect, upload, swap.
    ///
    /// Upload progress is reported through `on_progress`. The local artifact
    /// is removed on every exit path when requested, and the session is
    /// closed unconditionally.
    pub async fn deploy<C: Connector>(
        &self,
        connector: &C,
        credentials: &dyn CredentialSource,
        request: DeployRequest<'_>,
        on_progress: ProgressFn<'_>,
    ) -> Result<DeployOutcome> {
        let _artifact = ArtifactGuard::new(request.artifact, request.cleanup_artifact);

        let release_id = self
            .namer
            .generate(request.build_id)
            .map_err(|e| DeployError::new(Stage::Name, e))?;
        tracing::info!(%release_id, "release named");

        let credential = credentials
            .credential()
            .map_err(|e| DeployError::new(Stage::Connect, e))?;
        let transport = connector
            .connect(&self.config.target, &self.user, &credential)
            .await
            .map_err(|e| DeployError::new(Stage::Connect, e))?;
        tracing::info!(host = %self.config.target.host, user = %self.user, "connected");

        let result = self
            .run_stages(&transport, &release_id, request.artifact, on_progress)
            .await;

        if let Err(e) = transport.close().await {
            tracing::warn!("session close failed: {e}");
        }

        result
    }

    async fn run_stages<T: Transport>(
        &self,
        transport: &T,
        release_id: &ReleaseId,
        artifact: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<DeployOutcome> {
        let remote_path = format!(
            "{}/{}",
            self.directory.trim_end_matches('/'),
            release_id
        );

        tracing::info!(%remote_path, "uploading artifact");
        if let Err(e) = transport.upload(artifact, &remote_path, on_progress).await {
            self.remove_partial_upload(transport, &remote_path).await;
            return Err(DeployError::new(Stage::Upload, e));
        }

        let launch = LaunchSpec {
            directory: self.directory.clone(),
            env_setup: self.config.env_setup.clone(),
        };
        tracing::info!(port = self.config.app_port, "swapping process");
        swap::swap(transport, self.config.app_port, &remote_path, &launch)
            .await
            .map_err(|e| DeployError::new(Stage::Swap, e))?;

        Ok(DeployOutcome {
            release_id: release_id.clone(),
            remote_path,
        })
    }

    /// Best-effort delete of a partial upload. Its own failure never
    /// escalates; the next deploy gets a fresh release name anyway.
    async fn remove_partial_upload<T: Transport>(&self, transport: &T, remote_path: &str) {
        let rm = CommandLine::new("rm").arg("-f").arg(remote_path);
        match transport.exec(&rm.to_string()).await {
            Ok(output) if !output.success() => {
                tracing::warn!(
                    %remote_path,
                    exit_code = output.exit_code,
                    "cleanup of partial upload failed"
                );
            }
            Ok(_) => tracing::debug!(%remote_path, "partial upload removed"),
            Err(e) => tracing::warn!(%remote_path, "cleanup of partial upload failed: {e}"),
        }
    }
}

/// Removes the local artifact on drop, on every exit path.
struct ArtifactGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> ArtifactGuard<'a> {
    fn new(path: &'a Path, armed: bool) -> Self {
        Self { path, armed }
    }
}

impl Drop for ArtifactGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(self.path) {
            tracing::warn!(path = %self.path.display(), "could not remove local artifact: {e}");
        }
    }
}
