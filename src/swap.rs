// ABOUTME: Process swap: kill whatever owns the app port, launch the new binary.
// ABOUTME: Port scan and kill are best-effort; the launch is detached, no health check.

use crate::command::{CommandLine, Script};
use crate::transport::{self, Transport};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("port scan failed: {0}")]
    PortScan(#[source] transport::Error),

    #[error("launch failed: {0}")]
    Launch(#[source] transport::Error),

    #[error("launch rejected by remote shell (exit {exit_code}): {stderr}")]
    LaunchRejected { exit_code: u32, stderr: String },
}

pub type Result<T> = std::result::Result<T, SwapError>;

/// How to start the new binary once it is in place.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Remote working directory for the launch.
    pub directory: String,
    /// Environment-preparation step run before the binary, verbatim
    /// (e.g. `. ./.env`). External to this component.
    pub env_setup: Option<String>,
}

/// Swap the process bound to `port` for `remote_binary`.
///
/// The old process is found via a port-to-pid lookup and killed best-effort:
/// nothing listening is success, and a failed kill only logs (a new process
/// that cannot bind the port fails loudly on its own). The launch is fully
/// detached so it outlives this session. Returns once the remote shell
/// accepts the launch command; whether the new process stays up is
/// deliberately not checked.
pub async fn swap<T: Transport>(
    transport: &T,
    port: u16,
    remote_binary: &str,
    launch: &LaunchSpec,
) -> Result<()> {
    let lookup = CommandLine::new("lsof")
        .arg("-t")
        .arg("-i")
        .arg(format!("tcp:{port}"));
    let scanned = transport
        .exec(&lookup.to_string())
        .await
        .map_err(SwapError::PortScan)?;

    // lsof exits non-zero when nothing matches; only stdout matters here.
    let pids = parse_pids(&scanned.stdout);
    tracing::debug!(port, pids = ?pids, "port scan complete");

    if pids.is_empty() {
        tracing::debug!(port, "nothing listening, skipping kill");
    } else {
        let kill = CommandLine::new("kill").args(pids.iter().map(|pid| pid.to_string()));
        match transport.exec(&kill.to_string()).await {
            Ok(output) if !output.success() => {
                tracing::warn!(
                    port,
                    exit_code = output.exit_code,
                    stderr = %output.stderr.trim(),
                    "kill of old process failed, continuing"
                );
            }
            Ok(_) => tracing::debug!(port, "old process killed"),
            Err(e) => {
                tracing::warn!(port, "kill of old process failed, continuing: {e}");
            }
        }
    }

    let mut script = Script::new().then(CommandLine::new("cd").arg(&launch.directory));
    if let Some(env_setup) = &launch.env_setup {
        script = script.then_raw(env_setup.clone());
    }
    let script = script
        .then(CommandLine::new("chmod").arg("+x").arg(remote_binary))
        .detach(CommandLine::new(remote_binary));

    let launched = transport
        .exec(&script.render())
        .await
        .map_err(SwapError::Launch)?;

    if !launched.success() {
        return Err(SwapError::LaunchRejected {
            exit_code: launched.exit_code,
            stderr: launched.stderr.trim().to_string(),
        });
    }

    tracing::debug!(binary = remote_binary, "new process launched detached");
    Ok(())
}

fn parse_pids(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .collect()
}
