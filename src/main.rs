// ABOUTME: Entry point for the skiff CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use skiff::config::{self, Config, TargetConfig};
use skiff::deploy::{DeployCoordinator, DeployRequest};
use skiff::error::{Error, Result};
use skiff::output::{Output, OutputMode};
use skiff::revision;
use skiff::transport::{SshConnector, TransferProgress};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    if let Err(e) = run(cli, &mut output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<()> {
    match cli.command {
        Commands::Init { service, force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, service.as_deref(), force)
        }
        Commands::Deploy {
            build_id,
            artifact,
            target,
            directory,
            app_port,
            keep_artifact,
        } => {
            let cwd = env::current_dir()?;
            let mut config = Config::discover(&cwd)?;

            // Apply CLI overrides
            if let Some(t) = target {
                config.target = TargetConfig::parse(&t).map_err(Error::InvalidConfig)?;
            }
            if let Some(d) = directory {
                config.target.directory = Some(d);
            }
            if let Some(p) = app_port {
                config.app_port = p;
            }
            if let Some(a) = artifact {
                config.artifact = a;
            }
            if keep_artifact {
                config.cleanup_artifact = false;
            }

            deploy(config, build_id, output).await
        }
    }
}

/// Run one deploy against the configured target.
async fn deploy(config: Config, build_id: Option<String>, output: &mut Output) -> Result<()> {
    output.start_timer();

    let artifact = config.artifact.clone();
    if !artifact.is_file() {
        return Err(Error::ArtifactNotFound(artifact));
    }

    let build_id = revision::resolve_build_id(build_id).await?;

    let host = config.target.host.clone();
    let service = config.service.clone();
    let cleanup_artifact = config.cleanup_artifact;

    let connector = SshConnector::new(config.transport_options());
    let credentials = config.credential_source();
    let coordinator = DeployCoordinator::new(config)?;

    output.progress(&format!(
        "Deploying {service} ({build_id}) to {}@{host}",
        coordinator.user()
    ));

    let request = DeployRequest {
        build_id: &build_id,
        artifact: &artifact,
        cleanup_artifact,
    };

    let shared_output: &Output = output;
    let mut on_progress = |progress: TransferProgress| shared_output.transfer_progress(progress);

    let outcome = coordinator
        .deploy(&connector, credentials.as_ref(), request, &mut on_progress)
        .await?;

    output.success(&format!(
        "Deployed {} to {host}:{}",
        outcome.release_id, outcome.remote_path
    ));
    Ok(())
}
