// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "Single-binary deployment over SSH: upload, swap, relaunch")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// JSON lines output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new skiff.yml configuration file
    Init {
        /// Service name used as the release prefix
        #[arg(long)]
        service: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Deploy the artifact to the configured target
    Deploy {
        /// Build identifier; defaults to `git rev-parse HEAD`
        #[arg(long)]
        build_id: Option<String>,

        /// Local artifact path; overrides the configured one
        #[arg(long)]
        artifact: Option<PathBuf>,

        /// Target as [user@]host[:port]; overrides the configured one
        #[arg(long)]
        target: Option<String>,

        /// Remote base directory; overrides the configured one
        #[arg(long)]
        directory: Option<String>,

        /// Port the deployed service listens on; overrides the configured one
        #[arg(long)]
        app_port: Option<u16>,

        /// Keep the local artifact after the deploy
        #[arg(long)]
        keep_artifact: bool,
    },
}
