// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "intruder-cam")]
#[command(about = "Periodically capture the camera and submit frames to an intruder classifier")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(flatten)]
    overrides: cli::Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture on a schedule until stopped (default)
    Run,

    /// Run a single capture cycle and print its result
    Capture,

    /// List cameras and their front/back assignment
    Devices,

    /// Fetch past classifications from the server
    Reports,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=intruder_cam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("intruder_cam=info,warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.overrides.resolve()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        match cli.command.unwrap_or(Commands::Run) {
            Commands::Run => cli::run(config).await,
            Commands::Capture => cli::capture_once(config).await,
            Commands::Devices => cli::list_devices(config).await,
            Commands::Reports => cli::show_reports(config).await,
        }
    })
}
