//! raft-snapshot-agent
//!
//! Periodically saves Vault raft snapshots to local and S3 destinations.

use anyhow::{bail, Context};
use clap::Parser;
use snapshot_agent::agent::{CycleOutcome, SnapshotAgent};
use snapshot_agent::config::Configuration;
use snapshot_agent::telemetry::{self, LogFormat};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "raft-snapshot-agent")]
#[command(about = "Periodic raft snapshots for Vault", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, short = 'c')]
    config: PathBuf,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Configuration::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let mut agent = SnapshotAgent::from_config(&config).await?;

    if cli.once {
        return match agent.run_cycle().await? {
            CycleOutcome::NotLeader => Ok(()),
            CycleOutcome::Completed(report) if report.failed() > 0 => {
                bail!("{} of {} destinations failed", report.failed(), report.destinations.len())
            }
            CycleOutcome::Completed(_) => Ok(()),
        };
    }

    agent.run_until(shutdown_signal()).await?;
    info!("Snapshot agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
