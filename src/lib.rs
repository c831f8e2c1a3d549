//! # raft-snapshot-agent
//!
//! Periodically exports raft snapshots from a Vault cluster and persists them
//! to local directories and S3-compatible object storage.
//!
//! ## Overview
//!
//! Each cycle runs strictly in this order:
//!
//! 1. renew the Vault credential if it is due ([`auth::CredentialStore`]),
//! 2. ask Vault whether this node is the raft leader ([`vault::LeadershipGate`]),
//! 3. export the snapshot ([`vault::SnapshotSource`]),
//! 4. hand the snapshot to every configured writer ([`writer::SnapshotWriter`]),
//!    each of which trims its own destination ([`retention`]).
//!
//! Authentication, leadership and export failures stop the agent. Writer
//! failures are reported per destination and never stop the other writers.
//!
//! ```no_run
//! use snapshot_agent::agent::SnapshotAgent;
//! use snapshot_agent::config::Configuration;
//!
//! # async fn example() -> snapshot_agent::Result<()> {
//! let config = Configuration::from_file("/etc/vault.d/snapshot.json")?;
//! let mut agent = SnapshotAgent::from_config(&config).await?;
//! agent.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: configuration file model and validation
//! - [`auth`]: credential lifecycle and login strategies
//! - [`vault`]: Vault HTTP client, leadership gate and snapshot source
//! - [`snapshot`]: snapshot blob and naming convention
//! - [`retention`]: selection of old snapshots to delete
//! - [`writer`]: local directory and object storage destinations
//! - [`agent`]: the cycle orchestrator

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Fatal errors. Anything surfacing as an `AgentError` stops the agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// No usable Vault credential could be obtained
    #[error("Authentication error: {0}")]
    Auth(#[from] auth::AuthError),

    /// Leader status could not be determined
    #[error("Leadership query error: {0}")]
    Leadership(#[from] vault::LeadershipQueryError),

    /// Snapshot export failed
    #[error("Snapshot fetch error: {0}")]
    Fetch(#[from] vault::FetchError),

    /// A client could not be constructed
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Configuration file model
pub mod config;

/// Credential lifecycle and authentication strategies
pub mod auth;

/// Vault API access
pub mod vault;

/// Snapshot blob and file naming
pub mod snapshot;

/// Retention policy
pub mod retention;

/// Snapshot destinations
pub mod writer;

/// Cycle orchestration
pub mod agent;

/// Clock abstraction
pub mod clock;

/// Logging setup
pub mod telemetry;
