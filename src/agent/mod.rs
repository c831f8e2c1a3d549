// Snapshot agent - the cycle loop
// renew credential -> leadership gate -> fetch snapshot -> every writer

/// Per-cycle results
pub mod report;

pub use report::{CycleOutcome, CycleReport, DestinationOutcome};

use crate::auth::{AuthConfig, CredentialStore};
use crate::clock::{Clock, SystemClock};
use crate::config::Configuration;
use crate::snapshot::SnapshotBlob;
use crate::vault::{LeadershipGate, SecretsApi, SnapshotSource, VaultClient};
use crate::writer::{SnapshotWriter, WriterError};
use crate::{AgentError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

const DEFAULT_FREQUENCY: Duration = Duration::from_secs(3600);
const DEFAULT_WRITER_TIMEOUT: Duration = Duration::from_secs(300);

/// Drives snapshot cycles.
///
/// Cycles never overlap: a cycle runs to completion before the next tick is
/// awaited, so a destination's retention pass cannot race a write from an
/// earlier cycle.
pub struct SnapshotAgent {
    api: Arc<dyn SecretsApi>,
    credentials: CredentialStore,
    gate: LeadershipGate,
    source: SnapshotSource,
    writers: Vec<SnapshotWriter>,
    clock: Arc<dyn Clock>,
    frequency: Duration,
    writer_timeout: Duration,
    cycles: u64,
}

impl SnapshotAgent {
    /// Agent with the system clock, hourly cycles and a five minute writer timeout
    pub fn new(api: Arc<dyn SecretsApi>, auth: AuthConfig, writers: Vec<SnapshotWriter>) -> Self {
        Self {
            api,
            credentials: CredentialStore::new(auth),
            gate: LeadershipGate::new(),
            source: SnapshotSource::new(),
            writers,
            clock: Arc::new(SystemClock),
            frequency: DEFAULT_FREQUENCY,
            writer_timeout: DEFAULT_WRITER_TIMEOUT,
            cycles: 0,
        }
    }

    /// Build the agent described by a validated configuration
    pub async fn from_config(config: &Configuration) -> Result<Self> {
        let api = VaultClient::new(
            config.address.clone(),
            config.tls_skip_verify,
            config.request_timeout()?,
        )
        .map_err(|e| AgentError::Init(format!("Vault client: {}", e)))?
        .with_snapshot_timeout(config.snapshot_timeout()?);

        let mut writers = Vec::new();
        for target in config.writer_targets() {
            let writer = SnapshotWriter::from_target(target)
                .await
                .map_err(|e| AgentError::Init(format!("snapshot writer: {}", e)))?;
            writers.push(writer);
        }

        info!(
            address = %api.base_url(),
            auth_method = config.auth_config().kind(),
            destinations = ?writers.iter().map(|w| w.name()).collect::<Vec<_>>(),
            retain = config.retain,
            frequency = %config.frequency,
            "Snapshot agent configured"
        );

        Ok(Self::new(Arc::new(api), config.auth_config(), writers)
            .with_frequency(config.frequency()?)
            .with_writer_timeout(config.writer_timeout()?))
    }

    /// Replace the clock used for renewal decisions and snapshot timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Time between cycle starts
    pub fn with_frequency(mut self, frequency: Duration) -> Self {
        self.frequency = frequency;
        self
    }

    /// Upper bound on a single destination write, retention included
    pub fn with_writer_timeout(mut self, timeout: Duration) -> Self {
        self.writer_timeout = timeout;
        self
    }

    /// Credential store, for inspecting the current token
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Configured destinations, in dispatch order
    pub fn writers(&self) -> &[SnapshotWriter] {
        &self.writers
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one cycle.
    ///
    /// `Err` means the agent must stop (authentication, leadership or export
    /// failure). Writer failures are inside the returned report.
    #[instrument(skip(self), fields(cycle = self.cycles + 1))]
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.cycles += 1;

        let now = self.clock.now();
        let credential = self.credentials.ensure_valid(self.api.as_ref(), now).await?;

        if !self.gate.is_leader(self.api.as_ref(), credential).await? {
            info!("Not running on leader node, skipping");
            return Ok(CycleOutcome::NotLeader);
        }

        let blob = self
            .source
            .fetch_snapshot(self.api.as_ref(), credential, self.clock.as_ref())
            .await?;

        let destinations = dispatch(&self.writers, &blob, self.writer_timeout).await;

        let report = CycleReport {
            timestamp: blob.timestamp(),
            size_bytes: blob.len(),
            destinations,
        };

        info!(
            timestamp = report.timestamp,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Snapshot cycle finished"
        );

        Ok(CycleOutcome::Completed(report))
    }

    /// Run a cycle now and then every `frequency` until `shutdown` resolves
    /// or a cycle fails fatally.
    ///
    /// Shutdown is only observed between cycles.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.frequency);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(cycles = self.cycles, "Shutdown requested, stopping snapshot agent");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "Fatal error, stopping snapshot agent");
                return Err(e);
            }
        }
    }
}

/// Hand the snapshot to every writer in order. A failing or hanging writer
/// never prevents the next one from running.
async fn dispatch(
    writers: &[SnapshotWriter],
    blob: &SnapshotBlob,
    writer_timeout: Duration,
) -> Vec<DestinationOutcome> {
    let mut outcomes = Vec::with_capacity(writers.len());

    for writer in writers {
        let destination = writer.name();

        let result = match tokio::time::timeout(writer_timeout, writer.write_snapshot(blob)).await {
            Ok(result) => result,
            Err(_) => Err(WriterError::Timeout(writer_timeout)),
        };

        match &result {
            Ok(report) => {
                info!(
                    destination = %destination,
                    location = %report.location,
                    deleted = report.deleted.len(),
                    "Successfully created snapshot"
                );
                for problem in &report.trim_errors {
                    warn!(destination = %destination, error = %problem, "Retention incomplete");
                }
            }
            Err(e) => {
                error!(destination = %destination, error = %e, "Failed to create snapshot");
            }
        }

        outcomes.push(DestinationOutcome {
            destination,
            result,
        });
    }

    outcomes
}
