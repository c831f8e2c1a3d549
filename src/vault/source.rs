// Snapshot source - raft snapshot export

use super::{SecretsApi, VaultError};
use crate::auth::Credential;
use crate::clock::Clock;
use crate::snapshot::SnapshotBlob;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Snapshot export failed
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// The export request failed
    #[error("Unable to export raft snapshot: {0}")]
    Export(#[from] VaultError),

    /// The export returned no bytes
    #[error("Vault returned an empty raft snapshot")]
    Empty,

    /// The clock is outside the range of an `i64` nanosecond count
    #[error("Clock value {0} cannot be expressed in unix nanoseconds")]
    ClockOutOfRange(String),
}

/// Pulls raft snapshots and stamps them with strictly increasing timestamps.
#[derive(Debug, Default)]
pub struct SnapshotSource {
    last_timestamp: Option<i64>,
}

impl SnapshotSource {
    /// Create a source
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of the most recent snapshot, if any
    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    /// Export the current snapshot.
    ///
    /// The timestamp is taken once the export has completed. If the clock has
    /// not moved past the previous snapshot (coarse clock, NTP step) the
    /// timestamp is bumped so names and ordering stay unique.
    #[instrument(skip(self, api, credential, clock))]
    pub async fn fetch_snapshot(
        &mut self,
        api: &dyn SecretsApi,
        credential: &Credential,
        clock: &dyn Clock,
    ) -> Result<SnapshotBlob, FetchError> {
        let data = api.raft_snapshot(credential.token()).await?;
        if data.is_empty() {
            return Err(FetchError::Empty);
        }

        let now = clock.now();
        let mut timestamp = now
            .timestamp_nanos_opt()
            .ok_or_else(|| FetchError::ClockOutOfRange(now.to_rfc3339()))?;

        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                warn!(
                    clock = timestamp,
                    previous = last,
                    "Clock did not advance since the previous snapshot"
                );
                timestamp = last.saturating_add(1);
            }
        }
        self.last_timestamp = Some(timestamp);

        let mut hasher = Sha256::new();
        hasher.update(&data);
        let checksum = format!("{:x}", hasher.finalize());

        info!(
            timestamp = timestamp,
            size_bytes = data.len(),
            sha256 = %checksum,
            "Raft snapshot exported"
        );

        Ok(SnapshotBlob::new(data, timestamp))
    }
}
