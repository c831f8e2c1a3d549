//! Snapshot blob and the on-disk naming convention.
//!
//! Every destination names snapshots `raft_snapshot-<unix nanos>.snap`.
//! Retention relies on this: only names that parse back with
//! [`parse_snapshot_name`] are ever considered for deletion.

use bytes::Bytes;

/// File name prefix shared by every destination
pub const SNAPSHOT_PREFIX: &str = "raft_snapshot-";

/// File name suffix shared by every destination
pub const SNAPSHOT_SUFFIX: &str = ".snap";

/// One exported snapshot. Lives for a single cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBlob {
    data: Bytes,
    timestamp: i64,
}

impl SnapshotBlob {
    /// Wrap exported bytes with their creation timestamp (unix nanoseconds)
    pub fn new(data: impl Into<Bytes>, timestamp: i64) -> Self {
        Self {
            data: data.into(),
            timestamp,
        }
    }

    /// The raw snapshot bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Creation instant in unix nanoseconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-length snapshot
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Conventional file name for this snapshot
    pub fn file_name(&self) -> String {
        snapshot_file_name(self.timestamp)
    }
}

/// `raft_snapshot-<timestamp>.snap`
pub fn snapshot_file_name(timestamp: i64) -> String {
    format!("{}{}{}", SNAPSHOT_PREFIX, timestamp, SNAPSHOT_SUFFIX)
}

/// Extract the timestamp from a snapshot name.
///
/// Accepts a bare file name or an object key; anything before the last `/`
/// is ignored. Returns `None` for names that do not follow the convention.
pub fn parse_snapshot_name(name: &str) -> Option<i64> {
    let base = name.rsplit('/').next().unwrap_or(name);
    let digits = base
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(SNAPSHOT_SUFFIX)?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// True when `name` follows the snapshot naming convention
pub fn is_snapshot_name(name: &str) -> bool {
    parse_snapshot_name(name).is_some()
}
