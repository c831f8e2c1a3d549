// Object storage writer - provider independent part

use super::{WriteReport, WriterError};
use crate::auth::Secret;
use crate::retention::{RetentionCandidate, RetentionPolicy};
use crate::snapshot::SnapshotBlob;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Static access keys for object storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: Secret<String>,
}

/// Object storage destination settings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectStoreTarget {
    /// Bucket name
    pub bucket: String,
    /// Prepended verbatim to the object name
    pub key_prefix: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint: Option<String>,
    /// Empty lets the provider's default chain decide
    pub region: String,
    /// `None` uses the provider's default credential chain
    pub credentials: Option<StaticCredentials>,
    /// Request AES256 server-side encryption on upload
    pub use_server_side_encryption: bool,
    /// Overwrite this single object every cycle instead of timestamped names
    pub static_name: Option<String>,
    /// Path-style addressing, needed by most S3-compatible services
    pub force_path_style: bool,
    /// Snapshots to keep; zero or less keeps all
    pub retain: i64,
}

/// An object found under the destination prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Full object key
    pub key: String,
    /// Missing when the provider does not report it
    pub last_modified: Option<DateTime<Utc>>,
}

/// The object storage operations a writer needs
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `body` to `key`, requesting server-side encryption when asked
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        server_side_encryption: bool,
    ) -> Result<(), WriterError>;

    /// Whether [`ObjectStorage::list_objects`] is available
    fn supports_listing(&self) -> bool {
        true
    }

    /// Every object whose key starts with `prefix`
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>, WriterError>;

    /// Remove `key`
    async fn delete_object(&self, key: &str) -> Result<(), WriterError>;
}

/// Uploads snapshots to a bucket and trims old ones.
pub struct ObjectStoreWriter {
    storage: Arc<dyn ObjectStorage>,
    target: ObjectStoreTarget,
    retention: RetentionPolicy,
}

impl ObjectStoreWriter {
    /// Writer over an existing storage client
    pub fn new(storage: Arc<dyn ObjectStorage>, target: ObjectStoreTarget) -> Self {
        let retention = RetentionPolicy::new(target.retain);
        Self {
            storage,
            target,
            retention,
        }
    }

    /// Destination settings
    pub fn target(&self) -> &ObjectStoreTarget {
        &self.target
    }

    /// Name used in logs and cycle reports
    pub fn name(&self) -> String {
        format!("s3://{}/{}", self.target.bucket, self.target.key_prefix)
    }

    /// Key the snapshot is uploaded to
    pub fn object_key(&self, blob: &SnapshotBlob) -> String {
        match &self.target.static_name {
            Some(name) => format!("{}{}", self.target.key_prefix, name),
            None => format!("{}{}", self.target.key_prefix, blob.file_name()),
        }
    }

    /// Upload the snapshot, then trim the prefix. Trim failures are reported,
    /// never returned.
    #[instrument(skip(self, blob), fields(destination = %self.name(), timestamp = blob.timestamp()))]
    pub async fn write_snapshot(&self, blob: &SnapshotBlob) -> Result<WriteReport, WriterError> {
        let key = self.object_key(blob);

        self.storage
            .put_object(&key, blob.data().clone(), self.target.use_server_side_encryption)
            .await?;

        let mut report = WriteReport::new(format!("s3://{}/{}", self.target.bucket, key));

        // A static name is a single "latest" object that is overwritten in place.
        if self.target.static_name.is_some() || self.retention.is_unlimited() {
            return Ok(report);
        }

        if !self.storage.supports_listing() {
            warn!("Object storage cannot list objects, retention is skipped");
            return Ok(report);
        }

        let entries = match self.storage.list_objects(&self.target.key_prefix).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Unable to list objects for retention");
                report.trim_errors.push(e.to_string());
                return Ok(report);
            }
        };

        let candidates = self.candidates(entries);
        for candidate in self.retention.select(&candidates) {
            match self.storage.delete_object(&candidate.name).await {
                Ok(()) => {
                    info!(key = %candidate.name, "Removed old snapshot object");
                    report.deleted.push(candidate.name);
                }
                Err(e) => {
                    warn!(key = %candidate.name, error = %e, "Failed to remove old snapshot object");
                    report
                        .trim_errors
                        .push(format!("Failed to remove {}: {}", candidate.name, e));
                }
            }
        }

        Ok(report)
    }

    /// Objects directly under the prefix. Objects without a modification time
    /// are ordered by the timestamp in their name.
    fn candidates(&self, entries: Vec<ObjectEntry>) -> Vec<RetentionCandidate> {
        entries
            .into_iter()
            .filter_map(|entry| {
                let relative = entry.key.strip_prefix(&self.target.key_prefix)?;
                if relative.contains('/') {
                    return None;
                }
                let modified_at = entry.last_modified.or_else(|| {
                    crate::snapshot::parse_snapshot_name(relative)
                        .map(|ts| Utc.timestamp_nanos(ts))
                })?;
                Some(RetentionCandidate::new(entry.key, modified_at))
            })
            .collect()
    }
}
