// Snapshot writers - local directory and object storage destinations

use crate::snapshot::SnapshotBlob;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Local directory destination
pub mod local;
/// Object storage destination
pub mod object_store;
/// S3 client for object storage
#[cfg(feature = "s3")]
pub mod s3;

pub use local::{temp_file_name, LocalDirectoryWriter};
pub use object_store::{ObjectEntry, ObjectStorage, ObjectStoreTarget, ObjectStoreWriter, StaticCredentials};
#[cfg(feature = "s3")]
pub use s3::S3ObjectStorage;

/// Per-destination failures. Never fatal for the agent.
#[derive(Debug, Error, Clone)]
pub enum WriterError {
    /// Local filesystem failure
    #[error("IO error: {0}")]
    IoError(String),

    /// Object storage request failed
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The write exceeded the writer timeout
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Destination type not compiled in
    #[error("Unsupported destination: {0}")]
    Unsupported(String),
}

/// Where a writer persists snapshots. Built once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterTarget {
    /// Snapshot files in a directory
    LocalDirectory {
        /// Destination directory, created on first write
        path: PathBuf,
        /// Snapshots to keep; zero or less keeps all
        retain: i64,
    },
    /// Objects in a bucket
    ObjectStore(ObjectStoreTarget),
}

/// Result of one successful write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Path or object key the snapshot was written to
    pub location: String,
    /// Artifacts removed by the retention pass
    pub deleted: Vec<String>,
    /// Retention problems that did not affect the write itself
    pub trim_errors: Vec<String>,
}

impl WriteReport {
    /// Report for a write with no retention activity
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }
}

/// A configured destination.
pub enum SnapshotWriter {
    /// Writes into a local directory
    LocalDirectory(LocalDirectoryWriter),
    /// Uploads to object storage
    ObjectStore(ObjectStoreWriter),
}

impl SnapshotWriter {
    /// Build the writer for a target, creating storage clients as needed
    pub async fn from_target(target: WriterTarget) -> Result<Self, WriterError> {
        match target {
            WriterTarget::LocalDirectory { path, retain } => {
                Ok(SnapshotWriter::LocalDirectory(LocalDirectoryWriter::new(path, retain)))
            }
            #[cfg(feature = "s3")]
            WriterTarget::ObjectStore(target) => {
                let storage = S3ObjectStorage::connect(&target).await?;
                Ok(SnapshotWriter::ObjectStore(ObjectStoreWriter::new(
                    Arc::new(storage),
                    target,
                )))
            }
            #[cfg(not(feature = "s3"))]
            WriterTarget::ObjectStore(target) => Err(WriterError::Unsupported(format!(
                "s3://{} requires the `s3` feature",
                target.bucket
            ))),
        }
    }

    /// Wrap an object storage client, bypassing client construction
    pub fn object_store(storage: Arc<dyn ObjectStorage>, target: ObjectStoreTarget) -> Self {
        SnapshotWriter::ObjectStore(ObjectStoreWriter::new(storage, target))
    }

    /// Human readable destination name for logs
    pub fn name(&self) -> String {
        match self {
            SnapshotWriter::LocalDirectory(writer) => writer.name(),
            SnapshotWriter::ObjectStore(writer) => writer.name(),
        }
    }

    /// Persist the snapshot and trim this destination
    pub async fn write_snapshot(&self, blob: &SnapshotBlob) -> Result<WriteReport, WriterError> {
        match self {
            SnapshotWriter::LocalDirectory(writer) => writer.write_snapshot(blob).await,
            SnapshotWriter::ObjectStore(writer) => writer.write_snapshot(blob).await,
        }
    }
}

impl std::fmt::Debug for SnapshotWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SnapshotWriter").field(&self.name()).finish()
    }
}
