// Local directory writer

use super::{WriteReport, WriterError};
use crate::retention::{RetentionCandidate, RetentionPolicy};
use crate::snapshot::{is_snapshot_name, SnapshotBlob};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// `.raft_snapshot-<ts>.snap.tmp`: hidden, and outside the naming convention
pub fn temp_file_name(file_name: &str) -> String {
    format!(".{}.tmp", file_name)
}

/// Removes a staging file unless it was persisted. Runs on error returns and
/// when the write future is dropped by a timeout.
struct PartialFile {
    path: PathBuf,
    persisted: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            persisted: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn persist(mut self) {
        self.persisted = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial snapshot"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove partial snapshot"),
        }
    }
}

/// Writes snapshots into a directory and keeps the newest `retain` of them.
#[derive(Debug, Clone)]
pub struct LocalDirectoryWriter {
    directory: PathBuf,
    retention: RetentionPolicy,
}

impl LocalDirectoryWriter {
    /// Writer for `directory`; nothing is touched until the first write
    pub fn new(directory: impl Into<PathBuf>, retain: i64) -> Self {
        Self {
            directory: directory.into(),
            retention: RetentionPolicy::new(retain),
        }
    }

    /// Destination directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Name used in logs and cycle reports
    pub fn name(&self) -> String {
        format!("local:{}", self.directory.display())
    }

    async fn ensure_directory_exists(&self) -> Result<(), WriterError> {
        if !fs::try_exists(&self.directory).await.unwrap_or(false) {
            fs::create_dir_all(&self.directory).await.map_err(|e| {
                WriterError::IoError(format!(
                    "Failed to create snapshot directory {}: {}",
                    self.directory.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Write the snapshot, then trim the directory.
    ///
    /// Bytes go to a hidden temp file that only takes the snapshot name once
    /// it is fully written and synced. A failed or cancelled write never
    /// leaves a file that retention would count.
    #[instrument(skip(self, blob), fields(destination = %self.name(), timestamp = blob.timestamp()))]
    pub async fn write_snapshot(&self, blob: &SnapshotBlob) -> Result<WriteReport, WriterError> {
        self.ensure_directory_exists().await?;

        let path = self.directory.join(blob.file_name());
        let staging = PartialFile::new(self.directory.join(temp_file_name(&blob.file_name())));

        let mut file = fs::File::create(staging.path()).await.map_err(|e| {
            WriterError::IoError(format!("Failed to create {}: {}", staging.path().display(), e))
        })?;
        file.write_all(blob.data()).await.map_err(|e| {
            WriterError::IoError(format!("Failed to write {}: {}", staging.path().display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            WriterError::IoError(format!("Failed to sync {}: {}", staging.path().display(), e))
        })?;
        drop(file);

        fs::rename(staging.path(), &path).await.map_err(|e| {
            WriterError::IoError(format!(
                "Failed to move {} to {}: {}",
                staging.path().display(),
                path.display(),
                e
            ))
        })?;
        staging.persist();
        self.sweep_partials().await;

        let mut report = WriteReport::new(path.display().to_string());
        debug!(path = %report.location, size_bytes = blob.len(), "Snapshot written");

        if self.retention.is_unlimited() {
            return Ok(report);
        }

        // The snapshot is durable at this point; retention problems are reported, not raised.
        let candidates = match self.list_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Unable to list snapshot directory for retention");
                report.trim_errors.push(e.to_string());
                return Ok(report);
            }
        };

        for candidate in self.retention.select(&candidates) {
            let stale = self.directory.join(&candidate.name);
            match fs::remove_file(&stale).await {
                Ok(()) => {
                    info!(path = %stale.display(), "Removed old snapshot");
                    report.deleted.push(stale.display().to_string());
                }
                Err(e) => {
                    warn!(path = %stale.display(), error = %e, "Failed to remove old snapshot");
                    report
                        .trim_errors
                        .push(format!("Failed to remove {}: {}", stale.display(), e));
                }
            }
        }

        Ok(report)
    }

    /// Remove staging files left by writes that were cancelled before their
    /// file was created. Cycles never overlap, so none of them is in use.
    async fn sweep_partials(&self) {
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(_) => return,
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_partial = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix('.'))
                .and_then(|name| name.strip_suffix(".tmp"))
                .map_or(false, is_snapshot_name);

            if is_partial {
                let path = entry.path();
                match fs::remove_file(&path).await {
                    Ok(()) => debug!(path = %path.display(), "Removed stale partial snapshot"),
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale partial snapshot"),
                }
            }
        }
    }

    /// Regular files in the directory that follow the snapshot naming convention
    async fn list_candidates(&self) -> Result<Vec<RetentionCandidate>, WriterError> {
        let mut entries = fs::read_dir(&self.directory).await.map_err(|e| {
            WriterError::IoError(format!(
                "Failed to read {}: {}",
                self.directory.display(),
                e
            ))
        })?;

        let mut candidates = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| WriterError::IoError(format!("Failed to read directory entry: {}", e)))?
        {
            let name = match entry.file_name().into_string() {
                Ok(name) if is_snapshot_name(&name) => name,
                _ => continue,
            };

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    warn!(file = %name, error = %e, "Skipping snapshot with unreadable metadata");
                    continue;
                }
            };

            let modified = metadata
                .modified()
                .map_err(|e| WriterError::IoError(format!("No modification time for {}: {}", name, e)))?;

            candidates.push(RetentionCandidate::new(name, DateTime::<Utc>::from(modified)));
        }

        Ok(candidates)
    }
}
