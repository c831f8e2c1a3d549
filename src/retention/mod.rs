// Retention policy - picks the snapshots a destination should drop

use crate::snapshot::is_snapshot_name;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A snapshot artifact found while listing a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionCandidate {
    /// File name or object key
    pub name: String,
    /// Last modification, or the time parsed from the name
    pub modified_at: DateTime<Utc>,
}

impl RetentionCandidate {
    /// Create a candidate
    pub fn new(name: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            modified_at,
        }
    }
}

/// Oldest first; equal modification times fall back to name order.
pub fn compare_candidates(a: &RetentionCandidate, b: &RetentionCandidate) -> Ordering {
    a.modified_at
        .cmp(&b.modified_at)
        .then_with(|| a.name.cmp(&b.name))
}

/// Select the artifacts to delete so that at most `retain` snapshots remain.
///
/// Names outside the snapshot naming convention are never selected. A
/// `retain` of zero or less keeps everything. The newest `retain` matching
/// artifacts are kept; the rest are returned oldest first.
pub fn select_for_deletion(
    candidates: &[RetentionCandidate],
    retain: i64,
) -> Vec<RetentionCandidate> {
    if retain <= 0 {
        return Vec::new();
    }

    let mut matched: Vec<RetentionCandidate> = candidates
        .iter()
        .filter(|c| is_snapshot_name(&c.name))
        .cloned()
        .collect();

    let retain = usize::try_from(retain).unwrap_or(usize::MAX);
    if matched.len() <= retain {
        return Vec::new();
    }

    matched.sort_by(compare_candidates);
    matched.truncate(matched.len() - retain);
    matched
}

/// Retention count for one destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    retain: i64,
}

impl RetentionPolicy {
    /// Keep the newest `retain` snapshots
    pub fn new(retain: i64) -> Self {
        Self { retain }
    }

    /// Keep every snapshot
    pub fn unlimited() -> Self {
        Self { retain: 0 }
    }

    /// Configured count
    pub fn retain(&self) -> i64 {
        self.retain
    }

    /// Zero or less keeps everything
    pub fn is_unlimited(&self) -> bool {
        self.retain <= 0
    }

    /// See [`select_for_deletion`]
    pub fn select(&self, candidates: &[RetentionCandidate]) -> Vec<RetentionCandidate> {
        select_for_deletion(candidates, self.retain)
    }
}
