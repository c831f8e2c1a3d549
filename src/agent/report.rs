// Cycle outcomes

use crate::writer::{WriteReport, WriterError};

/// What one destination did with this cycle's snapshot
#[derive(Debug, Clone)]
pub struct DestinationOutcome {
    /// Writer name as shown in logs
    pub destination: String,
    /// Write report, or why the write failed
    pub result: Result<WriteReport, WriterError>,
}

impl DestinationOutcome {
    /// Whether the snapshot reached this destination
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-destination results of a cycle that produced a snapshot
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Snapshot timestamp in unix nanoseconds
    pub timestamp: i64,
    /// Snapshot size
    pub size_bytes: usize,
    /// One entry per configured writer, in dispatch order
    pub destinations: Vec<DestinationOutcome>,
}

impl CycleReport {
    /// Destinations that stored the snapshot
    pub fn succeeded(&self) -> usize {
        self.destinations.iter().filter(|d| d.is_success()).count()
    }

    /// Destinations that did not
    pub fn failed(&self) -> usize {
        self.destinations.len() - self.succeeded()
    }

    /// Outcome for a destination by name
    pub fn destination(&self, name: &str) -> Option<&DestinationOutcome> {
        self.destinations.iter().find(|d| d.destination == name)
    }
}

/// Non-fatal result of a cycle
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Another node leads the cluster; nothing was fetched or written
    NotLeader,
    /// A snapshot was taken and dispatched
    Completed(CycleReport),
}

impl CycleOutcome {
    /// The report of a completed cycle
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::NotLeader => None,
            CycleOutcome::Completed(report) => Some(report),
        }
    }
}
