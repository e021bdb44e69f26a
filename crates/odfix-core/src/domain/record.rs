//! Append-only records of repair attempts.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chain::TestId;
use super::status::Status;

/// Candidate identifier recorded when no candidate applies.
pub const NO_CANDIDATE: &str = "N/A";

/// Wall-clock bounds of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationTime {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl OperationTime {
    /// A zero-length operation starting now.
    pub fn instantaneous() -> Self {
        Self {
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}

/// Running clock for an [`OperationTime`].
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started_at: DateTime<Utc>,
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn finish(&self) -> OperationTime {
        OperationTime {
            started_at: self.started_at,
            elapsed_ms: self.start.elapsed().as_millis() as u64,
        }
    }
}

/// One attempted fix for one victim/candidate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchRecord {
    pub time: OperationTime,
    pub status: Status,
    pub victim: TestId,
    pub candidate: String,
    pub iterations: usize,
    pub patch_location: Option<PathBuf>,
}

impl PatchRecord {
    pub fn new(
        time: OperationTime,
        status: Status,
        victim: impl Into<TestId>,
        candidate: Option<&str>,
        iterations: usize,
        patch_location: Option<PathBuf>,
    ) -> Self {
        Self {
            time,
            status,
            victim: victim.into(),
            candidate: candidate.unwrap_or(NO_CANDIDATE).to_string(),
            iterations,
            patch_location,
        }
    }

    /// A record for an attempt that ended before any experiment ran.
    pub fn early(status: Status, victim: impl Into<TestId>, candidate: Option<&str>) -> Self {
        Self::new(OperationTime::instantaneous(), status, victim, candidate, 0, None)
    }
}

/// Overall outcome for one victim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub time: OperationTime,
    pub status: Status,
    pub victim: TestId,
    pub records: Vec<PatchRecord>,
}

impl AggregateResult {
    /// Aggregate records, taking the best status seen (NOD when empty).
    pub fn from_records(time: OperationTime, victim: impl Into<TestId>, records: Vec<PatchRecord>) -> Self {
        let status = records
            .iter()
            .map(|r| r.status)
            .max()
            .unwrap_or(Status::Nod);
        Self {
            time,
            status,
            victim: victim.into(),
            records,
        }
    }

    /// The record holding the best status, earliest on ties.
    pub fn best_record(&self) -> Option<&PatchRecord> {
        self.records.iter().find(|r| r.status == self.status)
    }
}
