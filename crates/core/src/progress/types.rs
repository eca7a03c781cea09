//! Progress state persisted between runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::partition::{CandidateKey, PartitionCode};

/// Current on-disk format version.
pub const PROGRESS_VERSION: u32 = 1;

/// Final resolution of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Found,
    NotFound,
    /// Transient on every attempt.
    Failed,
}

impl Resolution {
    /// Whether this resolution counts toward the consecutive-failure streak.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Resolution::Found)
    }
}

/// Scan state of one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionProgress {
    /// Last suffix whose outcome has been applied (0 = none).
    #[serde(default)]
    pub cursor: u32,
    #[serde(default)]
    pub exhausted: bool,
    /// Consecutive failures ending at the cursor.
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub found: u64,
    #[serde(default)]
    pub attempted: u64,
}

/// Run-level bookkeeping used to report and sanity-check a resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Records flushed to durable storage across all runs.
    #[serde(default)]
    pub records_flushed: u64,
    #[serde(default)]
    pub last_completed_partition: Option<PartitionCode>,
    #[serde(default)]
    pub last_flush_at: Option<DateTime<Utc>>,
    /// Hash of the harvesting options the progress was produced with.
    #[serde(default)]
    pub config_fingerprint: String,
}

/// Everything needed to resume a harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub partitions: BTreeMap<PartitionCode, PartitionProgress>,
    /// Keys resolved past their partition's cursor.
    #[serde(default)]
    pub resolved: BTreeMap<CandidateKey, Resolution>,
    #[serde(default)]
    pub checkpoint: Option<RunCheckpoint>,
}

fn default_version() -> u32 {
    PROGRESS_VERSION
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            version: PROGRESS_VERSION,
            partitions: BTreeMap::new(),
            resolved: BTreeMap::new(),
            checkpoint: None,
        }
    }
}

impl ProgressState {
    pub fn partition(&self, code: &PartitionCode) -> Option<&PartitionProgress> {
        self.partitions.get(code)
    }

    /// Mutable entry for `code`, created on first touch.
    pub fn partition_mut(&mut self, code: &PartitionCode) -> &mut PartitionProgress {
        self.partitions.entry(code.clone()).or_default()
    }

    pub fn cursor(&self, code: &PartitionCode) -> u32 {
        self.partition(code).map(|p| p.cursor).unwrap_or(0)
    }

    pub fn is_exhausted(&self, code: &PartitionCode) -> bool {
        self.partition(code).map(|p| p.exhausted).unwrap_or(false)
    }

    /// A key is resolved if it lies at or below its partition's cursor or
    /// has an individual entry in the resolution log.
    pub fn is_resolved(&self, key: &CandidateKey) -> bool {
        key.suffix() <= self.cursor(key.partition()) || self.resolved.contains_key(key)
    }

    pub fn resolution(&self, key: &CandidateKey) -> Option<Resolution> {
        self.resolved.get(key).copied()
    }

    pub fn mark_resolved(&mut self, key: &CandidateKey, resolution: Resolution) {
        self.resolved.insert(key.clone(), resolution);
    }

    /// Move the cursor forward; never moves it back.
    pub fn advance_cursor(&mut self, code: &PartitionCode, suffix: u32, streak: u32) {
        let entry = self.partition_mut(code);
        if suffix > entry.cursor {
            entry.cursor = suffix;
            entry.streak = streak;
        }
    }

    pub fn mark_exhausted(&mut self, code: &PartitionCode) {
        self.partition_mut(code).exhausted = true;
    }

    /// Drop `code`'s log entries at or below its cursor.
    pub fn prune_resolved(&mut self, code: &PartitionCode) {
        let cursor = self.cursor(code);
        self.resolved
            .retain(|key, _| key.partition() != code || key.suffix() > cursor);
    }

    /// Drop log entries already covered by their partition's cursor.
    pub fn compact(&mut self) {
        let partitions = &self.partitions;
        self.resolved.retain(|key, _| {
            let cursor = partitions.get(key.partition()).map(|p| p.cursor).unwrap_or(0);
            key.suffix() > cursor
        });
    }

    pub fn exhausted_count(&self) -> usize {
        self.partitions.values().filter(|p| p.exhausted).count()
    }

    pub fn total_found(&self) -> u64 {
        self.partitions.values().map(|p| p.found).sum()
    }
}
