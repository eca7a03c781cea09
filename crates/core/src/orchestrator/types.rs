//! Types for the harvest orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::FetchError;
use crate::scheduler::SchedulerState;

/// Fatal errors that end a harvest run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Progress could not be loaded or saved.
    #[error("progress store error: {0}")]
    Progress(#[from] crate::progress::ProgressError),

    /// Records could not be written at shutdown.
    #[error("record store error: {0}")]
    Sink(#[from] crate::sink::SinkError),

    /// Options are unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The connectivity probe failed on every attempt.
    #[error("source unreachable (probe {key}): {cause}")]
    SourceUnreachable { key: String, cause: FetchError },

    /// `start` was called while a run is in progress.
    #[error("harvest already running")]
    AlreadyRunning,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every selected partition is exhausted.
    Completed,
    /// A stop was requested.
    Stopped,
    /// The dry-run key budget was spent.
    BudgetSpent,
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub outcome: RunOutcome,
    pub state: SchedulerState,
    /// Keys fetched during this run (replayed keys excluded).
    pub keys_dispatched: u64,
    pub records_found: u64,
    /// Records flushed during this run.
    pub records_flushed: u64,
    pub partitions_exhausted: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestStatus {
    /// Whether a run is in progress.
    pub running: bool,
    pub state: SchedulerState,
    pub run_id: Option<String>,
    pub client: String,
    /// Partition being scanned.
    pub partition: Option<String>,
    pub cursor: u32,
    pub streak: u32,
    pub keys_dispatched: u64,
    pub records_found: u64,
    pub records_flushed: u64,
    pub records_pending: usize,
    pub partitions_exhausted: usize,
    pub partitions_total: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub last_flush_at: Option<DateTime<Utc>>,
}

impl HarvestStatus {
    pub fn idle(client: &str) -> Self {
        Self {
            running: false,
            state: SchedulerState::Idle,
            run_id: None,
            client: client.to_string(),
            partition: None,
            cursor: 0,
            streak: 0,
            keys_dispatched: 0,
            records_found: 0,
            records_flushed: 0,
            records_pending: 0,
            partitions_exhausted: 0,
            partitions_total: 0,
            started_at: None,
            last_flush_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_status_serializes() {
        let status = HarvestStatus::idle("api");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["running"], false);
        assert_eq!(json["client"], "api");
        assert_eq!(json["state"]["state"], "idle");
    }

    #[test]
    fn test_error_messages() {
        let err = HarvestError::SourceUnreachable {
            key: "01000001".to_string(),
            cause: FetchError::Timeout,
        };
        assert_eq!(
            err.to_string(),
            "source unreachable (probe 01000001): request timed out"
        );
        assert_eq!(HarvestError::AlreadyRunning.to_string(), "harvest already running");
    }
}
