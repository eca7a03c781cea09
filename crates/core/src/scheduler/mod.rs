//! Partition scheduler.
//!
//! Walks the selected partitions in ascending code order, skipping those
//! already exhausted and resuming the rest at their saved cursor.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::dispatcher::{BatchDispatcher, KeyBudget, Ledger, PartitionEnd, PartitionResult};
use crate::metrics;
use crate::orchestrator::HarvestStatus;
use crate::partition::PartitionCode;
use crate::progress::ProgressError;

/// Scheduler state, published through the status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "partition", rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    ScanningPartition(PartitionCode),
    PartitionExhausted(PartitionCode),
    /// Terminal: every partition is exhausted or a fatal error ended the run.
    AllDone,
}

impl SchedulerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SchedulerState::AllDone)
    }
}

/// Why the scheduler returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleEnd {
    AllDone,
    Stopped,
    BudgetSpent,
}

/// Drives the dispatcher across partitions.
pub struct PartitionScheduler {
    partitions: Vec<PartitionCode>,
    state: SchedulerState,
    status: Arc<RwLock<HarvestStatus>>,
}

impl PartitionScheduler {
    /// `partitions` is sorted and deduplicated.
    pub fn new(mut partitions: Vec<PartitionCode>, status: Arc<RwLock<HarvestStatus>>) -> Self {
        partitions.sort();
        partitions.dedup();
        Self {
            partitions,
            state: SchedulerState::Idle,
            status,
        }
    }

    pub fn partitions(&self) -> &[PartitionCode] {
        &self.partitions
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// First partition that still has keys to scan.
    pub fn first_pending(&self, ledger: &Ledger) -> Option<&PartitionCode> {
        self.partitions
            .iter()
            .find(|code| !ledger.state().is_exhausted(code))
    }

    /// Run until every partition is exhausted, a stop is requested or the
    /// key budget is spent.
    pub async fn run(
        &mut self,
        dispatcher: &BatchDispatcher,
        ledger: &mut Ledger,
        budget: &mut KeyBudget,
    ) -> Result<ScheduleEnd, ProgressError> {
        let partitions = self.partitions.clone();
        for code in &partitions {
            if ledger.state().is_exhausted(code) {
                debug!(partition = %code, "Skipping exhausted partition");
                continue;
            }

            self.transition(SchedulerState::ScanningPartition(code.clone()))
                .await;
            let cursor = ledger.state().cursor(code);
            let result = match dispatcher.run(code, cursor, ledger, budget).await {
                Ok(result) => result,
                Err(e) => {
                    self.transition(SchedulerState::AllDone).await;
                    return Err(e);
                }
            };

            match result.end {
                PartitionEnd::Exhausted { .. } | PartitionEnd::KeySpaceEnd => {
                    self.complete(ledger, &result).await?;
                }
                PartitionEnd::Stopped => return Ok(ScheduleEnd::Stopped),
                PartitionEnd::BudgetSpent => return Ok(ScheduleEnd::BudgetSpent),
            }
        }

        self.transition(SchedulerState::AllDone).await;
        info!(partitions = self.partitions.len(), "All partitions exhausted");
        Ok(ScheduleEnd::AllDone)
    }

    async fn complete(
        &mut self,
        ledger: &mut Ledger,
        result: &PartitionResult,
    ) -> Result<(), ProgressError> {
        ledger.complete_partition(&result.partition)?;
        metrics::PARTITIONS_EXHAUSTED.inc();
        info!(
            partition = %result.partition,
            council = result.partition.display_name(),
            cursor = result.cursor,
            found = result.found,
            "Partition exhausted"
        );
        self.transition(SchedulerState::PartitionExhausted(result.partition.clone()))
            .await;
        let mut status = self.status.write().await;
        status.partitions_exhausted = ledger.state().exhausted_count();
        Ok(())
    }

    async fn transition(&mut self, next: SchedulerState) {
        debug!(from = ?self.state, to = ?next, "Scheduler transition");
        self.state = next.clone();
        self.status.write().await.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> PartitionCode {
        PartitionCode::new(s).unwrap()
    }

    #[test]
    fn test_partitions_sorted_and_deduped() {
        let status = Arc::new(RwLock::new(HarvestStatus::idle("mock")));
        let scheduler = PartitionScheduler::new(
            vec![code("10"), code("02"), code("10"), code("01")],
            status,
        );
        let codes: Vec<&str> = scheduler.partitions().iter().map(|c| c.as_str()).collect();
        assert_eq!(codes, vec!["01", "02", "10"]);
        assert_eq!(scheduler.state(), &SchedulerState::Idle);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(SchedulerState::ScanningPartition(code("07"))).unwrap();
        assert_eq!(json["state"], "scanning_partition");
        assert_eq!(json["partition"], "07");
        assert!(SchedulerState::AllDone.is_terminal());
        assert!(!SchedulerState::Idle.is_terminal());
    }
}
