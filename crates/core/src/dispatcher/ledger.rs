//! Run-time owner of progress state and the result sink.
//!
//! Progress is saved only at points where every resolved key's record is in
//! durable storage: right after a successful flush, or at a boundary where
//! the sink has nothing pending. The saved cursor therefore never runs ahead
//! of stored records.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::partition::{CandidateKey, PartitionCode};
use crate::progress::{ProgressError, ProgressState, ProgressStore, Resolution};
use crate::record::Record;
use crate::sink::{ResultSink, SinkError};

use super::Fold;

pub struct Ledger {
    state: ProgressState,
    sink: ResultSink,
    store: Arc<dyn ProgressStore>,
    flushed_before: u64,
}

impl Ledger {
    pub fn new(state: ProgressState, sink: ResultSink, store: Arc<dyn ProgressStore>) -> Self {
        let flushed_before = state
            .checkpoint
            .as_ref()
            .map(|c| c.records_flushed)
            .unwrap_or(0);
        Self {
            state,
            sink,
            store,
            flushed_before,
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    /// Records flushed by this run.
    pub fn run_flushed(&self) -> u64 {
        self.sink.flushed()
    }

    /// Record a key's final resolution and hand its record to the sink.
    pub fn resolve(
        &mut self,
        key: &CandidateKey,
        resolution: Resolution,
        record: Option<Record>,
    ) -> Result<(), ProgressError> {
        self.state.mark_resolved(key, resolution);
        let entry = self.state.partition_mut(key.partition());
        entry.attempted += 1;
        if resolution == Resolution::Found {
            entry.found += 1;
        }

        if let Some(record) = record {
            if self.sink.add(record) {
                self.persist()?;
            }
        }
        Ok(())
    }

    /// Move the partition cursor to the end of a folded batch.
    ///
    /// Log entries the cursor now covers are dropped, so the live log only
    /// holds keys resolved past an interrupted batch.
    pub fn advance(&mut self, code: &PartitionCode, fold: &Fold) {
        if let Some(suffix) = fold.last_suffix {
            self.state.advance_cursor(code, suffix, fold.streak);
            self.state.prune_resolved(code);
        }
    }

    /// Batch boundary: retry or threshold flush, then persist if clean.
    pub fn end_batch(&mut self) -> Result<(), ProgressError> {
        if let Err(e) = self.sink.flush_if_due() {
            warn!(error = %e, pending = self.sink.pending(), "Flush failed, will retry next batch");
        }
        if self.sink.pending() == 0 {
            self.persist()?;
        }
        Ok(())
    }

    /// Mark a partition finished and record it in the checkpoint.
    pub fn complete_partition(&mut self, code: &PartitionCode) -> Result<(), ProgressError> {
        self.state.mark_exhausted(code);
        if let Some(checkpoint) = self.state.checkpoint.as_mut() {
            checkpoint.last_completed_partition = Some(code.clone());
        }
        if self.sink.pending() == 0 {
            self.persist()?;
        }
        Ok(())
    }

    /// Shutdown sequence: flush everything, then persist.
    ///
    /// Progress is left untouched when the flush fails.
    pub fn finish(&mut self) -> Result<(), FinishError> {
        self.sink.flush().map_err(FinishError::Sink)?;
        self.persist().map_err(FinishError::Progress)
    }

    fn persist(&mut self) -> Result<(), ProgressError> {
        let flushed = self.flushed_before + self.sink.flushed();
        let last_flush_at = self.sink.last_flush_at();
        if let Some(checkpoint) = self.state.checkpoint.as_mut() {
            checkpoint.records_flushed = flushed;
            if last_flush_at.is_some() {
                checkpoint.last_flush_at = last_flush_at;
            }
        }
        self.store.save(&self.state)?;
        debug!(records_flushed = flushed, "Progress persisted");
        Ok(())
    }
}

/// Failure of the shutdown sequence.
#[derive(Debug)]
pub enum FinishError {
    Sink(SinkError),
    Progress(ProgressError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryProgressStore;
    use crate::sink::{MemoryRecordStore, RecordStore};
    use crate::testing::fixtures;

    fn ledger(flush_every: usize) -> (Arc<MemoryProgressStore>, Arc<MemoryRecordStore>, Ledger) {
        let progress = Arc::new(MemoryProgressStore::new());
        let records = Arc::new(MemoryRecordStore::new());
        let sink = ResultSink::new(records.clone(), flush_every);
        let ledger = Ledger::new(ProgressState::default(), sink, progress.clone());
        (progress, records, ledger)
    }

    fn key(s: &str) -> CandidateKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_no_save_while_records_pending() {
        let (progress, _records, mut ledger) = ledger(10);
        let k = key("01000001");
        ledger
            .resolve(&k, Resolution::Found, Some(fixtures::record("01000001")))
            .unwrap();
        ledger.end_batch().unwrap();
        assert_eq!(progress.save_count(), 0);

        ledger.finish().unwrap();
        let saved = progress.snapshot().unwrap();
        assert_eq!(saved.resolution(&k), Some(Resolution::Found));
        assert_eq!(saved.partitions[k.partition()].found, 1);
    }

    #[test]
    fn test_save_after_auto_flush() {
        let (progress, records, mut ledger) = ledger(1);
        ledger
            .resolve(&key("01000001"), Resolution::Found, Some(fixtures::record("01000001")))
            .unwrap();
        assert_eq!(progress.save_count(), 1);
        assert_eq!(records.len().unwrap(), 1);
    }

    #[test]
    fn test_not_found_batches_save_immediately() {
        let (progress, _records, mut ledger) = ledger(10);
        let code = PartitionCode::new("01").unwrap();
        ledger.resolve(&key("01000001"), Resolution::NotFound, None).unwrap();
        let fold = Fold {
            applied: 1,
            last_suffix: Some(1),
            streak: 1,
            exhausted_at: None,
        };
        ledger.advance(&code, &fold);
        ledger.end_batch().unwrap();
        assert_eq!(progress.snapshot().unwrap().cursor(&code), 1);
    }

    #[test]
    fn test_resolution_log_stays_bounded() {
        let (progress, records, mut ledger) = ledger(500);
        let code = PartitionCode::new("01").unwrap();

        for batch in 0..20u32 {
            for i in 1..=100u32 {
                let suffix = batch * 100 + i;
                let k = CandidateKey::new(code.clone(), suffix).unwrap();
                let raw = k.to_string();
                ledger
                    .resolve(&k, Resolution::Found, Some(fixtures::record(&raw)))
                    .unwrap();
            }
            let fold = Fold {
                applied: 100,
                last_suffix: Some((batch + 1) * 100),
                streak: 0,
                exhausted_at: None,
            };
            ledger.advance(&code, &fold);
            ledger.end_batch().unwrap();
            assert!(ledger.state().resolved.is_empty());
        }

        ledger.finish().unwrap();
        assert_eq!(ledger.state().cursor(&code), 2000);
        assert_eq!(ledger.state().partitions[&code].found, 2000);
        assert_eq!(records.len().unwrap(), 2000);
        assert!(progress.snapshot().unwrap().resolved.is_empty());
    }

    #[test]
    fn test_advance_keeps_entries_past_cursor() {
        let (_progress, _records, mut ledger) = ledger(10);
        let code = PartitionCode::new("02").unwrap();
        let other = key("03000001");
        ledger.resolve(&key("02000001"), Resolution::NotFound, None).unwrap();
        ledger.resolve(&key("02000003"), Resolution::NotFound, None).unwrap();
        ledger.resolve(&other, Resolution::NotFound, None).unwrap();

        let fold = Fold {
            applied: 1,
            last_suffix: Some(1),
            streak: 1,
            exhausted_at: None,
        };
        ledger.advance(&code, &fold);

        let resolved: Vec<String> = ledger.state().resolved.keys().map(|k| k.to_string()).collect();
        assert_eq!(resolved, vec!["02000003", "03000001"]);
    }

    #[test]
    fn test_failed_final_flush_does_not_persist() {
        let (progress, records, mut ledger) = ledger(10);
        records.fail_next(1);
        ledger
            .resolve(&key("01000001"), Resolution::Found, Some(fixtures::record("01000001")))
            .unwrap();
        assert!(matches!(ledger.finish(), Err(FinishError::Sink(_))));
        assert!(progress.snapshot().is_none());
        assert_eq!(ledger.sink().pending(), 1);
    }
}
