//! Harvest orchestrator implementation.
//!
//! One run:
//! - Load progress (or start empty) and stamp a new run checkpoint
//! - Probe the source once, failing fast when it cannot be reached
//! - Scan partitions through the scheduler
//! - Flush the sink, then persist progress

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dispatcher::{BatchDispatcher, FinishError, KeyBudget, Ledger, Settled};
use crate::fetch::{FetchClient, Outcome};
use crate::partition::{all_partitions, CandidateKey};
use crate::progress::{ProgressState, ProgressStore, RunCheckpoint};
use crate::scheduler::{PartitionScheduler, ScheduleEnd};
use crate::sink::{RecordStore, ResultSink};

use super::config::HarvestOptions;
use super::stop::{stop_channel, StopHandle};
use super::types::{HarvestError, HarvestStatus, RunOutcome, RunSummary};

/// The harvest orchestrator - drives partitions through the dispatcher.
pub struct HarvestOrchestrator {
    options: HarvestOptions,
    client: Arc<dyn FetchClient>,
    progress_store: Arc<dyn ProgressStore>,
    record_store: Arc<dyn RecordStore>,

    // Runtime state
    running: Arc<AtomicBool>,
    status: Arc<RwLock<HarvestStatus>>,
    stop: StopHandle,
}

impl HarvestOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        options: HarvestOptions,
        client: Arc<dyn FetchClient>,
        progress_store: Arc<dyn ProgressStore>,
        record_store: Arc<dyn RecordStore>,
    ) -> Self {
        let (stop, _) = stop_channel();
        let status = HarvestStatus::idle(client.name());
        Self {
            options,
            client,
            progress_store,
            record_store,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(RwLock::new(status)),
            stop,
        }
    }

    pub fn options(&self) -> &HarvestOptions {
        &self.options
    }

    /// Handle that can stop the current run from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request a cooperative stop. In-flight fetches settle first.
    ///
    /// A request made while idle stays pending and ends the next run before
    /// its first batch.
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            warn!("Harvest not running");
        }
        info!("Stopping harvest");
        self.stop.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get current harvest status.
    pub async fn status(&self) -> HarvestStatus {
        self.status.read().await.clone()
    }

    /// Run a harvest to completion, stop, budget end or fatal error.
    pub async fn start(&self, resume: bool) -> Result<RunSummary, HarvestError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Harvest already running");
            return Err(HarvestError::AlreadyRunning);
        }

        let result = self.run(resume).await;

        // clear only once the run that consumed the request has ended
        self.stop.reset();
        self.running.store(false, Ordering::SeqCst);
        self.status.write().await.running = false;
        match &result {
            Ok(summary) => info!(
                run_id = %summary.run_id,
                outcome = ?summary.outcome,
                dispatched = summary.keys_dispatched,
                found = summary.records_found,
                flushed = summary.records_flushed,
                "Harvest finished"
            ),
            Err(e) => error!(error = %e, "Harvest failed"),
        }
        result
    }

    async fn run(&self, resume: bool) -> Result<RunSummary, HarvestError> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let fingerprint = self.options.fingerprint();

        let mut state = if resume {
            self.progress_store.load()?
        } else {
            info!("Starting fresh, saved progress will be replaced");
            ProgressState::default()
        };

        let previous = state.checkpoint.take();
        if let Some(prev) = &previous {
            info!(
                previous_run = %prev.run_id,
                records_flushed = prev.records_flushed,
                last_completed = ?prev.last_completed_partition.as_ref().map(|c| c.as_str()),
                "Resuming harvest"
            );
            if prev.config_fingerprint != fingerprint {
                warn!(
                    saved = %prev.config_fingerprint,
                    current = %fingerprint,
                    "Harvest options changed since the saved progress was written"
                );
            }
        }
        state.checkpoint = Some(RunCheckpoint {
            run_id: run_id.clone(),
            started_at,
            records_flushed: previous.as_ref().map(|p| p.records_flushed).unwrap_or(0),
            last_completed_partition: previous
                .as_ref()
                .and_then(|p| p.last_completed_partition.clone()),
            last_flush_at: previous.as_ref().and_then(|p| p.last_flush_at),
            config_fingerprint: fingerprint,
        });

        let partitions = self.options.partitions.clone().unwrap_or_else(all_partitions);
        {
            let mut status = self.status.write().await;
            *status = HarvestStatus::idle(self.client.name());
            status.running = true;
            status.run_id = Some(run_id.clone());
            status.partitions_total = partitions.len();
            status.partitions_exhausted = partitions
                .iter()
                .filter(|c| state.is_exhausted(c))
                .count();
            status.started_at = Some(started_at);
        }

        let sink = ResultSink::new(self.record_store.clone(), self.options.flush_every);
        let mut ledger = Ledger::new(state, sink, self.progress_store.clone());
        let dispatcher = BatchDispatcher::new(
            self.client.clone(),
            self.options.clone(),
            self.stop.signal(),
            self.status.clone(),
        );
        let mut scheduler = PartitionScheduler::new(partitions, self.status.clone());

        let probe_key = match &self.options.probe_key {
            Some(raw) => Some(
                raw.parse::<CandidateKey>()
                    .map_err(|e| HarvestError::Config(e.to_string()))?,
            ),
            None => scheduler.first_pending(&ledger).and_then(|code| {
                CandidateKey::new(code.clone(), ledger.state().cursor(code) + 1).ok()
            }),
        };
        if let Some(key) = probe_key {
            self.probe(&dispatcher, &key).await?;
        }

        info!(
            run_id = %run_id,
            client = self.client.name(),
            partitions = scheduler.partitions().len(),
            concurrency = self.options.concurrency,
            batch_size = self.options.batch_size,
            failure_threshold = self.options.failure_threshold,
            dry_run_keys = ?self.options.dry_run_keys,
            "Harvest started"
        );

        let mut budget = KeyBudget::new(self.options.dry_run_keys);
        let scheduled = scheduler.run(&dispatcher, &mut ledger, &mut budget).await;
        let finished = ledger.finish();

        {
            let mut status = self.status.write().await;
            status.records_pending = ledger.sink().pending();
            status.records_flushed = ledger.run_flushed();
            status.last_flush_at = ledger.sink().last_flush_at();
        }

        let end = match (scheduled, finished) {
            (Err(e), finished) => {
                if let Err(finish_err) = finished {
                    error!(error = ?finish_err, "Shutdown flush failed after fatal error");
                }
                return Err(e.into());
            }
            (Ok(_), Err(FinishError::Sink(e))) => {
                error!(
                    error = %e,
                    pending = ledger.sink().pending(),
                    "Final flush failed, progress not saved"
                );
                return Err(e.into());
            }
            (Ok(_), Err(FinishError::Progress(e))) => return Err(e.into()),
            (Ok(end), Ok(())) => end,
        };

        let status = self.status.read().await.clone();
        Ok(RunSummary {
            run_id,
            outcome: match end {
                ScheduleEnd::AllDone => RunOutcome::Completed,
                ScheduleEnd::Stopped => RunOutcome::Stopped,
                ScheduleEnd::BudgetSpent => RunOutcome::BudgetSpent,
            },
            state: scheduler.state().clone(),
            keys_dispatched: status.keys_dispatched,
            records_found: status.records_found,
            records_flushed: ledger.run_flushed(),
            partitions_exhausted: ledger.state().exhausted_count(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn probe(&self, dispatcher: &BatchDispatcher, key: &CandidateKey) -> Result<(), HarvestError> {
        info!(key = %key, client = self.client.name(), "Probing source");
        match dispatcher.probe(key).await {
            Settled::Done(Outcome::Transient(cause)) => Err(HarvestError::SourceUnreachable {
                key: key.to_string(),
                cause,
            }),
            Settled::Done(outcome) => {
                info!(key = %key, result = outcome.label(), "Source reachable");
                Ok(())
            }
            Settled::Abandoned | Settled::NotStarted => Ok(()),
        }
    }
}
