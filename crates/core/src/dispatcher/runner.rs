//! Batch dispatcher implementation.
//!
//! Scans one partition in batches. Each batch fans out to a bounded pool of
//! concurrent fetches, settles completely, and is then folded in key order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::fetch::{FetchClient, FetchError, Outcome};
use crate::metrics;
use crate::orchestrator::{HarvestOptions, HarvestStatus, StopSignal};
use crate::partition::{CandidateKey, KeyRange, PartitionCode};
use crate::progress::{ProgressError, Resolution};

use super::{fold_resolutions, Ledger};

/// How a partition scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PartitionEnd {
    /// The failure streak reached the threshold at suffix `at`.
    Exhausted { at: u32 },
    /// Every suffix up to 999999 was applied.
    KeySpaceEnd,
    Stopped,
    /// The dry-run key budget ran out.
    BudgetSpent,
}

impl PartitionEnd {
    /// Whether the partition is done for good.
    pub fn is_complete(&self) -> bool {
        matches!(self, PartitionEnd::Exhausted { .. } | PartitionEnd::KeySpaceEnd)
    }
}

/// Summary of one partition scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionResult {
    pub partition: PartitionCode,
    pub end: PartitionEnd,
    pub cursor: u32,
    pub streak: u32,
    /// Keys fetched during this scan.
    pub dispatched: u64,
    pub found: u64,
}

/// Remaining dry-run allowance shared across partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBudget(Option<u64>);

impl KeyBudget {
    pub fn new(limit: Option<u64>) -> Self {
        Self(limit)
    }

    pub fn unlimited() -> Self {
        Self(None)
    }

    pub fn remaining(&self) -> Option<u64> {
        self.0
    }

    pub fn is_spent(&self) -> bool {
        self.0 == Some(0)
    }

    fn take(&mut self, n: u64) {
        if let Some(left) = self.0.as_mut() {
            *left = left.saturating_sub(n);
        }
    }
}

/// What happened to one dispatched key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// Final outcome after retries.
    Done(Outcome),
    /// A stop interrupted the retry backoff; the key stays unresolved.
    Abandoned,
    /// The stop arrived before the fetch started.
    NotStarted,
}

enum Entry {
    Replayed(Resolution),
    Fetched(Outcome),
    Unresolved,
}

/// Largest batch that cannot run past a decision point.
pub fn effective_batch_size(
    batch_size: usize,
    threshold: u32,
    streak: u32,
    remaining_keys: u32,
    budget: Option<u64>,
) -> usize {
    let mut size = batch_size
        .min(threshold.saturating_sub(streak) as usize)
        .min(remaining_keys as usize);
    if let Some(budget) = budget {
        size = size.min(usize::try_from(budget).unwrap_or(usize::MAX));
    }
    size.max(1)
}

/// Exponential backoff before retry `attempt + 1`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

/// Runs partition scans against a fetch client.
pub struct BatchDispatcher {
    client: Arc<dyn FetchClient>,
    options: HarvestOptions,
    stop: StopSignal,
    status: Arc<RwLock<HarvestStatus>>,
}

impl BatchDispatcher {
    pub fn new(
        client: Arc<dyn FetchClient>,
        options: HarvestOptions,
        stop: StopSignal,
        status: Arc<RwLock<HarvestStatus>>,
    ) -> Self {
        Self {
            client,
            options,
            stop,
            status,
        }
    }

    /// Scan `partition` from `start_suffix + 1` until it is exhausted, the
    /// key space ends, the budget is spent or a stop is requested.
    ///
    /// Only progress store failures escape as errors.
    pub async fn run(
        &self,
        partition: &PartitionCode,
        start_suffix: u32,
        ledger: &mut Ledger,
        budget: &mut KeyBudget,
    ) -> Result<PartitionResult, ProgressError> {
        let threshold = self.options.failure_threshold;
        let mut range = KeyRange::resume(partition.clone(), start_suffix);
        let mut streak = ledger
            .state()
            .partition(partition)
            .map(|p| p.streak)
            .unwrap_or(0);
        let mut dispatched = 0u64;
        let mut found = 0u64;

        info!(
            partition = %partition,
            council = partition.display_name(),
            cursor = start_suffix,
            streak,
            "Scanning partition"
        );

        let end = loop {
            if self.stop.is_stopped() {
                break PartitionEnd::Stopped;
            }
            if range.is_finished() {
                break PartitionEnd::KeySpaceEnd;
            }
            if budget.is_spent() {
                break PartitionEnd::BudgetSpent;
            }

            let size = effective_batch_size(
                self.options.batch_size,
                threshold,
                streak,
                range.remaining(),
                budget.remaining(),
            );
            let keys: Vec<CandidateKey> = range.by_ref().take(size).collect();

            let mut entries: Vec<(CandidateKey, Entry)> = Vec::with_capacity(keys.len());
            let mut to_fetch = Vec::new();
            for key in keys {
                match ledger.state().resolution(&key) {
                    Some(resolution) => entries.push((key, Entry::Replayed(resolution))),
                    None => to_fetch.push(key),
                }
            }
            budget.take(to_fetch.len() as u64);
            metrics::BATCHES_DISPATCHED.inc();

            let mut batch_dispatched = 0u64;
            for (key, settled) in self.dispatch(to_fetch).await {
                let entry = match settled {
                    Settled::Done(outcome) => {
                        batch_dispatched += 1;
                        Entry::Fetched(outcome)
                    }
                    Settled::Abandoned => {
                        batch_dispatched += 1;
                        Entry::Unresolved
                    }
                    Settled::NotStarted => Entry::Unresolved,
                };
                entries.push((key, entry));
            }
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            // Only the settled prefix takes part in the streak decision
            let prefix: Vec<(u32, Resolution)> = entries
                .iter()
                .map_while(|(key, entry)| match entry {
                    Entry::Replayed(r) => Some((key.suffix(), *r)),
                    Entry::Fetched(outcome) => Some((key.suffix(), resolution_of(outcome))),
                    Entry::Unresolved => None,
                })
                .collect();
            let interrupted = prefix.len() < entries.len();
            let fold = fold_resolutions(streak, threshold, &prefix);

            let mut batch_found = 0u64;
            for (key, entry) in entries {
                let Entry::Fetched(outcome) = entry else {
                    continue;
                };
                let resolution = resolution_of(&outcome);
                self.log_outcome(&key, &outcome);
                metrics::FETCH_OUTCOMES
                    .with_label_values(&[self.client.name(), outcome_label(resolution)])
                    .inc();
                let record = match outcome {
                    Outcome::Found(record) => {
                        batch_found += 1;
                        Some(record)
                    }
                    _ => None,
                };
                ledger.resolve(&key, resolution, record)?;
            }

            ledger.advance(partition, &fold);
            ledger.end_batch()?;
            streak = fold.streak;
            dispatched += batch_dispatched;
            found += batch_found;

            self.publish(partition, ledger, batch_dispatched, batch_found).await;
            debug!(
                partition = %partition,
                cursor = ledger.state().cursor(partition),
                streak,
                dispatched = batch_dispatched,
                found = batch_found,
                "Batch applied"
            );

            if let Some(at) = fold.exhausted_at {
                break PartitionEnd::Exhausted { at };
            }
            if interrupted {
                break PartitionEnd::Stopped;
            }
        };

        let cursor = ledger.state().cursor(partition);
        info!(
            partition = %partition,
            cursor,
            dispatched,
            found,
            end = ?end,
            "Partition scan ended"
        );

        Ok(PartitionResult {
            partition: partition.clone(),
            end,
            cursor,
            streak,
            dispatched,
            found,
        })
    }

    /// Fetch one key with retries, as the connectivity probe does.
    pub async fn probe(&self, key: &CandidateKey) -> Settled {
        self.fetch_with_retry(key).await
    }

    async fn dispatch(&self, keys: Vec<CandidateKey>) -> Vec<(CandidateKey, Settled)> {
        let concurrency = self.options.concurrency.max(1);
        stream::iter(keys)
            .map(|key| async move {
                if self.stop.is_stopped() {
                    return (key, Settled::NotStarted);
                }
                let settled = self.fetch_with_retry(&key).await;
                (key, settled)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    async fn fetch_with_retry(&self, key: &CandidateKey) -> Settled {
        let attempts = self.options.retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_once(key).await {
                Outcome::Transient(e) if attempt < attempts => {
                    metrics::FETCH_RETRIES.with_label_values(&[e.kind()]).inc();
                    let delay = backoff_delay(self.options.retry_base_delay, attempt);
                    debug!(
                        key = %key,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying"
                    );
                    if !self.stop.sleep(delay).await {
                        return Settled::Abandoned;
                    }
                    attempt += 1;
                }
                outcome => return Settled::Done(outcome),
            }
        }
    }

    async fn fetch_once(&self, key: &CandidateKey) -> Outcome {
        let started = Instant::now();
        let outcome =
            match tokio::time::timeout(self.options.per_fetch_timeout, self.client.fetch(key)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Outcome::Transient(FetchError::Timeout),
            };
        metrics::FETCH_DURATION
            .with_label_values(&[self.client.name()])
            .observe(started.elapsed().as_secs_f64());
        outcome
    }

    fn log_outcome(&self, key: &CandidateKey, outcome: &Outcome) {
        match outcome {
            Outcome::Found(record) => {
                debug!(key = %key, total = %record.total_score, "Found")
            }
            Outcome::NotFound => debug!(key = %key, "Not found"),
            Outcome::Transient(e) => {
                warn!(key = %key, error = %e, "Fetch failed after retries")
            }
        }
    }

    async fn publish(&self, partition: &PartitionCode, ledger: &Ledger, dispatched: u64, found: u64) {
        let mut status = self.status.write().await;
        status.partition = Some(partition.to_string());
        status.cursor = ledger.state().cursor(partition);
        status.streak = ledger
            .state()
            .partition(partition)
            .map(|p| p.streak)
            .unwrap_or(0);
        status.keys_dispatched += dispatched;
        status.records_found += found;
        status.records_pending = ledger.sink().pending();
        status.records_flushed = ledger.run_flushed();
        status.last_flush_at = ledger.sink().last_flush_at();
    }
}

fn resolution_of(outcome: &Outcome) -> Resolution {
    match outcome {
        Outcome::Found(_) => Resolution::Found,
        Outcome::NotFound => Resolution::NotFound,
        Outcome::Transient(_) => Resolution::Failed,
    }
}

fn outcome_label(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::Found => "found",
        Resolution::NotFound => "not_found",
        Resolution::Failed => "failed",
    }
}
