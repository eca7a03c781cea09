//! Harvest options.

use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::HarvestMode;
use crate::partition::PartitionCode;

/// Explicit option set handed to the orchestrator at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestOptions {
    /// Maximum concurrent in-flight fetches.
    pub concurrency: usize,
    /// Keys per batch (upper bound; batches shrink near exhaustion).
    pub batch_size: usize,
    /// Consecutive failures that end a partition.
    pub failure_threshold: u32,
    /// Buffered records that trigger a flush.
    pub flush_every: usize,
    /// Upper bound on one fetch attempt.
    pub per_fetch_timeout: Duration,
    /// Total attempts per key for transient failures.
    pub retry_attempts: u32,
    /// First backoff delay; doubles per retry.
    pub retry_base_delay: Duration,
    /// Dispatch at most this many keys in total.
    pub dry_run_keys: Option<u64>,
    /// Key used by the connectivity probe.
    pub probe_key: Option<String>,
    /// Restrict the run to these partitions.
    pub partitions: Option<Vec<PartitionCode>>,
}

impl HarvestOptions {
    /// Defaults tuned for a harvest mode.
    pub fn for_mode(mode: HarvestMode) -> Self {
        match mode {
            HarvestMode::Fast => Self {
                concurrency: 15,
                batch_size: 100,
                failure_threshold: 1000,
                flush_every: 10_000,
                per_fetch_timeout: Duration::from_secs(10),
                retry_attempts: 3,
                retry_base_delay: Duration::from_millis(2000),
                dry_run_keys: None,
                probe_key: None,
                partitions: None,
            },
            HarvestMode::Fallback => Self {
                concurrency: 2,
                batch_size: 100,
                failure_threshold: 10,
                flush_every: 100,
                per_fetch_timeout: Duration::from_secs(15),
                retry_attempts: 3,
                retry_base_delay: Duration::from_millis(2000),
                dry_run_keys: None,
                probe_key: None,
                partitions: None,
            },
        }
    }

    /// Stable hash of the options that shape a harvest's results.
    ///
    /// Run-control values (dry run, probe key) are excluded.
    pub fn fingerprint(&self) -> String {
        let material = format!(
            "batch={};threshold={};partitions={}",
            self.batch_size,
            self.failure_threshold,
            self.partitions
                .as_ref()
                .map(|codes| codes.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(","))
                .unwrap_or_else(|| "all".to_string()),
        );
        let digest = Sha256::digest(material.as_bytes());
        digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
    }
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self::for_mode(HarvestMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_defaults() {
        let fast = HarvestOptions::for_mode(HarvestMode::Fast);
        assert_eq!(fast.concurrency, 15);
        assert_eq!(fast.per_fetch_timeout, Duration::from_secs(10));

        let fallback = HarvestOptions::for_mode(HarvestMode::Fallback);
        assert_eq!(fallback.concurrency, 2);
        assert_eq!(fallback.failure_threshold, 10);
        assert_eq!(HarvestOptions::default(), fast);
    }

    #[test]
    fn test_fingerprint_tracks_result_shaping_options() {
        let base = HarvestOptions::default();
        assert_eq!(base.fingerprint(), HarvestOptions::default().fingerprint());
        assert_eq!(base.fingerprint().len(), 16);

        let mut concurrency = base.clone();
        concurrency.concurrency = 3;
        concurrency.dry_run_keys = Some(5);
        assert_eq!(concurrency.fingerprint(), base.fingerprint());

        let mut threshold = base.clone();
        threshold.failure_threshold = 10;
        assert_ne!(threshold.fingerprint(), base.fingerprint());

        let mut subset = base.clone();
        subset.partitions = Some(vec![PartitionCode::new("01").unwrap()]);
        assert_ne!(subset.fingerprint(), base.fingerprint());
    }
}
