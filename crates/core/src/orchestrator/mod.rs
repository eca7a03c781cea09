//! Harvest orchestrator.
//!
//! The orchestrator owns one run end to end:
//! - **Resume**: load progress and the previous run checkpoint
//! - **Probe**: one fetch to fail fast when the source is unreachable
//! - **Scan**: partitions in order, batches within a partition concurrently
//! - **Shutdown**: flush records, then persist progress

mod config;
mod runner;
mod stop;
mod types;

pub use config::HarvestOptions;
pub use runner::HarvestOrchestrator;
pub use stop::{stop_channel, StopHandle, StopSignal};
pub use types::{HarvestError, HarvestStatus, RunOutcome, RunSummary};
