//! Progress tracking for resumable harvests.
//!
//! The [`ProgressState`] records, per partition, the last applied suffix and
//! whether the partition is exhausted, plus a log of keys resolved beyond the
//! cursor. Stores persist it between runs.

mod json_store;
mod memory;
mod store;
mod types;

pub use json_store::JsonProgressStore;
pub use memory::MemoryProgressStore;
pub use store::{ProgressError, ProgressStore};
pub use types::{PartitionProgress, ProgressState, Resolution, RunCheckpoint, PROGRESS_VERSION};
