//! Batch dispatcher.
//!
//! Fetches a partition's keys batch by batch and decides, through a pure
//! fold over key-ordered outcomes, when the partition is exhausted.

mod fold;
mod ledger;
mod runner;

pub use fold::{fold_resolutions, Fold};
pub use ledger::{FinishError, Ledger};
pub use runner::{
    backoff_delay, effective_batch_size, BatchDispatcher, KeyBudget, PartitionEnd,
    PartitionResult, Settled,
};
