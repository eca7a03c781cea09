//! Exam councils and the candidate keys scanned inside them.
//!
//! A registration number is the 2-digit council code followed by a 6-digit,
//! zero-padded sequence number. Councils are scanned one at a time, in code
//! order; [`KeyRange`] enumerates the candidate keys of one council lazily.

mod keys;
mod types;

pub use keys::{CandidateKey, KeyError, KeyRange, MAX_SUFFIX, SUFFIX_WIDTH};
pub use types::{all_partitions, display_name, PartitionCode, PARTITION_COUNT};
