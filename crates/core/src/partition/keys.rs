use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::PartitionCode;

/// Width of the numeric suffix of a registration number.
pub const SUFFIX_WIDTH: usize = 6;

/// Largest suffix a key can carry.
pub const MAX_SUFFIX: u32 = 999_999;

/// Errors produced while building or parsing keys.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid partition code: {0:?}")]
    InvalidPartition(String),

    #[error("invalid registration number: {0:?}")]
    InvalidKey(String),

    #[error("suffix {0} out of range 1..=999999")]
    SuffixOutOfRange(u32),
}

/// One registration number to probe.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CandidateKey {
    partition: PartitionCode,
    suffix: u32,
}

impl CandidateKey {
    pub fn new(partition: PartitionCode, suffix: u32) -> Result<Self, KeyError> {
        if suffix == 0 || suffix > MAX_SUFFIX {
            return Err(KeyError::SuffixOutOfRange(suffix));
        }
        Ok(Self { partition, suffix })
    }

    pub fn partition(&self) -> &PartitionCode {
        &self.partition
    }

    pub fn suffix(&self) -> u32 {
        self.suffix
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:0width$}", self.partition, self.suffix, width = SUFFIX_WIDTH)
    }
}

impl FromStr for CandidateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 2 + SUFFIX_WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(KeyError::InvalidKey(s.to_string()));
        }
        let partition = PartitionCode::new(&s[..2])?;
        let suffix: u32 = s[2..]
            .parse()
            .map_err(|_| KeyError::InvalidKey(s.to_string()))?;
        Self::new(partition, suffix)
    }
}

impl TryFrom<String> for CandidateKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CandidateKey> for String {
    fn from(key: CandidateKey) -> Self {
        key.to_string()
    }
}

/// Lazy, ascending sequence of candidate keys for one partition.
///
/// Restartable from any cursor without materializing earlier keys.
#[derive(Debug, Clone)]
pub struct KeyRange {
    partition: PartitionCode,
    next: u32,
}

impl KeyRange {
    /// Keys starting at `start` (inclusive). A start of 0 is treated as 1.
    pub fn new(partition: PartitionCode, start: u32) -> Self {
        Self {
            partition,
            next: start.max(1),
        }
    }

    /// Keys following a saved cursor (the last attempted suffix, 0 if none).
    pub fn resume(partition: PartitionCode, cursor: u32) -> Self {
        Self::new(partition, cursor.saturating_add(1))
    }

    pub fn partition(&self) -> &PartitionCode {
        &self.partition
    }

    /// Suffix of the next key to be produced.
    pub fn next_suffix(&self) -> u32 {
        self.next
    }

    /// Keys left before the end of the key space.
    pub fn remaining(&self) -> u32 {
        if self.next > MAX_SUFFIX {
            0
        } else {
            MAX_SUFFIX - self.next + 1
        }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }
}

impl Iterator for KeyRange {
    type Item = CandidateKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > MAX_SUFFIX {
            return None;
        }
        let key = CandidateKey {
            partition: self.partition.clone(),
            suffix: self.next,
        };
        self.next += 1;
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining() as usize;
        (n, Some(n))
    }
}
