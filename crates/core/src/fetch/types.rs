//! Types for fetch operations.

use async_trait::async_trait;
use thiserror::Error;

use crate::partition::CandidateKey;
use crate::record::Record;

use super::decode::DecodeError;

/// Transient failure while fetching one key.
///
/// Never surfaced to callers as an `Err`; it travels inside
/// [`Outcome::Transient`] and is retried by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("undecodable response: {0}")]
    Decode(String),
}

impl From<DecodeError> for FetchError {
    fn from(e: DecodeError) -> Self {
        FetchError::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else if e.is_decode() || e.is_body() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Connection(e.to_string())
        }
    }
}

impl FetchError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::Connection(_) => "connection",
            FetchError::Status(_) => "status",
            FetchError::Decode(_) => "decode",
        }
    }
}

/// Result of fetching one candidate key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The key belongs to a candidate; the record was decoded.
    Found(Record),
    /// The source answered definitively that no such candidate exists.
    NotFound,
    /// The attempt failed and may succeed if retried.
    Transient(FetchError),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Found(_) => "found",
            Outcome::NotFound => "not_found",
            Outcome::Transient(_) => "transient",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Outcome::Transient(_))
    }
}

/// Retrieves a single candidate's record from the upstream source.
///
/// Implementations never return an error: every failure mode is folded into
/// an [`Outcome`].
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// Client name for logs.
    fn name(&self) -> &str;

    /// Fetch one key.
    async fn fetch(&self, key: &CandidateKey) -> Outcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kinds() {
        assert_eq!(FetchError::Timeout.kind(), "timeout");
        assert_eq!(FetchError::Status(503).kind(), "status");
        assert_eq!(FetchError::Status(503).to_string(), "unexpected HTTP status 503");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::NotFound.label(), "not_found");
        let transient = Outcome::Transient(FetchError::Connection("refused".into()));
        assert!(transient.is_transient());
        assert_eq!(transient.label(), "transient");
    }
}
