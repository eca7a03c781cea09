//! Progress store trait.

use thiserror::Error;

use super::ProgressState;

/// Errors from a progress store. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("progress I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("progress file is corrupt: {0}")]
    Corrupt(String),

    #[error("failed to encode progress: {0}")]
    Encode(String),
}

/// Loads and saves [`ProgressState`].
pub trait ProgressStore: Send + Sync {
    /// Load the saved state; an absent store yields the empty state.
    fn load(&self) -> Result<ProgressState, ProgressError>;

    /// Replace the saved state.
    fn save(&self, state: &ProgressState) -> Result<(), ProgressError>;
}
