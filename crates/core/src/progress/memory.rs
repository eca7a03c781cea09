use std::sync::Mutex;

use super::{ProgressError, ProgressState, ProgressStore};

/// Progress kept in memory. Used for dry runs and tests.
#[derive(Default)]
pub struct MemoryProgressStore {
    state: Mutex<Option<ProgressState>>,
    saves: Mutex<u64>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing state, as if it had been saved earlier.
    pub fn with_state(state: ProgressState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    /// Last saved state, if any.
    pub fn snapshot(&self) -> Option<ProgressState> {
        self.state.lock().ok().and_then(|s| s.clone())
    }

    pub fn save_count(&self) -> u64 {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self) -> Result<ProgressState, ProgressError> {
        Ok(self.snapshot().unwrap_or_default())
    }

    fn save(&self, state: &ProgressState) -> Result<(), ProgressError> {
        let mut snapshot = state.clone();
        snapshot.compact();
        if let Ok(mut slot) = self.state.lock() {
            *slot = Some(snapshot);
        }
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
