use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use super::{RecordStore, SinkError};
use crate::record::Record;

/// In-memory record store for dry runs and tests.
///
/// Can be told to fail the next `n` appends to exercise flush recovery.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<Record>>,
    fail_next: AtomicU32,
    appends: AtomicU32,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` appends fail without storing anything.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn registration_numbers(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|r| r.registration_number)
            .collect()
    }

    /// Successful appends so far.
    pub fn append_count(&self) -> u32 {
        self.appends.load(Ordering::SeqCst)
    }
}

impl RecordStore for MemoryRecordStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn append(&self, records: &[Record]) -> Result<(), SinkError> {
        let pending_failures = self.fail_next.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.fail_next.store(pending_failures - 1, Ordering::SeqCst);
            return Err(SinkError::Unavailable("injected failure".to_string()));
        }
        let mut stored = self
            .records
            .lock()
            .map_err(|_| SinkError::Unavailable("memory store lock poisoned".to_string()))?;
        stored.extend_from_slice(records);
        self.appends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn len(&self) -> Result<u64, SinkError> {
        Ok(self.records().len() as u64)
    }
}
