//! Buffered result sink.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{RecordStore, SinkError};
use crate::metrics;
use crate::record::Record;

/// Ordered buffer in front of a [`RecordStore`].
///
/// Records are appended to storage in insertion order. A failed flush keeps
/// the buffer intact; the next attempt waits for a batch boundary
/// ([`ResultSink::flush_if_due`]) or shutdown.
pub struct ResultSink {
    store: Arc<dyn RecordStore>,
    buffer: Vec<Record>,
    flush_every: usize,
    flush_failed: bool,
    flushed: u64,
    last_flush_at: Option<DateTime<Utc>>,
}

impl ResultSink {
    pub fn new(store: Arc<dyn RecordStore>, flush_every: usize) -> Self {
        Self {
            store,
            buffer: Vec::new(),
            flush_every: flush_every.max(1),
            flush_failed: false,
            flushed: 0,
            last_flush_at: None,
        }
    }

    /// Buffer a record. Returns `true` when this triggered a successful flush.
    pub fn add(&mut self, record: Record) -> bool {
        self.buffer.push(record);
        metrics::RECORDS_PENDING.set(self.buffer.len() as i64);
        if self.flush_failed || self.buffer.len() < self.flush_every {
            return false;
        }
        match self.flush() {
            Ok(n) => n > 0,
            Err(e) => {
                warn!(error = %e, pending = self.buffer.len(), "Flush failed, keeping buffer");
                false
            }
        }
    }

    /// Flush when the threshold is reached or a previous flush failed.
    pub fn flush_if_due(&mut self) -> Result<bool, SinkError> {
        if self.buffer.is_empty() {
            return Ok(false);
        }
        if self.flush_failed || self.buffer.len() >= self.flush_every {
            return self.flush().map(|n| n > 0);
        }
        Ok(false)
    }

    /// Append the whole buffer to storage. Returns the number of records written.
    pub fn flush(&mut self) -> Result<usize, SinkError> {
        if self.buffer.is_empty() {
            self.flush_failed = false;
            return Ok(0);
        }
        match self.store.append(&self.buffer) {
            Ok(()) => {
                let written = self.buffer.len();
                self.buffer.clear();
                self.flush_failed = false;
                self.flushed += written as u64;
                self.last_flush_at = Some(Utc::now());
                metrics::RECORDS_FLUSHED.inc_by(written as u64);
                metrics::RECORDS_PENDING.set(0);
                info!(store = self.store.name(), written, total = self.flushed, "Flushed records");
                Ok(written)
            }
            Err(e) => {
                self.flush_failed = true;
                metrics::FLUSH_FAILURES.inc();
                debug!(store = self.store.name(), error = %e, "Record store append failed");
                Err(e)
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Records flushed by this sink.
    pub fn flushed(&self) -> u64 {
        self.flushed
    }

    pub fn last_flush_at(&self) -> Option<DateTime<Utc>> {
        self.last_flush_at
    }

    pub fn has_failed_flush(&self) -> bool {
        self.flush_failed
    }
}
