//! Result sink and durable record stores.

mod buffer;
mod csv_store;
mod memory;
mod sqlite_store;
mod types;

pub use buffer::ResultSink;
pub use csv_store::CsvRecordStore;
pub use memory::MemoryRecordStore;
pub use sqlite_store::SqliteRecordStore;
pub use types::{columns, row_values, RecordStore, SinkError};
