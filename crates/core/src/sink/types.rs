//! Record storage trait and shared column layout.

use thiserror::Error;

use crate::record::{Record, Subject};

/// Errors from record storage.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("record storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record database error: {0}")]
    Database(String),

    #[error("record storage unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for SinkError {
    fn from(e: rusqlite::Error) -> Self {
        SinkError::Database(e.to_string())
    }
}

/// Append-only durable storage for records.
///
/// `append` writes the whole slice in order or nothing at all.
pub trait RecordStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    fn append(&self, records: &[Record]) -> Result<(), SinkError>;

    /// Number of records stored.
    fn len(&self) -> Result<u64, SinkError>;

    fn is_empty(&self) -> Result<bool, SinkError> {
        Ok(self.len()? == 0)
    }
}

/// Stable column order shared by every backend.
pub fn columns() -> Vec<&'static str> {
    let mut columns = vec!["registration_number", "council_code"];
    columns.extend(Subject::ALL.iter().map(|s| s.column()));
    columns.push("total_score");
    columns.push("captured_at");
    columns
}

/// Field values of `record` in [`columns`] order. Absent scores are empty.
pub fn row_values(record: &Record) -> Vec<String> {
    let mut values = Vec::with_capacity(Subject::ALL.len() + 4);
    values.push(record.registration_number.clone());
    values.push(record.council_code.clone());
    for subject in Subject::ALL {
        values.push(record.score(subject).unwrap_or_default().to_string());
    }
    values.push(record.total_score.clone());
    values.push(record.captured_at.to_rfc3339());
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_layout() {
        let columns = columns();
        assert_eq!(columns.len(), 17);
        assert_eq!(columns[0], "registration_number");
        assert_eq!(columns[2], "math");
        assert_eq!(columns[14], "agricultural_technology");
        assert_eq!(columns[16], "captured_at");
    }

    #[test]
    fn test_row_values_align_with_columns() {
        let record = crate::testing::fixtures::record("05000012");
        let values = row_values(&record);
        assert_eq!(values.len(), columns().len());
        assert_eq!(values[0], "05000012");
        assert_eq!(values[1], "05");
        assert_eq!(values[2], record.score(Subject::Math).unwrap());
        // physics not taken
        assert_eq!(values[5], "");
    }
}
