//! Append-only CSV record store.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use super::{columns, row_values, RecordStore, SinkError};
use crate::record::Record;

/// CSV file with a header row, appended to on every flush.
pub struct CsvRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvRecordStore {
    /// Open (or create) the CSV file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_chunk(file: &mut File, chunk: &str) -> Result<(), SinkError> {
        file.write_all(chunk.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn line(fields: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let mut out = fields
        .into_iter()
        .map(|f| escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    out
}

impl RecordStore for CsvRecordStore {
    fn name(&self) -> &str {
        "csv"
    }

    fn append(&self, records: &[Record]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        let _guard = self
            .lock
            .lock()
            .map_err(|_| SinkError::Unavailable("csv store lock poisoned".to_string()))?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        let previous_len = file.metadata()?.len();

        let mut chunk = String::new();
        if previous_len == 0 {
            chunk.push_str(&line(columns()));
        }
        for record in records {
            chunk.push_str(&line(row_values(record)));
        }

        if let Err(e) = Self::write_chunk(&mut file, &chunk) {
            // Cut off any partial write so earlier rows stay untouched
            if let Err(truncate_err) = file.set_len(previous_len) {
                warn!(
                    path = %self.path.display(),
                    error = %truncate_err,
                    "Failed to roll back partial CSV write"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    fn len(&self) -> Result<u64, SinkError> {
        let file = File::open(&self.path)?;
        let lines = BufReader::new(file).lines().count() as u64;
        Ok(lines.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use tempfile::tempdir;

    #[test]
    fn test_header_written_once() {
        let dir = tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("out/results.csv")).unwrap();
        assert!(store.is_empty().unwrap());

        store.append(&[fixtures::record("01000001")]).unwrap();
        store
            .append(&[fixtures::record("01000003"), fixtures::record("01000004")])
            .unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("registration_number,council_code,math,"));
        assert!(lines[1].starts_with("01000001,01,8.25,7.5,9.2,,"));
        assert!(lines[3].starts_with("01000004,"));
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn test_append_preserves_existing_bytes() {
        let dir = tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("results.csv")).unwrap();
        store.append(&[fixtures::record("02000001")]).unwrap();
        let before = fs::read(store.path()).unwrap();

        store.append(&[fixtures::record("02000002")]).unwrap();
        let after = fs::read(store.path()).unwrap();
        assert_eq!(&after[..before.len()], &before[..]);
    }

    #[test]
    fn test_reopen_does_not_repeat_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        CsvRecordStore::new(&path)
            .unwrap()
            .append(&[fixtures::record("03000001")])
            .unwrap();
        CsvRecordStore::new(&path)
            .unwrap()
            .append(&[fixtures::record("03000002")])
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("registration_number").count(), 1);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("7.75"), "7.75");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
