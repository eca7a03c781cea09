//! JSON file progress store.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::{ProgressError, ProgressState, ProgressStore};

/// Progress kept in a single JSON file, replaced atomically on save.
pub struct JsonProgressStore {
    path: PathBuf,
}

impl JsonProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl ProgressStore for JsonProgressStore {
    fn load(&self) -> Result<ProgressState, ProgressError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No progress file, starting empty");
                return Ok(ProgressState::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&text).map_err(|e| {
            ProgressError::Corrupt(format!("{}: {}", self.path.display(), e))
        })
    }

    fn save(&self, state: &ProgressState) -> Result<(), ProgressError> {
        let mut snapshot = state.clone();
        snapshot.compact();
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| ProgressError::Encode(e.to_string()))?;

        let parent = self.parent_dir();
        fs::create_dir_all(parent)?;

        // temp file in the target directory so persist is a same-filesystem rename
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| ProgressError::Io(e.error))?;

        // the rename is only durable once the directory entry is synced
        File::open(parent)?.sync_all()?;

        debug!(
            path = %self.path.display(),
            partitions = snapshot.partitions.len(),
            resolved = snapshot.resolved.len(),
            "Progress saved"
        );
        Ok(())
    }
}
