//! Append-only conflict log, one JSON record per line.

use foreman_core::{ConflictRecord, StoreError, StoreResult};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// JSONL log of every conflict ever observed, oldest first.
///
/// Entries are never deduplicated or rewritten - repeated detection of the
/// same contested file re-logs it, preserving the full timeline.
#[derive(Debug, Clone)]
pub struct ConflictLog {
    path: PathBuf,
}

impl ConflictLog {
    /// A log backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    pub fn append(&self, record: &ConflictRecord) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let line =
            serde_json::to_string(record).map_err(|e| StoreError::corrupt(&self.path, e))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        writeln!(file, "{}", line).map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }

    /// The last `n` records, oldest first. Missing log reads as empty.
    pub fn tail(&self, n: usize) -> StoreResult<Vec<ConflictRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };

        let mut records = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let record: ConflictRecord =
                serde_json::from_str(line).map_err(|e| StoreError::corrupt(&self.path, e))?;
            records.push(record);
        }
        let skip = records.len().saturating_sub(n);
        Ok(records.split_off(skip))
    }
}
