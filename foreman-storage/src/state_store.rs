//! Durable storage for the `{instances, tasks}` aggregate.

use crate::guard::StateGuard;
use foreman_core::{StateDocument, StoreError, StoreResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whole-document JSON store for [`StateDocument`].
///
/// Saves are full-document replaces through a temp file and rename, so a
/// reader never observes a truncated document. Callers that mutate must go
/// through [`StateStore::with_exclusive`], which wraps the whole
/// read-modify-write cycle in the cross-process [`StateGuard`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// A store backed by the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current document, creating and persisting an empty one on
    /// first access.
    ///
    /// A document that exists but does not parse is reported as
    /// `CorruptState` and is left on disk untouched - it is never reset.
    pub fn load(&self) -> StoreResult<StateDocument> {
        if !self.path.exists() {
            let doc = StateDocument::new(chrono::Utc::now());
            self.save(&doc)?;
            return Ok(doc);
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        serde_json::from_str(&contents).map_err(|e| StoreError::corrupt(&self.path, e))
    }

    /// Replace the document atomically: write a sibling temp file, fsync,
    /// rename over the target.
    pub fn save(&self, doc: &StateDocument) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let contents =
            serde_json::to_string_pretty(doc).map_err(|e| StoreError::corrupt(&self.path, e))?;

        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
            file.write_all(contents.as_bytes())
                .map_err(|e| StoreError::io(&tmp, e))?;
            file.sync_all().map_err(|e| StoreError::io(&tmp, e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }

    /// Run a read-modify-write transaction under the cross-process guard.
    ///
    /// The closure receives the freshly loaded document; when it returns
    /// `Ok`, the document is persisted before the guard is released. On
    /// `Err` nothing is written - a failed transaction commits no partial
    /// state.
    pub fn with_exclusive<T, E>(
        &self,
        f: impl FnOnce(&mut StateDocument) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _guard = StateGuard::acquire(&self.path)?;
        let mut doc = self.load()?;
        let value = f(&mut doc)?;
        self.save(&doc)?;
        debug!(path = %self.path.display(), "state transaction committed");
        Ok(value)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
