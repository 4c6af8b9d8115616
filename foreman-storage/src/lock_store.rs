//! One lock record per contested file, addressed by a hash of the path.

use crate::layout;
use foreman_core::{lock_key, FileLock, StoreError, StoreResult, Timestamp};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory-backed store of [`FileLock`] records.
///
/// Each lock lives in its own file named `<sha256(path)>.lock`, so claims
/// on unrelated files never contend. The store performs no conflict
/// checks - deciding whether a claim may proceed is the engine's job.
#[derive(Debug, Clone)]
pub struct LockStore {
    dir: PathBuf,
}

impl LockStore {
    /// A store rooted at `dir`, created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the lock records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Unconditionally write (or overwrite) the lock record for `file`.
    pub fn acquire(&self, file: &str, instance: &str, now: Timestamp) -> StoreResult<FileLock> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let lock = FileLock::new(file, instance, now);
        let path = self.record_path(file);
        let contents =
            serde_json::to_string_pretty(&lock).map_err(|e| StoreError::corrupt(&path, e))?;
        fs::write(&path, contents).map_err(|e| StoreError::io(&path, e))?;
        debug!(file, instance, "lock acquired");
        Ok(lock)
    }

    /// Compare-and-delete: remove the record for `file` only when its
    /// current owner is `instance`. Returns whether a record was removed.
    ///
    /// A late release therefore never destroys a lock someone else has
    /// since taken on the same path.
    pub fn release(&self, file: &str, instance: &str) -> StoreResult<bool> {
        let path = self.record_path(file);
        match self.read_record(&path)? {
            Some(lock) if lock.owned_by(instance) => {
                fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
                debug!(file, instance, "lock released");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Current holder of `file`, or `None`.
    pub fn peek(&self, file: &str) -> StoreResult<Option<FileLock>> {
        self.read_record(&self.record_path(file))
    }

    /// Every currently held lock, ordered by file path.
    pub fn list(&self) -> StoreResult<Vec<FileLock>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut locks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(layout::LOCK_EXT) {
                continue;
            }
            if let Some(lock) = self.read_record(&path)? {
                locks.push(lock);
            }
        }
        locks.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(locks)
    }

    fn record_path(&self, file: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", lock_key(file), layout::LOCK_EXT))
    }

    fn read_record(&self, path: &Path) -> StoreResult<Option<FileLock>> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(|e| StoreError::corrupt(path, e)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, LockStore) {
        let dir = tempdir().unwrap();
        let store = LockStore::new(dir.path().join("locks"));
        (dir, store)
    }

    #[test]
    fn test_acquire_then_peek() {
        let (_dir, store) = store();
        store.acquire("src/a.rs", "agent_x_1", Utc::now()).unwrap();

        let lock = store.peek("src/a.rs").unwrap().unwrap();
        assert_eq!(lock.file, "src/a.rs");
        assert_eq!(lock.instance, "agent_x_1");
        assert!(store.peek("src/b.rs").unwrap().is_none());
    }

    #[test]
    fn test_acquire_overwrites_existing_record() {
        let (_dir, store) = store();
        store.acquire("src/a.rs", "agent_x_1", Utc::now()).unwrap();
        store.acquire("src/a.rs", "agent_y_2", Utc::now()).unwrap();

        let lock = store.peek("src/a.rs").unwrap().unwrap();
        assert_eq!(lock.instance, "agent_y_2");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_release_is_compare_and_delete() {
        let (_dir, store) = store();
        store.acquire("src/a.rs", "agent_x_1", Utc::now()).unwrap();

        // Wrong owner: no-op.
        assert!(!store.release("src/a.rs", "agent_y_2").unwrap());
        assert!(store.peek("src/a.rs").unwrap().is_some());

        // Right owner: removed.
        assert!(store.release("src/a.rs", "agent_x_1").unwrap());
        assert!(store.peek("src/a.rs").unwrap().is_none());

        // Already gone: no-op.
        assert!(!store.release("src/a.rs", "agent_x_1").unwrap());
    }

    #[test]
    fn test_list_orders_by_file() {
        let (_dir, store) = store();
        let now = Utc::now();
        store.acquire("src/zeta.rs", "w", now).unwrap();
        store.acquire("src/alpha.rs", "w", now).unwrap();

        let files: Vec<String> = store.list().unwrap().into_iter().map(|l| l.file).collect();
        assert_eq!(files, vec!["src/alpha.rs", "src/zeta.rs"]);
    }

    #[test]
    fn test_list_on_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let store = LockStore::new(dir.path().join("never-created"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(
            store.dir().join(format!("{}.lock", lock_key("src/a.rs"))),
            "not json",
        )
        .unwrap();

        assert!(matches!(
            store.peek("src/a.rs"),
            Err(StoreError::CorruptState { .. })
        ));
    }
}
