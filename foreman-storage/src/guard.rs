//! Cross-process guard for state read-modify-write cycles.
//!
//! The baseline protocol replaced the state document with no concurrency
//! token, so two overlapping writers could silently lose an update. The
//! guard closes that hole: a sidecar file created with `create_new` serves
//! as a cross-process mutex around the whole read-modify-write cycle.
//! Guards left behind by crashed processes are taken over once they age
//! past a takeover threshold.

use foreman_core::{StoreError, StoreResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// How long acquisition retries before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause between acquisition attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(50);
/// A guard older than this belongs to a dead writer and is taken over.
const STALE_AFTER: Duration = Duration::from_secs(30);

/// Held guard over the state document. Released on drop.
#[derive(Debug)]
pub struct StateGuard {
    path: PathBuf,
}

impl StateGuard {
    /// Acquire the guard for the state document at `state_path`.
    ///
    /// Spins with a bounded retry budget; a guard file that has sat on disk
    /// past [`STALE_AFTER`] is removed and the claim retried. Returns
    /// `StoreError::GuardTimeout` when the budget is exhausted.
    pub fn acquire(state_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = state_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let path = guard_path(state_path);
        let deadline = std::time::Instant::now() + ACQUIRE_TIMEOUT;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if guard_is_stale(&path) {
                        warn!(guard = %path.display(), "taking over stale state guard");
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if std::time::Instant::now() >= deadline {
                        return Err(StoreError::GuardTimeout {
                            path: path.display().to_string(),
                        });
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(err) => return Err(StoreError::io(&path, err)),
            }
        }
    }
}

impl Drop for StateGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn guard_path(state_path: &Path) -> PathBuf {
    let mut name = state_path.as_os_str().to_os_string();
    name.push(".guard");
    PathBuf::from(name)
}

fn guard_is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age > STALE_AFTER)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_guard_creates_and_removes_sidecar() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state.json");
        let sidecar = dir.path().join("state.json.guard");

        {
            let _guard = StateGuard::acquire(&state).unwrap();
            assert!(sidecar.exists());
        }
        assert!(!sidecar.exists());
    }

    #[test]
    fn test_contended_guard_times_out() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state.json");

        let _held = StateGuard::acquire(&state).unwrap();
        let result = StateGuard::acquire(&state);
        assert!(matches!(result, Err(StoreError::GuardTimeout { .. })));
    }

    #[test]
    fn test_fresh_guard_is_not_stale() {
        let dir = tempdir().unwrap();
        let sidecar = dir.path().join("state.json.guard");
        std::fs::write(&sidecar, "1").unwrap();
        assert!(!guard_is_stale(&sidecar));
    }

    #[test]
    fn test_missing_guard_is_not_stale() {
        let dir = tempdir().unwrap();
        assert!(!guard_is_stale(&dir.path().join("absent.guard")));
    }
}
