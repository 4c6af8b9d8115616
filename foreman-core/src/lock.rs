//! File lock types.
//!
//! A lock is an exclusivity claim on a single file path, owned by exactly
//! one worker while valid. Locks are stored one record per file, keyed by a
//! SHA-256 hash of the path so identifiers stay filesystem-safe regardless
//! of what the path contains.

use crate::{Timestamp, WorkerInstance};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Exclusivity claim on one file path.
///
/// Validity is not intrinsic: a lock is binding only while its owning
/// worker is alive. Stale locks (dead owner) are reclaimed lazily by the
/// next claimant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileLock {
    /// The claimed path - the logical key
    pub file: String,
    /// Id of the owning worker instance
    pub instance: String,
    /// When the claim was taken
    pub locked_at: Timestamp,
}

impl FileLock {
    /// Create a lock record for `file` owned by `instance`.
    pub fn new(file: impl Into<String>, instance: impl Into<String>, now: Timestamp) -> Self {
        Self {
            file: file.into(),
            instance: instance.into(),
            locked_at: now,
        }
    }

    /// Whether this lock belongs to the given worker.
    pub fn owned_by(&self, instance: &str) -> bool {
        self.instance == instance
    }

    /// Whether this lock is binding given its owner's record.
    ///
    /// The owner must be the recorded instance and still active; anything
    /// else makes the lock non-binding (reclaimable).
    pub fn is_binding(&self, owner: Option<&WorkerInstance>) -> bool {
        match owner {
            Some(worker) => worker.id == self.instance && worker.is_active(),
            None => false,
        }
    }
}

/// Stable, filesystem-safe identifier for the lock record of `file`:
/// lowercase hex SHA-256 of the path string.
pub fn lock_key(file: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.as_bytes());
    hex::encode(hasher.finalize())
}
