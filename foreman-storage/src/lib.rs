//! Foreman Storage - Persisted Stores
//!
//! Durable storage for the orchestration subsystem. Three stores, three
//! disciplines:
//!
//! - [`StateStore`]: the `{instances, tasks}` aggregate as one JSON
//!   document, replaced whole via write-temp-then-rename. Read-modify-write
//!   cycles run under a sidecar guard file so concurrent writers cannot
//!   lose updates.
//! - [`LockStore`]: one record per locked file under `locks/`, named by a
//!   SHA-256 hash of the path. Per-file append/delete, never a single
//!   document.
//! - [`ConflictLog`]: append-only JSONL, one conflict per line, oldest
//!   first.
//!
//! No store holds live in-memory state across invocations - every caller
//! re-reads, mutates, and re-persists.

mod conflict_log;
mod guard;
mod lock_store;
mod state_store;

pub use conflict_log::ConflictLog;
pub use guard::StateGuard;
pub use lock_store::LockStore;
pub use state_store::StateStore;

/// Conventional file and directory names under the orchestration root.
pub mod layout {
    /// The state document.
    pub const STATE_FILE: &str = "state.json";
    /// Directory of per-file lock records.
    pub const LOCK_DIR: &str = "locks";
    /// Append-only conflict log.
    pub const CONFLICT_LOG: &str = "conflicts.jsonl";
    /// Extension for lock record files.
    pub const LOCK_EXT: &str = "lock";
}
