//! Foreman Core - Entity Types
//!
//! Pure data structures for the orchestration subsystem. All other crates
//! depend on this. This crate contains data types and the error taxonomy -
//! no I/O and no coordination logic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod context;
pub mod error;
pub mod lock;
pub mod state;
pub mod worker;

pub use context::{ExecutionContext, OutputMode, OutputModeParseError};
pub use error::{EngineError, EngineResult, StoreError, StoreResult};
pub use lock::{lock_key, FileLock};
pub use state::{ConflictRecord, StateDocument, TaskRecord};
pub use worker::{
    generate_worker_id, ActionType, ActionTypeParseError, WorkerInstance, WorkerStatus,
    WorkerStatusParseError, DEFAULT_WORKER_PREFIX,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone, serialized as ISO-8601.
pub type Timestamp = DateTime<Utc>;

/// Heartbeat staleness window: a worker that has not heartbeat within this
/// many seconds is no longer considered alive. Fixed at 5 minutes for
/// behavioral parity with the original coordination protocol.
pub const DEFAULT_HEARTBEAT_WINDOW_SECS: i64 = 300;

/// Generate a new UUIDv7 task id (timestamp-sortable).
pub fn new_task_id() -> Uuid {
    Uuid::now_v7()
}
