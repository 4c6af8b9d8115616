//! Worker instance types for multi-agent coordination.
//!
//! A worker is one registered participant (human or AI driven) editing the
//! shared workspace. Workers claim files, heartbeat while active, and are
//! marked completed on release. Completed records are retained as history
//! and excluded from conflict consideration.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// WORKER STATUS
// ============================================================================

/// Lifecycle status of a worker instance.
///
/// `(none) --register/assign--> Active --release--> Completed`. Completed is
/// terminal; re-registering an id is only valid once its holder completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Worker is participating and its claims are binding
    Active,
    /// Worker released its work; claims are void, record kept as history
    Completed,
}

impl WorkerStatus {
    /// Convert to the persisted string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Active => "active",
            WorkerStatus::Completed => "completed",
        }
    }

    /// Parse from the persisted string representation.
    pub fn parse(s: &str) -> Result<Self, WorkerStatusParseError> {
        match s.to_lowercase().as_str() {
            "active" => Ok(WorkerStatus::Active),
            "completed" => Ok(WorkerStatus::Completed),
            _ => Err(WorkerStatusParseError(s.to_string())),
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkerStatus {
    type Err = WorkerStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when parsing an invalid worker status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatusParseError(pub String);

impl fmt::Display for WorkerStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid worker status: {}", self.0)
    }
}

impl std::error::Error for WorkerStatusParseError {}

// ============================================================================
// ACTION TYPE
// ============================================================================

/// Intent declared by an availability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Mutating an existing file; takes a lock
    Edit,
    /// Reading only; never takes a lock
    Read,
    /// Creating a new file; takes a lock
    Create,
}

impl ActionType {
    /// Whether this action claims exclusivity over the file.
    pub fn takes_lock(&self) -> bool {
        matches!(self, ActionType::Edit | ActionType::Create)
    }

    /// Convert to the persisted string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Edit => "edit",
            ActionType::Read => "read",
            ActionType::Create => "create",
        }
    }

    /// Parse from the persisted string representation.
    pub fn parse(s: &str) -> Result<Self, ActionTypeParseError> {
        match s.to_lowercase().as_str() {
            "edit" => Ok(ActionType::Edit),
            "read" => Ok(ActionType::Read),
            "create" => Ok(ActionType::Create),
            _ => Err(ActionTypeParseError(s.to_string())),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ActionTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when parsing an invalid action type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTypeParseError(pub String);

impl fmt::Display for ActionTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid action type: {} (expected edit|read|create)", self.0)
    }
}

impl std::error::Error for ActionTypeParseError {}

// ============================================================================
// WORKER INSTANCE
// ============================================================================

/// One registered worker participating in orchestrated editing.
///
/// `session_ref` and `process_ref` exist only for liveness probing - they
/// never confer ownership. `host` records the machine the worker registered
/// from; liveness probes for pid/session are meaningless across hosts and
/// are skipped when it differs from the checker's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerInstance {
    /// Globally unique, stable for the worker's lifetime
    pub id: String,
    /// Free-text description of current work
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// File paths currently claimed by this worker
    #[serde(default)]
    pub files: Vec<String>,
    /// Lifecycle status
    pub status: WorkerStatus,
    /// External multiplexer session name, liveness only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_ref: Option<String>,
    /// OS process id, liveness only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_ref: Option<u32>,
    /// Machine the worker registered from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// When the worker registered or was first assigned work
    pub started_at: Timestamp,
    /// When the worker released its work
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// Most recent heartbeat; `started_at` is the baseline when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<Timestamp>,
}

impl WorkerInstance {
    /// Create a new active worker with no claims.
    pub fn new(id: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            task: None,
            files: Vec::new(),
            status: WorkerStatus::Active,
            session_ref: None,
            process_ref: None,
            host: None,
            started_at: now,
            completed_at: None,
            last_heartbeat: Some(now),
        }
    }

    /// Set the task description.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Set the session reference.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session_ref = Some(session.into());
        self
    }

    /// Set the process reference.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.process_ref = Some(pid);
        self
    }

    /// Set the originating host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Whether the worker's claims participate in conflict consideration.
    pub fn is_active(&self) -> bool {
        self.status == WorkerStatus::Active
    }

    /// Union a file into the claim set, deduplicated.
    pub fn claim_file(&mut self, file: impl Into<String>) {
        let file = file.into();
        if !self.files.contains(&file) {
            self.files.push(file);
        }
    }

    /// Drop a single file from the claim set, leaving others untouched.
    pub fn yield_file(&mut self, file: &str) {
        self.files.retain(|f| f != file);
    }

    /// Refresh the heartbeat timestamp.
    pub fn heartbeat(&mut self, now: Timestamp) {
        self.last_heartbeat = Some(now);
    }

    /// Baseline for staleness checks: last heartbeat, else registration time.
    pub fn heartbeat_baseline(&self) -> Timestamp {
        self.last_heartbeat.unwrap_or(self.started_at)
    }

    /// Transition to completed, stamping `completed_at`.
    pub fn complete(&mut self, now: Timestamp) {
        self.status = WorkerStatus::Completed;
        self.completed_at = Some(now);
    }
}

// ============================================================================
// ID GENERATION
// ============================================================================

/// Prefix used for generated worker ids when the caller supplies none.
pub const DEFAULT_WORKER_PREFIX: &str = "agent";

/// Generate a worker id: `<prefix>_<suffix>_<pid>`.
///
/// The suffix is the sanitized multiplexer session name when one is known,
/// otherwise the random tail of a UUIDv7. Human-scannable, and collision
/// resistant enough for the handful of workers sharing a workspace.
pub fn generate_worker_id(prefix: &str, session: Option<&str>, pid: u32) -> String {
    let suffix = match session {
        Some(name) if !name.trim().is_empty() => name.trim().replace([' ', '-'], "_"),
        _ => {
            let raw = Uuid::now_v7().simple().to_string();
            raw[raw.len() - 6..].to_string()
        }
    };
    format!("{}_{}_{}", prefix, suffix, pid)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_worker_status_roundtrip() {
        for status in [WorkerStatus::Active, WorkerStatus::Completed] {
            let parsed = WorkerStatus::parse(status.as_str()).unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_action_type_roundtrip() {
        for action in [ActionType::Edit, ActionType::Read, ActionType::Create] {
            let parsed = ActionType::parse(action.as_str()).unwrap();
            assert_eq!(action, parsed);
        }
    }

    #[test]
    fn test_action_type_lock_intent() {
        assert!(ActionType::Edit.takes_lock());
        assert!(ActionType::Create.takes_lock());
        assert!(!ActionType::Read.takes_lock());
    }

    #[test]
    fn test_claim_file_dedupes() {
        let mut worker = WorkerInstance::new("agent_x_1", Utc::now());
        worker.claim_file("src/a.rs");
        worker.claim_file("src/a.rs");
        worker.claim_file("src/b.rs");
        assert_eq!(worker.files, vec!["src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn test_yield_file_leaves_others() {
        let mut worker = WorkerInstance::new("agent_x_1", Utc::now());
        worker.claim_file("src/a.rs");
        worker.claim_file("src/b.rs");
        worker.yield_file("src/a.rs");
        assert_eq!(worker.files, vec!["src/b.rs"]);
    }

    #[test]
    fn test_complete_stamps_timestamp() {
        let now = Utc::now();
        let mut worker = WorkerInstance::new("agent_x_1", now);
        worker.complete(now);
        assert_eq!(worker.status, WorkerStatus::Completed);
        assert_eq!(worker.completed_at, Some(now));
        assert!(!worker.is_active());
    }

    #[test]
    fn test_heartbeat_baseline_falls_back_to_started_at() {
        let now = Utc::now();
        let mut worker = WorkerInstance::new("agent_x_1", now);
        worker.last_heartbeat = None;
        assert_eq!(worker.heartbeat_baseline(), now);
    }

    #[test]
    fn test_generate_worker_id_from_session() {
        let id = generate_worker_id("agent", Some("pair review-2"), 4242);
        assert_eq!(id, "agent_pair_review_2_4242");
    }

    #[test]
    fn test_generate_worker_id_random_suffix_shape() {
        let id = generate_worker_id("agent", None, 7);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts[0], "agent");
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2], "7");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_worker_id("agent", None, 1);
        let b = generate_worker_id("agent", None, 1);
        assert_ne!(a, b);
    }
}
