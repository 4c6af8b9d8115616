//! The persisted state document and its append-only history records.

use crate::{ActionType, Timestamp, WorkerInstance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// STATE DOCUMENT
// ============================================================================

/// The whole-document aggregate the state store persists.
///
/// Instances are keyed by worker id in a BTreeMap so serialization order is
/// deterministic and `save(load())` is byte-stable. The document is always
/// replaced as a whole - never merged or partially appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    /// All known workers, active and completed, keyed by id
    #[serde(default)]
    pub instances: BTreeMap<String, WorkerInstance>,
    /// Append-only task history
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    /// When this workspace's orchestration state was first created
    pub started_at: Timestamp,
}

impl StateDocument {
    /// Create an empty document stamped with the given creation time.
    pub fn new(now: Timestamp) -> Self {
        Self {
            instances: BTreeMap::new(),
            tasks: Vec::new(),
            started_at: now,
        }
    }

    /// Workers whose claims participate in conflict consideration.
    pub fn active_instances(&self) -> impl Iterator<Item = &WorkerInstance> {
        self.instances.values().filter(|w| w.is_active())
    }

    /// Number of active workers.
    pub fn active_count(&self) -> usize {
        self.active_instances().count()
    }

    /// Number of completed workers.
    pub fn completed_count(&self) -> usize {
        self.instances.values().filter(|w| !w.is_active()).count()
    }

    /// Append a task history record.
    pub fn record_task(&mut self, task: TaskRecord) {
        self.tasks.push(task);
    }
}

// ============================================================================
// TASK HISTORY
// ============================================================================

/// One entry in the append-only task history. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique task id (UUIDv7, timestamp-sortable)
    pub id: Uuid,
    /// Id of the worker the task was assigned to
    pub instance: String,
    /// Free-text description
    pub description: String,
    /// When the assignment happened
    pub created_at: Timestamp,
}

impl TaskRecord {
    /// Create a task record for an assignment.
    pub fn new(instance: impl Into<String>, description: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: crate::new_task_id(),
            instance: instance.into(),
            description: description.into(),
            created_at: now,
        }
    }
}

// ============================================================================
// CONFLICT LOG RECORDS
// ============================================================================

/// One append-only conflict log entry.
///
/// Two shapes share this record: a claim conflict found by the scan (two
/// active workers listing the same file) and a probe conflict (an
/// availability check denied by a live holder, which also carries the
/// declared action). Repeated detection re-logs; entries are never
/// deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// The contested file path
    pub file: String,
    /// The two workers involved; for probe conflicts, requester first
    pub instances: [String; 2],
    /// Declared intent, present only for probe conflicts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionType>,
    /// When the conflict was observed
    pub detected_at: Timestamp,
}

impl ConflictRecord {
    /// A conflict found by the claim scan: both workers list `file`.
    pub fn claim(
        file: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            file: file.into(),
            instances: [first.into(), second.into()],
            action: None,
            detected_at: now,
        }
    }

    /// A conflict hit by an availability probe denied by a live holder.
    pub fn probe(
        file: impl Into<String>,
        requested_by: impl Into<String>,
        locked_by: impl Into<String>,
        action: ActionType,
        now: Timestamp,
    ) -> Self {
        Self {
            file: file.into(),
            instances: [requested_by.into(), locked_by.into()],
            action: Some(action),
            detected_at: now,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
