//! The coordination core: register, assign, check, update, release,
//! detect and resolve conflicts.
//!
//! Every mutating operation is one transaction: acquire the state guard,
//! read the document, decide, write the document, then touch lock records.
//! The document is always written before per-file locks so that the
//! instance record stays the source of truth if the process dies mid-loop;
//! a lock without a matching claim is non-binding and gets reclaimed
//! lazily.

use crate::liveness::LivenessChecker;
use chrono::Utc;
use foreman_core::{
    generate_worker_id, ActionType, ConflictRecord, EngineError, EngineResult, FileLock,
    StateDocument, TaskRecord, Timestamp, WorkerInstance, WorkerStatus, DEFAULT_WORKER_PREFIX,
};
use foreman_storage::{layout, ConflictLog, LockStore, StateGuard, StateStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// OPERATION INPUTS
// ============================================================================

/// Inputs to [`Orchestrator::register`].
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Explicit worker id; generated when absent
    pub instance: Option<String>,
    /// Multiplexer session backing the worker
    pub session: Option<String>,
    /// OS process backing the worker; defaults to the invoking process
    pub pid: Option<u32>,
    /// Machine the worker runs on
    pub host: Option<String>,
    /// Initial task description
    pub task: Option<String>,
}

/// Inputs to [`Orchestrator::assign`].
#[derive(Debug, Clone, Default)]
pub struct AssignOptions {
    /// Explicit worker id; generated when absent
    pub instance: Option<String>,
    /// What the worker is doing
    pub task: String,
    /// Files the worker wants to claim
    pub files: Vec<String>,
    /// Proceed even when live conflicts were found
    pub force: bool,
    /// Multiplexer session backing the worker
    pub session: Option<String>,
    /// OS process backing the worker
    pub pid: Option<u32>,
    /// Machine the worker runs on
    pub host: Option<String>,
}

/// Inputs to [`Orchestrator::update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Refresh `last_heartbeat`
    pub heartbeat: bool,
    /// Replace the task description
    pub task: Option<String>,
    /// Files to union into the claim set (no locks are taken)
    pub files: Vec<String>,
}

// ============================================================================
// OPERATION OUTCOMES
// ============================================================================

/// Outcome of [`Orchestrator::register`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registered {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Outcome of [`Orchestrator::assign`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assigned {
    pub id: String,
    pub task: String,
    pub files: Vec<String>,
}

/// Outcome of [`Orchestrator::release`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Released {
    pub id: String,
    /// Locks actually removed (compare-and-delete hits)
    pub locks_released: usize,
    /// The instance had already completed; nothing changed
    pub already_completed: bool,
}

/// Outcome of [`Orchestrator::update`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Updated {
    pub id: String,
}

/// Availability decision for one file probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "availability", rename_all = "lowercase")]
pub enum Availability {
    Available {
        /// The probing worker already held the lock
        own_lock: bool,
        /// A lock was taken (or retained) by this probe
        locked: bool,
    },
    Unavailable {
        locked_by: String,
        locked_at: Timestamp,
    },
}

impl Availability {
    /// Whether the probed action may proceed.
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available { .. })
    }
}

/// One file settled by [`Orchestrator::resolve_conflicts`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub file: String,
    /// Older claimant that yielded the file
    pub released: String,
    /// Newer claimant left holding the lock
    pub retained: String,
}

/// Snapshot for `status`: every known worker plus the lock table.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub started_at: Timestamp,
    pub instances: Vec<WorkerInstance>,
    pub locks: Vec<FileLock>,
}

/// Snapshot for `dashboard`.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub active_count: usize,
    pub completed_count: usize,
    pub task_count: usize,
    pub locked_files: usize,
    pub active: Vec<WorkerInstance>,
    pub recent_conflicts: Vec<ConflictRecord>,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// The coordination engine over the persisted stores.
pub struct Orchestrator {
    state: StateStore,
    locks: LockStore,
    conflict_log: ConflictLog,
    liveness: LivenessChecker,
}

impl Orchestrator {
    /// Engine over an orchestration root directory using the conventional
    /// layout (`state.json`, `locks/`, `conflicts.jsonl`).
    pub fn open(root: &Path, liveness: LivenessChecker) -> Self {
        Self {
            state: StateStore::new(root.join(layout::STATE_FILE)),
            locks: LockStore::new(root.join(layout::LOCK_DIR)),
            conflict_log: ConflictLog::new(root.join(layout::CONFLICT_LOG)),
            liveness,
        }
    }

    /// Register a new worker instance.
    ///
    /// Fails with `AlreadyRegistered` while an active worker holds the id;
    /// a completed worker's id may be re-registered as a fresh logical
    /// registration.
    pub fn register(&self, opts: RegisterOptions) -> EngineResult<Registered> {
        let now = Utc::now();
        let pid = opts.pid.unwrap_or_else(std::process::id);
        let id = opts
            .instance
            .unwrap_or_else(|| generate_worker_id(DEFAULT_WORKER_PREFIX, opts.session.as_deref(), pid));

        self.state.with_exclusive(|doc| {
            if let Some(existing) = doc.instances.get(&id) {
                if existing.is_active() {
                    return Err(EngineError::AlreadyRegistered { instance: id.clone() });
                }
            }

            let mut worker = WorkerInstance::new(&id, now).with_pid(pid);
            worker.task = opts.task.clone();
            worker.session_ref = opts.session.clone();
            worker.host = opts.host.clone();
            doc.instances.insert(id.clone(), worker);

            info!(instance = %id, "registered worker");
            Ok(Registered {
                id: id.clone(),
                session: opts.session.clone(),
                pid: Some(pid),
            })
        })
    }

    /// Assign work: claim files for a worker, recording the task.
    ///
    /// Scans every requested file for a binding lock held by a live other
    /// worker; stale locks found along the way are reclaimed immediately.
    /// Conflicts without `force` abort with the conflict map and commit
    /// nothing. On proceed, the instance record is persisted before any
    /// lock is written.
    pub fn assign(&self, opts: AssignOptions) -> EngineResult<Assigned> {
        let now = Utc::now();
        let pid = opts.pid.unwrap_or_else(std::process::id);
        let id = opts
            .instance
            .unwrap_or_else(|| generate_worker_id(DEFAULT_WORKER_PREFIX, opts.session.as_deref(), pid));

        let _guard = StateGuard::acquire(self.state.path())?;
        let mut doc = self.state.load()?;

        let conflicts = self.scan_for_conflicts(&doc, &id, &opts.files)?;
        if !conflicts.is_empty() && !opts.force {
            return Err(EngineError::Conflicts { conflicts });
        }

        let files = dedup(opts.files);
        let worker = doc
            .instances
            .entry(id.clone())
            .or_insert_with(|| WorkerInstance::new(&id, now));
        if !worker.is_active() {
            // Fresh logical registration over a completed record.
            *worker = WorkerInstance::new(&id, now);
        }
        worker.task = Some(opts.task.clone());
        worker.files = files.clone();
        worker.status = WorkerStatus::Active;
        worker.heartbeat(now);
        if opts.session.is_some() {
            worker.session_ref = opts.session.clone();
        }
        if opts.pid.is_some() {
            worker.process_ref = opts.pid;
        }
        if opts.host.is_some() {
            worker.host = opts.host.clone();
        }

        doc.record_task(TaskRecord::new(&id, &opts.task, now));
        self.state.save(&doc)?;

        for file in &files {
            self.locks.acquire(file, &id, now)?;
        }

        info!(instance = %id, files = files.len(), "work assigned");
        Ok(Assigned {
            id,
            task: opts.task,
            files,
        })
    }

    /// Release a worker: free its locks and mark it completed.
    ///
    /// Unknown ids fail with `NotFound`; releasing an already-completed
    /// worker is an idempotent no-op. Lock removal is compare-and-delete,
    /// so claims reclaimed by others in the meantime are left alone.
    pub fn release(&self, instance: &str) -> EngineResult<Released> {
        let now = Utc::now();
        let _guard = StateGuard::acquire(self.state.path())?;
        let mut doc = self.state.load()?;

        let worker = doc
            .instances
            .get_mut(instance)
            .ok_or_else(|| EngineError::NotFound {
                instance: instance.to_string(),
            })?;

        if !worker.is_active() {
            return Ok(Released {
                id: instance.to_string(),
                locks_released: 0,
                already_completed: true,
            });
        }

        worker.complete(now);
        let files = worker.files.clone();
        // Completed status is persisted first: if we die before the lock
        // loop finishes, the remaining locks are already non-binding.
        self.state.save(&doc)?;

        let mut released = 0;
        for file in &files {
            if self.locks.release(file, instance)? {
                released += 1;
            }
        }

        info!(instance, locks = released, "worker released");
        Ok(Released {
            id: instance.to_string(),
            locks_released: released,
            already_completed: false,
        })
    }

    /// Scan all active claim sets for files claimed by more than one
    /// worker. Every detection is appended to the conflict log - repeated
    /// runs re-log, keeping the full timeline.
    pub fn detect_conflicts(&self) -> EngineResult<Vec<ConflictRecord>> {
        let now = Utc::now();
        let doc = self.state.load()?;

        let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
        let mut conflicts = Vec::new();
        for worker in doc.active_instances() {
            for file in &worker.files {
                if let Some(prev) = owners.get(file.as_str()) {
                    conflicts.push(ConflictRecord::claim(file, *prev, &worker.id, now));
                }
                owners.insert(file.as_str(), worker.id.as_str());
            }
        }

        for conflict in &conflicts {
            self.conflict_log.append(conflict)?;
        }
        if !conflicts.is_empty() {
            warn!(count = conflicts.len(), "claim conflicts detected");
        }
        Ok(conflicts)
    }

    /// Settle detected conflicts in favor of the newer claimant.
    ///
    /// Per contested file, the claimant with the smaller `started_at`
    /// yields that file only - its other claims and its status are
    /// untouched. Equal timestamps fall back to instance-id order so
    /// resolution is deterministic. The surviving claimant ends up holding
    /// the lock record.
    pub fn resolve_conflicts(&self, conflicts: &[ConflictRecord]) -> EngineResult<Vec<Resolution>> {
        let now = Utc::now();
        let _guard = StateGuard::acquire(self.state.path())?;
        let mut doc = self.state.load()?;

        let mut resolutions = Vec::new();
        for conflict in conflicts {
            let [first, second] = &conflict.instances;
            let (Some(a), Some(b)) = (doc.instances.get(first), doc.instances.get(second)) else {
                warn!(file = %conflict.file, "skipping conflict with unknown claimant");
                continue;
            };

            let loser = if (a.started_at, &a.id) <= (b.started_at, &b.id) {
                first.clone()
            } else {
                second.clone()
            };
            let winner = if loser == *first { second.clone() } else { first.clone() };

            if let Some(worker) = doc.instances.get_mut(&loser) {
                worker.yield_file(&conflict.file);
            }
            resolutions.push(Resolution {
                file: conflict.file.clone(),
                released: loser,
                retained: winner,
            });
        }

        self.state.save(&doc)?;

        for resolution in &resolutions {
            // Transfer the record regardless of which claimant wrote it.
            self.locks.release(&resolution.file, &resolution.released)?;
            self.locks
                .acquire(&resolution.file, &resolution.retained, now)?;
            info!(
                file = %resolution.file,
                released = %resolution.released,
                retained = %resolution.retained,
                "conflict resolved"
            );
        }
        Ok(resolutions)
    }

    /// Single-file fast path for an editor probing before an edit.
    ///
    /// Reads never lock. A binding lock held by a live other worker denies
    /// the probe and logs the conflict; a dead holder's lock is reclaimed
    /// on the spot. An available edit/create claims the lock, unions the
    /// file into the prober's claim set, and refreshes its heartbeat.
    pub fn check_availability(
        &self,
        file: &str,
        instance: &str,
        action: ActionType,
    ) -> EngineResult<Availability> {
        if action == ActionType::Read {
            return Ok(Availability::Available {
                own_lock: false,
                locked: false,
            });
        }

        let now = Utc::now();
        let _guard = StateGuard::acquire(self.state.path())?;
        let mut doc = self.state.load()?;

        if let Some(lock) = self.locks.peek(file)? {
            if lock.owned_by(instance) {
                return Ok(Availability::Available {
                    own_lock: true,
                    locked: true,
                });
            }

            let holder_alive = doc
                .instances
                .get(&lock.instance)
                .map(|w| self.liveness.is_alive(w))
                .unwrap_or(false);

            if holder_alive {
                self.conflict_log.append(&ConflictRecord::probe(
                    file,
                    instance,
                    &lock.instance,
                    action,
                    now,
                ))?;
                return Ok(Availability::Unavailable {
                    locked_by: lock.instance,
                    locked_at: lock.locked_at,
                });
            }

            info!(file, dead_owner = %lock.instance, "reclaiming stale lock");
            self.locks.release(file, &lock.instance)?;
        }

        if let Some(worker) = doc.instances.get_mut(instance) {
            worker.claim_file(file);
            worker.heartbeat(now);
        }
        self.state.save(&doc)?;
        self.locks.acquire(file, instance, now)?;

        Ok(Availability::Available {
            own_lock: false,
            locked: true,
        })
    }

    /// Refresh a worker: heartbeat, task, or additional claimed files.
    /// Claims recorded here take no locks - that is `assign`'s or the
    /// availability probe's job.
    pub fn update(&self, instance: &str, opts: UpdateOptions) -> EngineResult<Updated> {
        let now = Utc::now();
        self.state.with_exclusive(|doc| {
            let worker = doc
                .instances
                .get_mut(instance)
                .ok_or_else(|| EngineError::NotFound {
                    instance: instance.to_string(),
                })?;

            if opts.heartbeat {
                worker.heartbeat(now);
            }
            if let Some(task) = &opts.task {
                worker.task = Some(task.clone());
            }
            for file in &opts.files {
                worker.claim_file(file);
            }

            Ok(Updated {
                id: instance.to_string(),
            })
        })
    }

    /// Read-only snapshot of all workers plus the lock table.
    pub fn status(&self) -> EngineResult<StatusReport> {
        let doc = self.state.load()?;
        Ok(StatusReport {
            started_at: doc.started_at,
            instances: doc.instances.values().cloned().collect(),
            locks: self.locks.list()?,
        })
    }

    /// Read-only dashboard summary.
    pub fn dashboard(&self) -> EngineResult<DashboardReport> {
        let doc = self.state.load()?;
        let locks = self.locks.list()?;
        Ok(DashboardReport {
            active_count: doc.active_count(),
            completed_count: doc.completed_count(),
            task_count: doc.tasks.len(),
            locked_files: locks.len(),
            active: doc.active_instances().cloned().collect(),
            recent_conflicts: self.conflict_log.tail(5)?,
        })
    }

    /// Conflict scan for an assignment: a requested file is contested when
    /// a different worker holds a binding lock on it and is still alive.
    /// Stale locks discovered here are reclaimed immediately.
    fn scan_for_conflicts(
        &self,
        doc: &StateDocument,
        claimant: &str,
        files: &[String],
    ) -> EngineResult<BTreeMap<String, String>> {
        let mut conflicts = BTreeMap::new();
        for file in files {
            let Some(lock) = self.locks.peek(file)? else {
                continue;
            };
            if lock.owned_by(claimant) {
                continue;
            }
            let holder_alive = doc
                .instances
                .get(&lock.instance)
                .map(|w| self.liveness.is_alive(w))
                .unwrap_or(false);
            if holder_alive {
                conflicts.insert(file.clone(), lock.instance);
            } else {
                info!(file = %file, dead_owner = %lock.instance, "reclaiming stale lock");
                self.locks.release(file, &lock.instance)?;
            }
        }
        Ok(conflicts)
    }
}

fn dedup(files: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(files.len());
    for file in files {
        if !seen.contains(&file) {
            seen.push(file);
        }
    }
    seen
}
