//! Foreman Engine - Worker Coordination
//!
//! The orchestration core. Each operation is a single short-lived
//! read-modify-write transaction against the persisted stores; concurrency
//! comes from independent OS processes invoking operations against the
//! same workspace, serialized by the state guard.
//!
//! Liveness probes (pid, multiplexer session) shell out through the
//! [`ProcessRunner`] seam so they can be unit-tested with a
//! [`FakeRunner`].

mod liveness;
mod orchestrator;
mod process;

pub use liveness::LivenessChecker;
pub use orchestrator::{
    AssignOptions, Assigned, Availability, DashboardReport, Orchestrator, RegisterOptions,
    Registered, Released, Resolution, StatusReport, UpdateOptions, Updated,
};
pub use process::{detect_tmux_session, FakeRunner, ProcessRunner, RunOutput, SystemRunner};
