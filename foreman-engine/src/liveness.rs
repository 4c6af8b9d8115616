//! Liveness policy for worker instances.
//!
//! A worker is alive only if every check holds: active status, heartbeat
//! within the staleness window, and - when the worker is known to be local
//! and carries the references - a live OS process and multiplexer session.
//! One stale signal is enough to treat the worker as dead and reclaim its
//! claims.

use crate::process::ProcessRunner;
use chrono::{Duration, Utc};
use foreman_core::{WorkerInstance, DEFAULT_HEARTBEAT_WINDOW_SECS};
use tracing::debug;

/// Decides whether a worker instance should still be treated as alive.
pub struct LivenessChecker {
    runner: Box<dyn ProcessRunner>,
    window: Duration,
    local_host: Option<String>,
}

impl LivenessChecker {
    /// Checker with the default 5-minute heartbeat window.
    pub fn new(runner: Box<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            window: Duration::seconds(DEFAULT_HEARTBEAT_WINDOW_SECS),
            local_host: None,
        }
    }

    /// Override the heartbeat staleness window (tests only need seconds).
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Name of the machine this checker runs on, used to decide whether
    /// pid/session probes are meaningful for a given worker.
    pub fn with_local_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = Some(host.into());
        self
    }

    /// Conjunctive liveness policy over status, heartbeat recency, and
    /// best-effort local process/session probes.
    pub fn is_alive(&self, worker: &WorkerInstance) -> bool {
        if !worker.is_active() {
            return false;
        }

        let age = Utc::now() - worker.heartbeat_baseline();
        if age > self.window {
            debug!(instance = %worker.id, age_secs = age.num_seconds(), "heartbeat stale");
            return false;
        }

        // Pid and session probes only mean anything on the worker's own
        // machine; across hosts the heartbeat is the sole authority.
        if !self.probes_apply(worker) {
            return true;
        }

        if let Some(pid) = worker.process_ref {
            let pid = pid.to_string();
            let up = self
                .runner
                .run("ps", &["-p", &pid])
                .map(|out| out.success)
                .unwrap_or(false);
            if !up {
                debug!(instance = %worker.id, pid = %pid, "process gone");
                return false;
            }
        }

        if let Some(session) = worker.session_ref.as_deref() {
            let up = self
                .runner
                .run("tmux", &["has-session", "-t", session])
                .map(|out| out.success)
                .unwrap_or(false);
            if !up {
                debug!(instance = %worker.id, session, "multiplexer session gone");
                return false;
            }
        }

        true
    }

    fn probes_apply(&self, worker: &WorkerInstance) -> bool {
        match (&worker.host, &self.local_host) {
            // No host recorded: assume local, probe as the original did.
            (None, _) => true,
            (Some(worker_host), Some(local)) => worker_host == local,
            // Worker names a host but we do not know our own: cannot tell,
            // so do not risk a false "dead" verdict.
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::FakeRunner;
    use chrono::Utc;

    fn worker() -> WorkerInstance {
        WorkerInstance::new("agent_abc123_42", Utc::now())
    }

    #[test]
    fn test_completed_worker_is_dead() {
        let mut w = worker();
        w.complete(Utc::now());
        let checker = LivenessChecker::new(Box::new(FakeRunner::new()));
        assert!(!checker.is_alive(&w));
    }

    #[test]
    fn test_fresh_heartbeat_no_refs_is_alive() {
        let checker = LivenessChecker::new(Box::new(FakeRunner::new()));
        assert!(checker.is_alive(&worker()));
    }

    #[test]
    fn test_stale_heartbeat_is_dead() {
        let mut w = worker();
        w.last_heartbeat = Some(Utc::now() - Duration::minutes(6));
        let checker = LivenessChecker::new(Box::new(FakeRunner::new()));
        assert!(!checker.is_alive(&w));
    }

    #[test]
    fn test_started_at_is_heartbeat_baseline() {
        let mut w = worker();
        w.started_at = Utc::now() - Duration::minutes(10);
        w.last_heartbeat = None;
        let checker = LivenessChecker::new(Box::new(FakeRunner::new()));
        assert!(!checker.is_alive(&w));
    }

    #[test]
    fn test_dead_process_fails_liveness() {
        let w = worker().with_pid(4242);
        let checker = LivenessChecker::new(Box::new(FakeRunner::new()));
        assert!(!checker.is_alive(&w));

        let checker = LivenessChecker::new(Box::new(FakeRunner::new().succeed_on("ps -p 4242")));
        assert!(checker.is_alive(&w));
    }

    #[test]
    fn test_dead_session_fails_liveness() {
        let w = worker().with_pid(4242).with_session("main");
        let runner = FakeRunner::new().succeed_on("ps -p 4242");
        let checker = LivenessChecker::new(Box::new(runner));
        assert!(!checker.is_alive(&w));

        let runner = FakeRunner::new()
            .succeed_on("ps -p 4242")
            .succeed_on("tmux has-session -t main");
        let checker = LivenessChecker::new(Box::new(runner));
        assert!(checker.is_alive(&w));
    }

    #[test]
    fn test_remote_worker_skips_probes() {
        // Pid 4242 does not answer, but the worker lives on another host:
        // heartbeat recency alone decides.
        let w = worker().with_pid(4242).with_session("main").with_host("db-box");
        let checker = LivenessChecker::new(Box::new(FakeRunner::new()))
            .with_local_host("dev-box");
        assert!(checker.is_alive(&w));
    }

    #[test]
    fn test_same_host_worker_is_probed() {
        let w = worker().with_pid(4242).with_host("dev-box");
        let checker = LivenessChecker::new(Box::new(FakeRunner::new()))
            .with_local_host("dev-box");
        assert!(!checker.is_alive(&w));
    }

    #[test]
    fn test_custom_window() {
        let mut w = worker();
        w.last_heartbeat = Some(Utc::now() - Duration::seconds(30));
        let checker = LivenessChecker::new(Box::new(FakeRunner::new()))
            .with_window(Duration::seconds(10));
        assert!(!checker.is_alive(&w));
    }
}
