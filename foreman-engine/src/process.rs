//! External process invocation seam.
//!
//! Liveness probes and component forwarding shell out to `ps`, `tmux`, and
//! component binaries. Routing them through a trait keeps the engine
//! testable without live processes.

use std::collections::HashMap;
use std::process::Command;

/// Captured result of one external process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOutput {
    /// Whether the process exited with status zero
    pub success: bool,
    /// Raw exit code, when the process exited normally
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run.
    pub fn failed() -> Self {
        Self {
            success: false,
            code: Some(1),
            ..Self::default()
        }
    }

    /// Exit code to propagate to a caller, defaulting by success flag.
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(if self.success { 0 } else { 1 })
    }
}

/// Runs an external program and captures its outcome.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<RunOutput>;
}

/// Production runner backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<RunOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(RunOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Scripted runner for tests: answers from a command-line table, fails
/// anything unlisted.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    responses: HashMap<String, RunOutput>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a response for the exact command line `program arg1 arg2 ...`.
    pub fn respond(mut self, command_line: impl Into<String>, output: RunOutput) -> Self {
        self.responses.insert(command_line.into(), output);
        self
    }

    /// Script a plain success for the command line.
    pub fn succeed_on(self, command_line: impl Into<String>) -> Self {
        self.respond(command_line, RunOutput::ok(""))
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<RunOutput> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        Ok(self.responses.get(&line).cloned().unwrap_or_default())
    }
}

/// Name of the ambient multiplexer session, if the invoking terminal is
/// inside one. `in_tmux` is whether the `TMUX` environment variable was set
/// for this invocation - resolved once by the front end, never read here.
pub fn detect_tmux_session(runner: &dyn ProcessRunner, in_tmux: bool) -> Option<String> {
    if !in_tmux {
        return None;
    }
    match runner.run("tmux", &["display-message", "-p", "#S"]) {
        Ok(output) if output.success => {
            let name = output.stdout.trim().to_string();
            (!name.is_empty()).then_some(name)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_runner_answers_scripted_lines() {
        let runner = FakeRunner::new().succeed_on("ps -p 42");
        assert!(runner.run("ps", &["-p", "42"]).unwrap().success);
        assert!(!runner.run("ps", &["-p", "43"]).unwrap().success);
    }

    #[test]
    fn test_detect_tmux_session_outside_tmux() {
        let runner = FakeRunner::new().respond(
            "tmux display-message -p #S",
            RunOutput::ok("main\n"),
        );
        assert_eq!(detect_tmux_session(&runner, false), None);
    }

    #[test]
    fn test_detect_tmux_session_trims_output() {
        let runner = FakeRunner::new().respond(
            "tmux display-message -p #S",
            RunOutput::ok("pair-review\n"),
        );
        assert_eq!(
            detect_tmux_session(&runner, true),
            Some("pair-review".to_string())
        );
    }

    #[test]
    fn test_detect_tmux_session_failure_is_none() {
        let runner = FakeRunner::new();
        assert_eq!(detect_tmux_session(&runner, true), None);
    }
}
