//! Execution context for one CLI invocation.
//!
//! Built once in `main` from flags and environment, then threaded
//! explicitly through the front end - nothing reads argv or env vars
//! ambiently to decide how to behave.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Human tables and colored sections on stdout
    #[default]
    Human,
    /// One machine-readable JSON payload per invocation
    Json,
}

impl OutputMode {
    /// Convert to the flag string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Human => "human",
            OutputMode::Json => "json",
        }
    }

    /// Parse from the flag string representation.
    pub fn parse(s: &str) -> Result<Self, OutputModeParseError> {
        match s.to_lowercase().as_str() {
            "human" | "table" => Ok(OutputMode::Human),
            "json" => Ok(OutputMode::Json),
            _ => Err(OutputModeParseError(s.to_string())),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = OutputModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when parsing an invalid output mode string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputModeParseError(pub String);

impl fmt::Display for OutputModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid output mode: {} (expected human|json)", self.0)
    }
}

impl std::error::Error for OutputModeParseError {}

/// Per-invocation execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Whether a human is at the terminal (enables prompts and color)
    pub interactive: bool,
    /// Id of the agent driving this invocation, when one identified itself
    pub agent_id: Option<String>,
    /// Rendering mode for results and errors
    pub output_mode: OutputMode,
}

impl ExecutionContext {
    /// Interactive human session rendering tables.
    pub fn interactive() -> Self {
        Self {
            interactive: true,
            agent_id: None,
            output_mode: OutputMode::Human,
        }
    }

    /// Non-interactive agent invocation emitting JSON.
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            interactive: false,
            agent_id: Some(agent_id.into()),
            output_mode: OutputMode::Json,
        }
    }

    /// Override the output mode.
    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    /// Whether results should be emitted as JSON.
    pub fn is_json(&self) -> bool {
        self.output_mode == OutputMode::Json
    }
}
