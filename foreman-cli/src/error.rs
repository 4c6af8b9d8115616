//! Error types for the CLI front end.

use crate::config::ConfigError;
use foreman_core::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Unknown command or component: {name}")]
    UnknownComponent { name: String },
    #[error("Component manifest {path} is invalid: {reason}")]
    BadManifest { path: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
