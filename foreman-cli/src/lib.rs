//! Foreman CLI - front end over the orchestration engine.
//!
//! The binary in `main.rs` stays thin: parse arguments, build one
//! [`foreman_core::ExecutionContext`], and hand off to the engine. The
//! modules here hold everything worth testing - configuration loading,
//! component command dispatch, and rendering.

pub mod components;
pub mod config;
pub mod error;
pub mod render;

pub use components::{ComponentDescriptor, ComponentManifest, DispatchTable};
pub use config::ForemanConfig;
pub use error::CliError;
