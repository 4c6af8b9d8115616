//! Component command dispatch.
//!
//! Foreman hosts independently-versioned components, each a self-contained
//! executable. Dispatch is data driven: a startup scan of the components
//! directory reads one manifest per component and builds a name -> handler
//! table; unrecognized top-level commands resolve against the table and
//! forward to the component binary. No code generation, no dynamic
//! registration.

use crate::error::CliError;
use foreman_engine::{ProcessRunner, RunOutput};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manifest file name inside each component directory.
pub const MANIFEST_FILE: &str = "component.json";

/// One component's `component.json`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ComponentManifest {
    /// Command name the component answers to
    pub name: String,
    /// Executable path, relative to the component directory or absolute
    pub binary: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Whether CLI arguments after the command name are passed through
    #[serde(default = "default_forward_args")]
    pub forward_args: bool,
}

fn default_forward_args() -> bool {
    true
}

/// A manifest resolved against its directory: the dispatch table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    pub name: String,
    pub binary: PathBuf,
    pub description: Option<String>,
    pub forward_args: bool,
}

/// Name -> descriptor table built by scanning the components directory.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    entries: BTreeMap<String, ComponentDescriptor>,
}

impl DispatchTable {
    /// Scan `root` for `<component>/component.json` manifests. A missing
    /// root means no components are installed; a malformed manifest is an
    /// error rather than a silently dropped command.
    pub fn scan(root: &Path) -> Result<Self, CliError> {
        let mut entries = BTreeMap::new();
        if !root.exists() {
            return Ok(Self { entries });
        }

        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let manifest_path = entry.path().join(MANIFEST_FILE);
            if !manifest_path.exists() {
                continue;
            }

            let contents = std::fs::read_to_string(&manifest_path)?;
            let manifest: ComponentManifest =
                serde_json::from_str(&contents).map_err(|e| CliError::BadManifest {
                    path: manifest_path.display().to_string(),
                    reason: e.to_string(),
                })?;

            let binary = if Path::new(&manifest.binary).is_absolute() {
                PathBuf::from(&manifest.binary)
            } else {
                entry.path().join(&manifest.binary)
            };

            debug!(component = %manifest.name, binary = %binary.display(), "component discovered");
            entries.insert(
                manifest.name.clone(),
                ComponentDescriptor {
                    name: manifest.name,
                    binary,
                    description: manifest.description,
                    forward_args: manifest.forward_args,
                },
            );
        }

        Ok(Self { entries })
    }

    /// Resolve a command name.
    pub fn get(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.entries.get(name)
    }

    /// All known components in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forward a command line to the named component's binary, capturing
    /// its outcome.
    pub fn forward(
        &self,
        runner: &dyn ProcessRunner,
        name: &str,
        args: &[String],
    ) -> Result<RunOutput, CliError> {
        let descriptor = self.get(name).ok_or_else(|| CliError::UnknownComponent {
            name: name.to_string(),
        })?;

        let binary = descriptor.binary.display().to_string();
        let forwarded: Vec<&str> = if descriptor.forward_args {
            args.iter().map(String::as_str).collect()
        } else {
            Vec::new()
        };
        Ok(runner.run(&binary, &forwarded)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_engine::FakeRunner;
    use tempfile::tempdir;

    fn write_manifest(root: &Path, dir: &str, contents: &str) {
        let component = root.join(dir);
        std::fs::create_dir_all(&component).unwrap();
        std::fs::write(component.join(MANIFEST_FILE), contents).unwrap();
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let table = DispatchTable::scan(&dir.path().join("absent")).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_scan_builds_name_ordered_table() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            "zeta",
            r#"{"name": "zeta", "binary": "bin/zeta"}"#,
        );
        write_manifest(
            dir.path(),
            "alpha",
            r#"{"name": "alpha", "binary": "/usr/bin/alpha", "description": "first"}"#,
        );

        let table = DispatchTable::scan(dir.path()).unwrap();
        let names: Vec<&str> = table.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        // Relative binaries resolve against the component directory,
        // absolute ones are taken as-is.
        assert_eq!(
            table.get("zeta").unwrap().binary,
            dir.path().join("zeta").join("bin/zeta")
        );
        assert_eq!(
            table.get("alpha").unwrap().binary,
            PathBuf::from("/usr/bin/alpha")
        );
        assert!(table.get("alpha").unwrap().forward_args);
    }

    #[test]
    fn test_directories_without_manifest_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("not-a-component")).unwrap();
        let table = DispatchTable::scan(dir.path()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_malformed_manifest_is_an_error() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), "broken", "{ nope");
        let result = DispatchTable::scan(dir.path());
        assert!(matches!(result, Err(CliError::BadManifest { .. })));
    }

    #[test]
    fn test_forward_passes_args_through() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            "lint",
            r#"{"name": "lint", "binary": "/opt/lint/bin/lint"}"#,
        );
        let table = DispatchTable::scan(dir.path()).unwrap();

        let runner = FakeRunner::new().respond(
            "/opt/lint/bin/lint --fix src",
            RunOutput::ok("fixed 2 files\n"),
        );
        let output = table
            .forward(&runner, "lint", &["--fix".to_string(), "src".to_string()])
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "fixed 2 files\n");
    }

    #[test]
    fn test_forward_unknown_component() {
        let table = DispatchTable::default();
        let result = table.forward(&FakeRunner::new(), "ghost", &[]);
        assert!(matches!(result, Err(CliError::UnknownComponent { .. })));
    }

    #[test]
    fn test_forward_args_can_be_disabled() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            "doctor",
            r#"{"name": "doctor", "binary": "/opt/doctor", "forward_args": false}"#,
        );
        let table = DispatchTable::scan(dir.path()).unwrap();

        let runner = FakeRunner::new().respond("/opt/doctor", RunOutput::ok("healthy\n"));
        let output = table
            .forward(&runner, "doctor", &["ignored".to_string()])
            .unwrap();
        assert!(output.success);
    }
}
