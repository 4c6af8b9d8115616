//! Configuration loading for the Foreman CLI.
//!
//! Resolution order for the config file: `--config` flag, then the
//! `FOREMAN_CONFIG` environment variable, then `.foreman/config.toml` in
//! the working directory. A missing file yields the defaults; a present
//! but invalid file is an error.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the config file relative to the workspace.
pub const DEFAULT_CONFIG_PATH: &str = ".foreman/config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ForemanConfig {
    /// Directory holding `state.json`, `locks/`, and `conflicts.jsonl`
    pub orchestration_root: PathBuf,
    /// Directory scanned for component manifests
    pub components_root: PathBuf,
    /// Dashboard watch-mode re-render interval
    pub refresh_interval_ms: u64,
    /// Heartbeat staleness window for liveness decisions
    pub heartbeat_window_secs: i64,
}

impl Default for ForemanConfig {
    fn default() -> Self {
        Self {
            orchestration_root: PathBuf::from(".foreman/orchestration"),
            components_root: PathBuf::from(".foreman/components"),
            refresh_interval_ms: 2_000,
            heartbeat_window_secs: foreman_core::DEFAULT_HEARTBEAT_WINDOW_SECS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ForemanConfig {
    /// Load from an explicitly named file (which must exist), or from the
    /// default location, falling back to defaults when no file is there.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_path(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_path(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse the file at `path`.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.heartbeat_window_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "heartbeat_window_secs",
                reason: "must be > 0".to_string(),
            });
        }
        if self.orchestration_root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "orchestration_root",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_no_file() {
        let config = ForemanConfig::load(None).unwrap();
        assert_eq!(config.refresh_interval_ms, 2_000);
        assert_eq!(config.heartbeat_window_secs, 300);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let result = ForemanConfig::load(Some(Path::new("/nonexistent/foreman.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
orchestration_root = "/srv/shared/orchestration"
refresh_interval_ms = 500
"#,
        )
        .unwrap();

        let config = ForemanConfig::load(Some(&path)).unwrap();
        assert_eq!(
            config.orchestration_root,
            PathBuf::from("/srv/shared/orchestration")
        );
        assert_eq!(config.refresh_interval_ms, 500);
        // Untouched fields keep their defaults.
        assert_eq!(config.heartbeat_window_secs, 300);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "refresh_interval_ms = 0\n").unwrap();

        let result = ForemanConfig::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not_a_field = true\n").unwrap();

        let result = ForemanConfig::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
