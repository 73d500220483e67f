// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing.
//!
//! # Loading Pipeline
//!
//! 1. Parse the YAML/TOML file (format chosen by extension)
//! 2. Apply `COURIER_*` environment variable overrides
//! 3. Validate the result
//!
//! # Environment Variable Overrides
//!
//! A small, fixed set of scalar fields can be overridden without editing
//! the file:
//!
//! ```text
//! COURIER_DESTINATION=https://collector.example.com/v1
//! COURIER_SPOOL_DIR=/data/courier/spool
//! COURIER_CACHE_DIR=/data/courier/cache
//! COURIER_LOG_LEVEL=debug
//! ```

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use courier_core::error::{ConfigError, ConfigResult};

use crate::schema::CourierConfig;

// =============================================================================
// Convenience Entry Point
// =============================================================================

/// Loads, overrides, and validates a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<CourierConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for Courier.
///
/// # Examples
///
/// ```no_run
/// use courier_config::ConfigLoader;
///
/// let config = ConfigLoader::new().load("courier.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to apply environment variable overrides.
    apply_env: bool,
}

impl ConfigLoader {
    /// Creates a loader with default settings.
    pub fn new() -> Self {
        Self {
            env_prefix: "COURIER".to_string(),
            apply_env: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Disables environment variable overrides.
    pub fn without_env_overrides(mut self) -> Self {
        self.apply_env = false;
        self
    }

    /// Loads and validates the configuration at `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<CourierConfig> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config = self.parse(path, &raw)?;

        if self.apply_env {
            self.apply_env_overrides(&mut config);
        }

        config.validate()?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    fn parse(&self, path: &Path, raw: &str) -> ConfigResult<CourierConfig> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(raw)
                .map_err(|e| ConfigError::parse(path, e.to_string())),
            "toml" => toml::from_str(raw).map_err(|e| ConfigError::parse(path, e.to_string())),
            other => Err(ConfigError::unsupported_format(other)),
        }
    }

    fn apply_env_overrides(&self, config: &mut CourierConfig) {
        if let Some(destination) = self.env_var("DESTINATION") {
            debug!("Overriding delivery destination from environment");
            config.delivery.destination = destination;
        }
        if let Some(dir) = self.env_var("SPOOL_DIR") {
            config.spool.directory = PathBuf::from(dir);
        }
        if let Some(dir) = self.env_var("CACHE_DIR") {
            config.agent.cache_directory = PathBuf::from(dir);
        }
        if let Some(level) = self.env_var("LOG_LEVEL") {
            config.logging.level = level;
        }
    }

    fn env_var(&self, suffix: &str) -> Option<String> {
        env::var(format!("{}_{}", self.env_prefix, suffix))
            .ok()
            .filter(|v| !v.is_empty())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_YAML: &str = r#"
spool:
  directory: /tmp/courier-test/spool
delivery:
  destination: https://collector.example.com/v1
"#;

    fn write_config(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "courier.yaml", MINIMAL_YAML);

        let config = ConfigLoader::new().without_env_overrides().load(path).unwrap();
        assert_eq!(config.delivery.destination, "https://collector.example.com/v1");
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "courier.toml",
            r#"
[spool]
directory = "/tmp/courier-test/spool"

[delivery]
destination = "https://collector.example.com/v1"
"#,
        );

        let config = ConfigLoader::new().without_env_overrides().load(path).unwrap();
        assert_eq!(config.spool.directory, PathBuf::from("/tmp/courier-test/spool"));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "courier.ini", "whatever");

        let err = ConfigLoader::new().load(path).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new().load("/nonexistent/courier.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "courier.yaml", "spool: [not, a, map]");

        let err = ConfigLoader::new().load(&path).unwrap_err();
        match err {
            ConfigError::Parse { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_env_override_with_custom_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "courier.yaml", MINIMAL_YAML);

        // A process-unique prefix keeps this test independent of the
        // environment and of other tests.
        env::set_var("CTEST71_DESTINATION", "https://other.example.com/v1");
        let config = ConfigLoader::new()
            .with_env_prefix("CTEST71")
            .load(path)
            .unwrap();
        env::remove_var("CTEST71_DESTINATION");

        assert_eq!(config.delivery.destination, "https://other.example.com/v1");
    }

    #[test]
    fn test_invalid_config_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "courier.yaml",
            r#"
spool:
  directory: /tmp/s
  relative_fraction: 0.0
delivery:
  destination: https://collector.example.com/v1
"#,
        );

        let err = ConfigLoader::new().without_env_overrides().load(path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }
}
