// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for Courier.
//!
//! # Schema Structure
//!
//! ```text
//! CourierConfig
//! ├── agent: AgentSection
//! ├── spool: SpoolConfig          (courier-spool)
//! ├── delivery: DeliveryConfig    (courier-deliver)
//! ├── transport: TransportConfig  (courier-deliver)
//! └── logging: LoggingSection
//! ```
//!
//! Component configs are embedded directly so the agent can hand each
//! section to the component it constructs, without a translation layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use courier_core::error::{ConfigError, ConfigResult};
use courier_deliver::{DeliveryConfig, TransportConfig};
use courier_spool::SpoolConfig;

// =============================================================================
// Constants
// =============================================================================

/// Default base directory for the agent's durable state.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/courier";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for a Courier agent instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Agent identity and lifecycle behavior.
    #[serde(default)]
    pub agent: AgentSection,

    /// Spool directory and quota settings.
    pub spool: SpoolConfig,

    /// Delivery destination, timeout, and backoff settings.
    pub delivery: DeliveryConfig,

    /// HTTP transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl CourierConfig {
    /// Creates a configuration with defaults derived from a collector
    /// endpoint and a base data directory.
    pub fn new(destination: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            agent: AgentSection::default(),
            spool: SpoolConfig::new(data_dir.join("spool")),
            delivery: DeliveryConfig::new(destination),
            transport: TransportConfig::default(),
            logging: LoggingSection::default(),
        }
    }

    /// Creates a configuration for tests rooted in the given directory.
    pub fn for_testing(destination: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            agent: AgentSection {
                cache_directory: data_dir.join("cache"),
                ..AgentSection::default()
            },
            spool: SpoolConfig::for_testing(data_dir.join("spool")),
            delivery: DeliveryConfig::for_testing(destination),
            transport: TransportConfig::default(),
            logging: LoggingSection::default(),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.delivery.destination.is_empty() {
            return Err(ConfigError::validation(
                "delivery.destination",
                "must not be empty",
            ));
        }
        if !self.delivery.destination.starts_with("http://")
            && !self.delivery.destination.starts_with("https://")
        {
            return Err(ConfigError::validation(
                "delivery.destination",
                "must be an http(s) URL",
            ));
        }
        if self.delivery.timeout_seconds <= 0.0 {
            return Err(ConfigError::validation(
                "delivery.timeout_seconds",
                "must be positive",
            ));
        }
        if self.spool.relative_fraction <= 0.0 || self.spool.relative_fraction > 1.0 {
            return Err(ConfigError::validation(
                "spool.relative_fraction",
                "must be in (0, 1]",
            ));
        }
        if self.spool.absolute_ceiling_bytes == 0 {
            return Err(ConfigError::validation(
                "spool.absolute_ceiling_bytes",
                "must be positive",
            ));
        }
        self.logging.validate()?;
        Ok(())
    }
}

// =============================================================================
// Agent Section
// =============================================================================

/// Agent identity and lifecycle behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    /// Instance name, used in logs.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Directory for the keyed cache backing files.
    #[serde(default = "default_cache_directory")]
    pub cache_directory: PathBuf,

    /// Whether a background transition triggers a delivery flush.
    #[serde(default = "default_true")]
    pub flush_on_background: bool,

    /// Whether startup scans the spool for orphaned deliveries.
    #[serde(default = "default_true")]
    pub recover_on_start: bool,
}

fn default_agent_name() -> String {
    "courier".to_string()
}

fn default_cache_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR).join("cache")
}

fn default_true() -> bool {
    true
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            cache_directory: default_cache_directory(),
            flush_on_background: true,
            recover_on_start: true,
        }
    }
}

// =============================================================================
// Logging Section
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for log aggregation.
    Json,
    /// Minimal single-line output.
    Compact,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingSection {
    fn validate(&self) -> ConfigResult<()> {
        match self.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "warning" | "error" => Ok(()),
            other => Err(ConfigError::validation(
                "logging.level",
                format!("unknown level '{other}'"),
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
