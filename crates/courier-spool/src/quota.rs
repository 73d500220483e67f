// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Spool configuration and quota derivation.
//!
//! The quota is the smaller of an absolute ceiling and a fraction of the
//! device's free space, recomputed from a live free-space query at every
//! statistics refresh. Both knobs exist because either alone misbehaves:
//! the absolute ceiling is meaningless on a nearly-full device, and the
//! relative ceiling alone grows unbounded on a large one.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Spool Configuration
// =============================================================================

/// Configuration for one [`Spool`](crate::Spool) instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolConfig {
    /// Directory holding the spooled payload files.
    pub directory: PathBuf,

    /// Absolute quota ceiling in bytes.
    #[serde(default = "default_absolute_ceiling")]
    pub absolute_ceiling_bytes: u64,

    /// Fraction of free device space the spool may occupy, `(0, 1]`.
    #[serde(default = "default_relative_fraction")]
    pub relative_fraction: f64,

    /// Trailing cooldown between statistics walks.
    #[serde(default = "default_refresh_debounce")]
    #[serde(with = "duration_secs")]
    pub refresh_debounce: Duration,
}

fn default_absolute_ceiling() -> u64 {
    200 * 1024 * 1024 // 200 MB
}

fn default_relative_fraction() -> f64 {
    0.20
}

fn default_refresh_debounce() -> Duration {
    Duration::from_secs(15)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl SpoolConfig {
    /// Creates a configuration with default quota settings.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            absolute_ceiling_bytes: default_absolute_ceiling(),
            relative_fraction: default_relative_fraction(),
            refresh_debounce: default_refresh_debounce(),
        }
    }

    /// Creates a configuration builder.
    pub fn builder(directory: impl Into<PathBuf>) -> SpoolConfigBuilder {
        SpoolConfigBuilder {
            config: Self::new(directory),
        }
    }

    /// Creates a configuration for tests: tiny quota, no debounce.
    pub fn for_testing(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            absolute_ceiling_bytes: 64 * 1024,
            relative_fraction: 1.0,
            refresh_debounce: Duration::ZERO,
        }
    }

    /// Derives the quota in effect for the given free-space reading.
    ///
    /// `min(absolute_ceiling, free_disk_bytes × relative_fraction)`.
    pub fn quota_bytes(&self, free_disk_bytes: u64) -> u64 {
        let relative = (free_disk_bytes as f64 * self.relative_fraction) as u64;
        self.absolute_ceiling_bytes.min(relative)
    }
}

/// Builder for [`SpoolConfig`].
#[derive(Debug)]
pub struct SpoolConfigBuilder {
    config: SpoolConfig,
}

impl SpoolConfigBuilder {
    /// Sets the absolute quota ceiling.
    pub fn absolute_ceiling_bytes(mut self, bytes: u64) -> Self {
        self.config.absolute_ceiling_bytes = bytes;
        self
    }

    /// Sets the relative free-space fraction.
    pub fn relative_fraction(mut self, fraction: f64) -> Self {
        self.config.relative_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Sets the statistics refresh cooldown.
    pub fn refresh_debounce(mut self, debounce: Duration) -> Self {
        self.config.refresh_debounce = debounce;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SpoolConfig {
        self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
