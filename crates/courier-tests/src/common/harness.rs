// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Temp-directory-backed setup for integration tests, plus polling helpers
//! for asserting on work that completes in background tasks.

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use courier_config::CourierConfig;
use courier_spool::{Spool, SpoolConfig};

// =============================================================================
// Test Harness
// =============================================================================

/// Per-test environment rooted in its own temp directory.
///
/// Dropping the harness removes everything it created.
pub struct TestHarness {
    temp: TempDir,
}

impl TestHarness {
    /// Creates a fresh harness.
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Returns the harness root directory.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Returns a test agent configuration rooted in this harness.
    pub fn config(&self) -> CourierConfig {
        CourierConfig::for_testing("https://collector.example.com/v1/batches", self.path())
    }

    /// Opens a spool with test settings in this harness.
    pub fn spool(&self) -> Spool {
        Spool::open(SpoolConfig::for_testing(self.path().join("spool")))
            .expect("failed to open spool")
    }

    /// Opens a spool with an explicit quota ceiling in this harness.
    pub fn spool_with_quota(&self, absolute_ceiling_bytes: u64) -> Spool {
        Spool::open(
            SpoolConfig::builder(self.path().join("spool"))
                .absolute_ceiling_bytes(absolute_ceiling_bytes)
                .relative_fraction(1.0)
                .refresh_debounce(Duration::ZERO)
                .build(),
        )
        .expect("failed to open spool")
    }

    /// Returns the number of files in the spool directory.
    pub fn spool_file_count(&self) -> usize {
        std::fs::read_dir(self.path().join("spool"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Polling Helpers
// =============================================================================

/// Polls `condition` until it holds, panicking after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

/// Asserts that `condition` stays false for the given window.
pub async fn assert_never(mut condition: impl FnMut() -> bool, window: Duration) {
    let deadline = tokio::time::Instant::now() + window;
    while tokio::time::Instant::now() < deadline {
        assert!(!condition(), "condition unexpectedly became true");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
