// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Spool statistics snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Spool Statistics
// =============================================================================

/// A snapshot of the spool's occupancy versus its quota.
///
/// Derived data, recomputed by the statistics walk and cached between
/// refreshes. `valid_state` is false when the walk itself failed, which the
/// quota gate treats as corruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoolStatistics {
    /// Whether the last statistics computation succeeded.
    pub valid_state: bool,

    /// Free bytes on the device holding the spool directory.
    pub free_disk_bytes: u64,

    /// Bytes occupied by spool files.
    pub occupied_bytes: u64,

    /// Quota in effect at the last refresh.
    pub quota_bytes: u64,

    /// Occupancy as a fraction of quota, `0.0..`.
    pub percent_of_quota_used: f64,

    /// Whether occupancy exceeds the quota.
    pub quota_exceeded: bool,

    /// When the snapshot was computed.
    pub refreshed_at: DateTime<Utc>,
}

impl SpoolStatistics {
    /// Builds a valid snapshot from a completed walk.
    pub fn from_walk(occupied_bytes: u64, free_disk_bytes: u64, quota_bytes: u64) -> Self {
        let percent = if quota_bytes > 0 {
            occupied_bytes as f64 / quota_bytes as f64
        } else {
            0.0
        };

        Self {
            valid_state: true,
            free_disk_bytes,
            occupied_bytes,
            quota_bytes,
            percent_of_quota_used: percent,
            quota_exceeded: occupied_bytes > quota_bytes,
            refreshed_at: Utc::now(),
        }
    }

    /// Marks the statistics as unavailable after a failed walk.
    pub fn invalid() -> Self {
        Self {
            valid_state: false,
            free_disk_bytes: 0,
            occupied_bytes: 0,
            quota_bytes: 0,
            percent_of_quota_used: 0.0,
            quota_exceeded: false,
            refreshed_at: Utc::now(),
        }
    }

    /// Returns an empty-but-valid snapshot, used right after a reset.
    pub fn empty(free_disk_bytes: u64, quota_bytes: u64) -> Self {
        Self::from_walk(0, free_disk_bytes, quota_bytes)
    }

    /// Adjusts the cached snapshot after a successful write, keeping the
    /// gate honest between refreshes without another walk.
    pub fn apply_write(&mut self, bytes: u64) {
        self.occupied_bytes = self.occupied_bytes.saturating_add(bytes);
        self.recompute_derived();
    }

    /// Adjusts the cached snapshot after a delete.
    pub fn apply_delete(&mut self, bytes: u64) {
        self.occupied_bytes = self.occupied_bytes.saturating_sub(bytes);
        self.recompute_derived();
    }

    fn recompute_derived(&mut self) {
        self.percent_of_quota_used = if self.quota_bytes > 0 {
            self.occupied_bytes as f64 / self.quota_bytes as f64
        } else {
            0.0
        };
        self.quota_exceeded = self.occupied_bytes > self.quota_bytes;
    }
}

impl Default for SpoolStatistics {
    fn default() -> Self {
        Self::invalid()
    }
}

// =============================================================================
// Tests
// =============================================================================
