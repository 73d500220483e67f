// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Delivery descriptors and their sidecar persistence.
//!
//! A descriptor is the durable record of one item's delivery state. It is
//! written next to the payload file *before* submission, because the
//! completion callback may run in a process launch that never saw the
//! original submission; everything needed to reconcile must live on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use courier_core::backoff::{BackoffSchedule, RetryDecision};
use courier_core::error::{DeliveryError, DeliveryResult};

/// File extension for descriptor sidecars.
pub(crate) const SIDECAR_EXTENSION: &str = "descriptor";

// =============================================================================
// Delivery State
// =============================================================================

/// Per-item delivery state, used in logs and metrics.
///
/// `Delivered` and `Dropped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryState {
    /// Written to the spool, not yet handed to the transport.
    Spooled,
    /// Handed to the transport; a response is outstanding.
    Submitted,
    /// Acknowledged by the collector; the spool item is gone.
    Delivered,
    /// Failed; parked until its backoff delay elapses.
    Retrying,
    /// Retry limit exhausted; the spool item is gone.
    Dropped,
}

// =============================================================================
// Delivery Descriptor
// =============================================================================

/// Metadata tracking one delivery item's identity, target, and retry state.
///
/// `attempt_count` increments exactly once per delivery attempt;
/// `scheduled_not_before` is derived from the backoff table at each failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryDescriptor {
    /// The item id, shared with the spool file name.
    pub id: Uuid,

    /// Collector endpoint for this item.
    pub destination: String,

    /// Per-request timeout requested by the producer side.
    pub timeout_seconds: f64,

    /// Delivery attempts made so far.
    pub attempt_count: u32,

    /// Earliest time the next submission may start.
    pub scheduled_not_before: DateTime<Utc>,
}

impl DeliveryDescriptor {
    /// Creates a descriptor for a freshly spooled item, eligible immediately.
    pub fn new(id: Uuid, destination: impl Into<String>, timeout_seconds: f64) -> Self {
        Self {
            id,
            destination: destination.into(),
            timeout_seconds,
            attempt_count: 0,
            scheduled_not_before: Utc::now(),
        }
    }

    /// Records a failed attempt: increments the attempt count and either
    /// schedules the resubmission per the backoff table or decides to drop.
    pub fn record_failure(&mut self, schedule: &BackoffSchedule) -> RetryDecision {
        self.attempt_count += 1;
        let decision = schedule.decide(self.attempt_count);
        if let RetryDecision::Retry(delay) = decision {
            self.scheduled_not_before = Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        }
        decision
    }

    /// Returns how long to wait before this item may be submitted.
    pub fn delay_until_eligible(&self) -> Duration {
        let remaining = self.scheduled_not_before - Utc::now();
        remaining.to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns the effective request timeout, capped by the transport limit.
    pub fn effective_timeout(&self, max: Duration) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds.max(0.0)).min(max)
    }

    // -------------------------------------------------------------------------
    // Sidecar persistence
    // -------------------------------------------------------------------------

    /// Returns the sidecar path for a payload path.
    pub fn sidecar_path(payload_path: &Path) -> PathBuf {
        payload_path.with_extension(SIDECAR_EXTENSION)
    }

    /// Persists the descriptor next to its payload.
    ///
    /// Called before every submission, so the on-disk attempt count is never
    /// behind the in-memory one.
    pub async fn persist(&self, payload_path: &Path) -> DeliveryResult<()> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| DeliveryError::descriptor_failed(self.id.to_string(), e.to_string()))?;
        tokio::fs::write(Self::sidecar_path(payload_path), bytes)
            .await
            .map_err(|e| DeliveryError::descriptor_failed(self.id.to_string(), e.to_string()))
    }

    /// Loads a descriptor from its sidecar path.
    pub async fn load(sidecar_path: &Path) -> DeliveryResult<Self> {
        let bytes = tokio::fs::read(sidecar_path).await.map_err(|e| {
            DeliveryError::descriptor_failed(sidecar_path.display().to_string(), e.to_string())
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            DeliveryError::descriptor_failed(sidecar_path.display().to_string(), e.to_string())
        })
    }

    /// Removes the sidecar for a payload path; absence is not an error.
    pub async fn remove_sidecar(payload_path: &Path) {
        let _ = tokio::fs::remove_file(Self::sidecar_path(payload_path)).await;
    }
}

// =============================================================================
// Tests
// =============================================================================
