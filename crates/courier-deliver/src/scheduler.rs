// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The delivery scheduler.
//!
//! Drives every spooled item through
//! `Spooled → Submitted → {Delivered | Retrying → Submitted | Dropped}`:
//!
//! - each attempt first passes the spool's integrity/quota gate; a failed
//!   gate aborts the attempt without touching the network
//! - success deletes the payload and its descriptor sidecar
//! - failure increments the attempt count, rewrites the sidecar, and parks
//!   the item until its backoff delay elapses
//! - the sixth consecutive failure drops the item permanently
//!
//! Completion handling never assumes in-memory state from the submission
//! site: the descriptor travels with the attempt and is re-read from disk
//! by [`DeliveryScheduler::recover_orphans`] after a process restart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use courier_core::backoff::{BackoffSchedule, RetryDecision};
use courier_core::error::{DeliveryError, DeliveryResult};
use courier_spool::Spool;

use crate::descriptor::{DeliveryDescriptor, DeliveryState, SIDECAR_EXTENSION};
use crate::transport::DeliveryTransport;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the delivery scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Collector endpoint new items are addressed to.
    pub destination: String,

    /// Per-request timeout recorded on new descriptors.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    /// Backoff table for retries.
    #[serde(default)]
    pub backoff: BackoffSchedule,
}

fn default_timeout_seconds() -> f64 {
    30.0
}

impl DeliveryConfig {
    /// Creates a configuration with default timeout and backoff.
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            timeout_seconds: default_timeout_seconds(),
            backoff: BackoffSchedule::standard(),
        }
    }

    /// Creates a configuration for tests: zero backoff delays.
    pub fn for_testing(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            timeout_seconds: 5.0,
            backoff: BackoffSchedule::for_testing(),
        }
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Snapshot of scheduler activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryMetrics {
    /// Attempts handed to the transport.
    pub submitted: u64,
    /// Items acknowledged by the collector.
    pub delivered: u64,
    /// Failed attempts that were rescheduled.
    pub retried: u64,
    /// Items dropped after exhausting retries.
    pub dropped: u64,
    /// Attempts aborted before the network (gate failure, vanished payload).
    pub aborted: u64,
    /// Submissions currently awaiting a response.
    pub in_flight: usize,
}

#[derive(Debug, Default)]
struct MetricsInner {
    submitted: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
    aborted: AtomicU64,
}

impl MetricsInner {
    fn snapshot(&self, in_flight: usize) -> DeliveryMetrics {
        DeliveryMetrics {
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            in_flight,
        }
    }
}

// =============================================================================
// Delivery Scheduler
// =============================================================================

/// Schedules spooled payloads for delivery with bounded retries.
pub struct DeliveryScheduler<T>
where
    T: DeliveryTransport + 'static,
{
    spool: Spool,
    transport: Arc<T>,
    config: DeliveryConfig,

    /// Submissions currently awaiting a transport response, by item id.
    in_flight: Arc<DashMap<Uuid, u32>>,

    /// Notified whenever `in_flight` drains to empty.
    idle: Arc<Notify>,

    metrics: Arc<MetricsInner>,
}

impl<T> Clone for DeliveryScheduler<T>
where
    T: DeliveryTransport + 'static,
{
    fn clone(&self) -> Self {
        Self {
            spool: self.spool.clone(),
            transport: self.transport.clone(),
            config: self.config.clone(),
            in_flight: self.in_flight.clone(),
            idle: self.idle.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<T> std::fmt::Debug for DeliveryScheduler<T>
where
    T: DeliveryTransport + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryScheduler")
            .field("transport", &self.transport.name())
            .field("destination", &self.config.destination)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl<T> DeliveryScheduler<T>
where
    T: DeliveryTransport + 'static,
{
    /// Creates a scheduler owning its transport.
    pub fn new(spool: Spool, transport: T, config: DeliveryConfig) -> Self {
        Self::with_shared(spool, Arc::new(transport), config)
    }

    /// Creates a scheduler over a shared transport.
    pub fn with_shared(spool: Spool, transport: Arc<T>, config: DeliveryConfig) -> Self {
        Self {
            spool,
            transport,
            config,
            in_flight: Arc::new(DashMap::new()),
            idle: Arc::new(Notify::new()),
            metrics: Arc::new(MetricsInner::default()),
        }
    }

    /// Returns the scheduler configuration.
    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Spools a payload and schedules its first delivery attempt.
    ///
    /// The descriptor sidecar is persisted before the submission is spawned,
    /// so a crash between the two leaves a recoverable orphan rather than an
    /// untracked file.
    pub async fn enqueue(&self, payload: &[u8]) -> DeliveryResult<DeliveryDescriptor> {
        let handle = self
            .spool
            .write(payload)
            .await
            .map_err(|e| DeliveryError::spool_rejected(e.to_string()))?;

        let descriptor = DeliveryDescriptor::new(
            handle.id(),
            self.config.destination.clone(),
            self.config.timeout_seconds,
        );
        descriptor.persist(handle.path()).await?;

        debug!(id = %descriptor.id, bytes = payload.len(), state = ?DeliveryState::Spooled, "Enqueued payload");
        self.send(descriptor.clone());
        Ok(descriptor)
    }

    /// Schedules one delivery attempt for the descriptor.
    ///
    /// Returns immediately; the attempt runs in the background, honoring
    /// `scheduled_not_before`.
    pub fn send(&self, descriptor: DeliveryDescriptor) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_attempt(descriptor).await;
        });
    }

    async fn run_attempt(&self, mut descriptor: DeliveryDescriptor) {
        let delay = descriptor.delay_until_eligible();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let handle = self.spool.handle_for(descriptor.id);

        // Spooled → Submitted passes the integrity/quota gate first. A
        // failed gate has already reset the spool; this item is gone.
        if !self.spool.check_integrity_and_quota().await {
            self.metrics.aborted.fetch_add(1, Ordering::Relaxed);
            warn!(id = %descriptor.id, "Delivery aborted, spool gate failed");
            return;
        }

        let payload = match self.spool.read(&handle).await {
            Ok(payload) => payload,
            Err(e) => {
                // Vanished between scheduling and submission (reset, or a
                // concurrent completion); nothing left to deliver.
                debug!(id = %descriptor.id, error = %e, "Payload gone before submission");
                DeliveryDescriptor::remove_sidecar(handle.path()).await;
                self.metrics.aborted.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        self.in_flight.insert(descriptor.id, descriptor.attempt_count);
        self.metrics.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(
            id = %descriptor.id,
            attempt = descriptor.attempt_count,
            bytes = payload.len(),
            state = ?DeliveryState::Submitted,
            "Submitting payload"
        );

        let outcome = self.transport.send(&descriptor, &payload).await;

        self.in_flight.remove(&descriptor.id);
        if self.in_flight.is_empty() {
            self.idle.notify_waiters();
        }

        match outcome {
            Ok(()) => {
                if let Err(e) = self.spool.delete(&handle).await {
                    warn!(id = %descriptor.id, error = %e, "Delivered but spool delete failed");
                }
                DeliveryDescriptor::remove_sidecar(handle.path()).await;
                self.metrics.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(id = %descriptor.id, state = ?DeliveryState::Delivered, "Payload delivered");
            }
            Err(error) => match descriptor.record_failure(&self.config.backoff) {
                RetryDecision::Retry(delay) => {
                    self.metrics.retried.fetch_add(1, Ordering::Relaxed);
                    // Keep the on-disk attempt count current before parking.
                    if let Err(e) = descriptor.persist(handle.path()).await {
                        debug!(id = %descriptor.id, error = %e, "Failed to persist retry state");
                    }
                    debug!(
                        id = %descriptor.id,
                        attempt = descriptor.attempt_count,
                        delay_secs = delay.as_secs(),
                        error = %error,
                        error_type = error.error_type(),
                        state = ?DeliveryState::Retrying,
                        "Delivery failed, retry scheduled"
                    );
                    self.send(descriptor);
                }
                RetryDecision::Drop => {
                    let _ = self.spool.delete(&handle).await;
                    DeliveryDescriptor::remove_sidecar(handle.path()).await;
                    self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                    info!(
                        id = %descriptor.id,
                        attempts = descriptor.attempt_count,
                        error = %error,
                        state = ?DeliveryState::Dropped,
                        "Delivery dropped after exhausting retries"
                    );
                }
            },
        }
    }

    /// Waits until all currently in-flight submissions have completed.
    ///
    /// Items parked for a future retry are *not* waited on; flushing exists
    /// to maximize delivered data before the process may be suspended, not
    /// to drain the backlog.
    pub async fn flush(&self) {
        loop {
            if self.in_flight.is_empty() {
                return;
            }
            let notified = self.idle.notified();
            if self.in_flight.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Like [`DeliveryScheduler::flush`], bounded by a timeout.
    ///
    /// Returns `true` if everything in flight completed in time.
    pub async fn flush_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.flush()).await.is_ok()
    }

    /// Scans the spool for items left behind by a previous process launch
    /// and resumes their delivery. Returns how many items were resumed.
    ///
    /// A payload without a readable sidecar restarts from attempt zero; a
    /// sidecar without a payload is deleted.
    pub async fn recover_orphans(&self) -> usize {
        let handles = match self.spool.scan().await {
            Ok(handles) => handles,
            Err(e) => {
                warn!(error = %e, "Orphan scan failed");
                return 0;
            }
        };

        let mut resumed = 0usize;
        for handle in &handles {
            let sidecar = DeliveryDescriptor::sidecar_path(handle.path());
            let descriptor = match DeliveryDescriptor::load(&sidecar).await {
                Ok(descriptor) => descriptor,
                Err(_) => {
                    // The crash hit between spool write and sidecar persist;
                    // start this item's delivery state over.
                    let fresh = DeliveryDescriptor::new(
                        handle.id(),
                        self.config.destination.clone(),
                        self.config.timeout_seconds,
                    );
                    if fresh.persist(handle.path()).await.is_err() {
                        continue;
                    }
                    fresh
                }
            };

            self.send(descriptor);
            resumed += 1;
        }

        self.remove_stale_sidecars(&handles).await;

        if resumed > 0 {
            info!(resumed, "Resumed orphaned deliveries");
        }
        resumed
    }

    /// Deletes descriptor sidecars whose payload no longer exists.
    async fn remove_stale_sidecars(&self, handles: &[courier_spool::ItemHandle]) {
        let known: std::collections::HashSet<Uuid> = handles.iter().map(|h| h.id()).collect();

        let Ok(mut entries) = tokio::fs::read_dir(self.spool.directory()).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SIDECAR_EXTENSION) {
                continue;
            }
            let stale = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
                .is_none_or(|id| !known.contains(&id));
            if stale {
                debug!(path = %path.display(), "Removing stale descriptor sidecar");
                let _ = tokio::fs::remove_file(&path).await;
            }
        }
    }

    /// Returns the number of submissions currently awaiting a response.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns a metrics snapshot.
    pub fn metrics(&self) -> DeliveryMetrics {
        self.metrics.snapshot(self.in_flight.len())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockOutcome, MockTransport};
    use async_trait::async_trait;
    use courier_spool::SpoolConfig;
    use tempfile::TempDir;

    fn test_spool(dir: &TempDir) -> Spool {
        Spool::open(SpoolConfig::for_testing(dir.path())).unwrap()
    }

    fn scheduler_with(
        dir: &TempDir,
        transport: Arc<MockTransport>,
    ) -> DeliveryScheduler<MockTransport> {
        DeliveryScheduler::with_shared(
            test_spool(dir),
            transport,
            DeliveryConfig::for_testing("https://collector/v1/batches"),
        )
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 5s");
    }

    #[tokio::test]
    async fn test_successful_delivery_cleans_up() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        let scheduler = scheduler_with(&dir, transport.clone());

        scheduler.enqueue(b"batch").await.unwrap();
        wait_until(|| scheduler.metrics().delivered == 1).await;

        assert_eq!(transport.send_count(), 1);
        // Payload and sidecar are both gone.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.script([MockOutcome::Status(500), MockOutcome::Success]);
        let scheduler = scheduler_with(&dir, transport.clone());

        scheduler.enqueue(b"batch").await.unwrap();
        wait_until(|| scheduler.metrics().delivered == 1).await;

        assert_eq!(transport.send_count(), 2);
        let seen = transport.seen();
        assert_eq!(seen[0].1, 0);
        assert_eq!(seen[1].1, 1);
        assert_eq!(scheduler.metrics().retried, 1);
    }

    #[tokio::test]
    async fn test_six_failures_drop_the_item() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::failing());
        let scheduler = scheduler_with(&dir, transport.clone());

        scheduler.enqueue(b"batch").await.unwrap();
        wait_until(|| scheduler.metrics().dropped == 1).await;

        // Attempts 0..=5 were submitted; nothing further happens.
        assert_eq!(transport.send_count(), 6);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.send_count(), 6);

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(scheduler.metrics().retried, 5);
    }

    #[tokio::test]
    async fn test_transport_error_and_timeout_also_retry() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.script([
            MockOutcome::TransportError,
            MockOutcome::Timeout,
            MockOutcome::Success,
        ]);
        let scheduler = scheduler_with(&dir, transport.clone());

        scheduler.enqueue(b"batch").await.unwrap();
        wait_until(|| scheduler.metrics().delivered == 1).await;

        assert_eq!(transport.send_count(), 3);
    }

    #[tokio::test]
    async fn test_gate_failure_aborts_without_network() {
        let dir = TempDir::new().unwrap();
        // Quota of zero: any occupied byte trips the gate.
        let spool = Spool::open(
            SpoolConfig::builder(dir.path())
                .absolute_ceiling_bytes(0)
                .relative_fraction(1.0)
                .refresh_debounce(Duration::ZERO)
                .build(),
        )
        .unwrap();
        let transport = Arc::new(MockTransport::new());
        let scheduler = DeliveryScheduler::with_shared(
            spool,
            transport.clone(),
            DeliveryConfig::for_testing("https://collector"),
        );

        // The write itself gates against an empty spool and passes; the
        // delivery attempt then sees occupied > 0 and aborts.
        scheduler.enqueue(b"too big for a zero quota").await.unwrap();
        wait_until(|| scheduler.metrics().aborted == 1).await;

        assert_eq!(transport.send_count(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_send_with_vanished_payload_aborts() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        let scheduler = scheduler_with(&dir, transport.clone());

        let descriptor = DeliveryDescriptor::new(Uuid::new_v4(), "https://collector", 5.0);
        scheduler.send(descriptor);
        wait_until(|| scheduler.metrics().aborted == 1).await;

        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_flush_waits_for_in_flight_submission() {
        /// Transport that holds every request for a fixed latency.
        #[derive(Debug)]
        struct SlowTransport {
            latency: Duration,
        }

        #[async_trait]
        impl DeliveryTransport for SlowTransport {
            async fn send(
                &self,
                _descriptor: &DeliveryDescriptor,
                _payload: &[u8],
            ) -> DeliveryResult<()> {
                tokio::time::sleep(self.latency).await;
                Ok(())
            }

            fn name(&self) -> &str {
                "slow"
            }
        }

        let dir = TempDir::new().unwrap();
        let scheduler = DeliveryScheduler::new(
            test_spool(&dir),
            SlowTransport {
                latency: Duration::from_millis(200),
            },
            DeliveryConfig::for_testing("https://collector"),
        );

        scheduler.enqueue(b"batch").await.unwrap();
        wait_until(|| scheduler.in_flight_count() == 1).await;

        scheduler.flush().await;

        assert_eq!(scheduler.in_flight_count(), 0);
        assert_eq!(scheduler.metrics().delivered, 1);
    }

    #[tokio::test]
    async fn test_flush_returns_immediately_when_idle() {
        let dir = TempDir::new().unwrap();
        let scheduler = scheduler_with(&dir, Arc::new(MockTransport::new()));

        assert!(scheduler.flush_timeout(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_recover_orphans_resumes_with_recorded_attempts() {
        let dir = TempDir::new().unwrap();
        let spool = test_spool(&dir);

        // A previous launch spooled an item and failed twice.
        let handle = spool.write(b"orphan").await.unwrap();
        let mut orphaned =
            DeliveryDescriptor::new(handle.id(), "https://collector".to_string(), 5.0);
        orphaned.attempt_count = 2;
        orphaned.persist(handle.path()).await.unwrap();

        let transport = Arc::new(MockTransport::new());
        let scheduler = DeliveryScheduler::with_shared(
            spool,
            transport.clone(),
            DeliveryConfig::for_testing("https://collector"),
        );

        assert_eq!(scheduler.recover_orphans().await, 1);
        wait_until(|| scheduler.metrics().delivered == 1).await;

        let seen = transport.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, handle.id());
        assert_eq!(seen[0].1, 2);
    }

    #[tokio::test]
    async fn test_recover_orphans_without_sidecar_restarts_item() {
        let dir = TempDir::new().unwrap();
        let spool = test_spool(&dir);
        spool.write(b"no sidecar").await.unwrap();

        let transport = Arc::new(MockTransport::new());
        let scheduler = DeliveryScheduler::with_shared(
            spool,
            transport.clone(),
            DeliveryConfig::for_testing("https://collector"),
        );

        assert_eq!(scheduler.recover_orphans().await, 1);
        wait_until(|| scheduler.metrics().delivered == 1).await;
        assert_eq!(transport.seen()[0].1, 0);
    }

    #[tokio::test]
    async fn test_recover_orphans_removes_stale_sidecars() {
        let dir = TempDir::new().unwrap();
        let spool = test_spool(&dir);

        let stale = dir.path().join(format!("{}.descriptor", Uuid::new_v4()));
        std::fs::write(&stale, b"{}").unwrap();

        let scheduler = DeliveryScheduler::with_shared(
            spool,
            Arc::new(MockTransport::new()),
            DeliveryConfig::for_testing("https://collector"),
        );

        assert_eq!(scheduler.recover_orphans().await, 0);
        assert!(!stale.exists());
    }
}
