// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Agent wiring and runtime.
//!
//! `CourierAgent` is the one object the host application holds. It owns the
//! spool, the delivery scheduler, and the three keyed-cache instances, and
//! runs a single background task reacting to lifecycle transitions. All
//! components are constructed here and injected; nothing reaches for a
//! global.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use courier_cache::{FileStore, OnceFlags, SequenceIndex};
use courier_config::CourierConfig;
use courier_core::error::{AgentError, AgentResult};
use courier_core::types::TelemetryPayload;
use courier_deliver::{
    DeliveryMetrics, DeliveryScheduler, DeliveryTransport, HttpTransport,
};
use courier_spool::{Spool, SpoolStatistics};

use crate::lifecycle::{AppPhase, LifecycleNotifier};
use crate::sessions::SessionRegistry;

/// How long a background transition waits on in-flight deliveries before
/// letting the platform suspend the process.
const BACKGROUND_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Courier Agent
// =============================================================================

/// The assembled telemetry delivery agent.
///
/// Generic over the delivery transport so tests can substitute a scripted
/// one; production uses [`HttpTransport`].
pub struct CourierAgent<T = HttpTransport>
where
    T: DeliveryTransport + 'static,
{
    config: CourierConfig,
    spool: Spool,
    scheduler: DeliveryScheduler<T>,
    sessions: SessionRegistry,
    sequence: SequenceIndex,
    sent_markers: OnceFlags,
    lifecycle: LifecycleNotifier,
    phase_task: Mutex<Option<JoinHandle<()>>>,
}

impl CourierAgent<HttpTransport> {
    /// Starts an agent with the HTTP transport.
    pub async fn start(config: CourierConfig) -> AgentResult<Self> {
        let transport = HttpTransport::new(config.transport.clone())
            .map_err(|e| AgentError::initialization(e.to_string()))?;
        Self::start_with_transport(config, transport).await
    }
}

impl<T> CourierAgent<T>
where
    T: DeliveryTransport + 'static,
{
    /// Starts an agent over the given transport.
    pub async fn start_with_transport(config: CourierConfig, transport: T) -> AgentResult<Self> {
        config
            .validate()
            .map_err(|e| AgentError::initialization(e.to_string()))?;

        let spool = Spool::open(config.spool.clone())
            .map_err(|e| AgentError::initialization(e.to_string()))?;
        let scheduler =
            DeliveryScheduler::new(spool.clone(), transport, config.delivery.clone());

        let cache_dir = &config.agent.cache_directory;
        let sessions =
            SessionRegistry::open(Arc::new(FileStore::new(cache_dir.join("sessions.json"))));
        let sequence =
            SequenceIndex::open(Arc::new(FileStore::new(cache_dir.join("event-index.json"))));
        let sent_markers =
            OnceFlags::open(Arc::new(FileStore::new(cache_dir.join("sent-markers.json"))));

        let agent = Self {
            spool,
            scheduler,
            sessions,
            sequence,
            sent_markers,
            lifecycle: LifecycleNotifier::new(),
            phase_task: Mutex::new(None),
            config,
        };

        if agent.config.agent.recover_on_start {
            let resumed = agent.scheduler.recover_orphans().await;
            if resumed > 0 {
                debug!(resumed, "Resumed deliveries from previous launch");
            }
        }

        let task = agent.spawn_phase_listener();
        *agent.phase_task.lock().expect("phase task lock") = Some(task);

        info!(name = %agent.config.agent.name, "Courier agent started");
        Ok(agent)
    }

    fn spawn_phase_listener(&self) -> JoinHandle<()> {
        let mut phases = self.lifecycle.subscribe_phases();
        let mut shutdown = self.lifecycle.subscribe_shutdown();
        let flush_on_background = self.config.agent.flush_on_background;
        let scheduler = self.scheduler.clone();
        let spool = self.spool.clone();
        let sessions = self.sessions.clone();
        let sequence = self.sequence.clone();
        let sent_markers = self.sent_markers.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    phase = phases.recv() => match phase {
                        Ok(AppPhase::Background) => {
                            if flush_on_background {
                                debug!("Background transition, flushing deliveries");
                                let completed =
                                    scheduler.flush_timeout(BACKGROUND_FLUSH_TIMEOUT).await;
                                if !completed {
                                    debug!("Background flush timed out with work in flight");
                                }
                            }
                            // Persist durable state while we still can.
                            sessions.sync().await;
                            sequence.sync().await;
                            sent_markers.sync().await;
                        }
                        Ok(AppPhase::Foreground) => {
                            spool.request_refresh();
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
        })
    }

    // -------------------------------------------------------------------------
    // Producer surface
    // -------------------------------------------------------------------------

    /// Queues a serialized telemetry batch for delivery.
    ///
    /// Fire-and-forget: failures are absorbed and logged, never returned.
    /// The worst outcome of any failure past this point is data loss.
    pub async fn enqueue(&self, payload: TelemetryPayload) {
        if payload.is_empty() {
            debug!("Skipping empty telemetry payload");
            return;
        }

        match self.scheduler.enqueue(payload.bytes()).await {
            Ok(descriptor) => {
                debug!(id = %descriptor.id, bytes = payload.len(), "Telemetry batch queued");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    error_type = e.error_type(),
                    bytes = payload.len(),
                    "Telemetry batch lost"
                );
            }
        }
    }

    /// Waits for currently in-flight deliveries and persists durable state.
    pub async fn flush(&self) {
        self.scheduler.flush().await;
        self.sessions.sync().await;
        self.sequence.sync().await;
        self.sent_markers.sync().await;
    }

    /// Shuts the agent down: final flush, state sync, listener teardown.
    ///
    /// Idempotent; later calls only re-run the flush.
    pub async fn shutdown(&self) {
        self.lifecycle.initiate_shutdown();
        self.flush().await;

        let task = self.phase_task.lock().expect("phase task lock").take();
        if let Some(task) = task {
            // The listener exits on the shutdown broadcast above.
            let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
        }

        info!(name = %self.config.agent.name, "Courier agent stopped");
    }

    // -------------------------------------------------------------------------
    // Component access
    // -------------------------------------------------------------------------

    /// Returns the lifecycle notifier the host feeds transitions into.
    pub fn lifecycle(&self) -> &LifecycleNotifier {
        &self.lifecycle
    }

    /// Returns the session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Returns the per-session event sequence index.
    pub fn sequence_index(&self) -> &SequenceIndex {
        &self.sequence
    }

    /// Returns the sent-event markers.
    pub fn sent_markers(&self) -> &OnceFlags {
        &self.sent_markers
    }

    /// Returns the agent configuration.
    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// Returns a delivery metrics snapshot.
    pub fn delivery_metrics(&self) -> DeliveryMetrics {
        self.scheduler.metrics()
    }

    /// Returns the last cached spool statistics.
    pub fn spool_statistics(&self) -> SpoolStatistics {
        self.spool.statistics()
    }
}

impl<T> std::fmt::Debug for CourierAgent<T>
where
    T: DeliveryTransport + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierAgent")
            .field("name", &self.config.agent.name)
            .field("phase", &self.lifecycle.current_phase())
            .field("metrics", &self.scheduler.metrics())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::SessionId;
    use courier_deliver::MockTransport;
    use tempfile::TempDir;

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
    async fn test_enqueue_delivers_and_cleans_spool() {
        let dir = TempDir::new().unwrap();
        let config = CourierConfig::for_testing("https://collector.example.com/v1", dir.path());
        let agent = CourierAgent::start_with_transport(config, MockTransport::new())
            .await
            .unwrap();

        agent.enqueue(TelemetryPayload::new(vec![1u8, 2, 3])).await;
        let metrics = || agent.delivery_metrics();
        wait_until(|| metrics().delivered == 1).await;

        let spool_dir = dir.path().join("spool");
        assert_eq!(std::fs::read_dir(spool_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_payload_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = CourierConfig::for_testing("https://collector.example.com/v1", dir.path());
        let agent = CourierAgent::start_with_transport(config, MockTransport::new())
            .await
            .unwrap();

        agent.enqueue(TelemetryPayload::new(Vec::new())).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(agent.delivery_metrics().submitted, 0);
    }

    #[tokio::test]
    async fn test_background_transition_persists_state() {
        let dir = TempDir::new().unwrap();
        let config = CourierConfig::for_testing("https://collector.example.com/v1", dir.path());
        let agent = CourierAgent::start_with_transport(config, MockTransport::new())
            .await
            .unwrap();

        agent.sessions().restored().await;
        agent.sessions().record_start(SessionId::new("s1")).await;

        agent.lifecycle().notify_phase(AppPhase::Background);

        let sessions_file = dir.path().join("cache").join("sessions.json");
        wait_until(|| sessions_file.exists()).await;
    }

    #[tokio::test]
    async fn test_recover_on_start_resumes_spooled_items() {
        let dir = TempDir::new().unwrap();
        let config = CourierConfig::for_testing("https://collector.example.com/v1", dir.path());

        // A previous launch left a payload behind.
        let spool = Spool::open(config.spool.clone()).unwrap();
        spool.write(b"orphaned batch").await.unwrap();

        let agent = CourierAgent::start_with_transport(config, MockTransport::new())
            .await
            .unwrap();

        let metrics = || agent.delivery_metrics();
        wait_until(|| metrics().delivered == 1).await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = CourierConfig::for_testing("https://collector.example.com/v1", dir.path());
        let agent = CourierAgent::start_with_transport(config, MockTransport::new())
            .await
            .unwrap();

        agent.enqueue(TelemetryPayload::new(vec![9u8])).await;
        agent.shutdown().await;
        agent.shutdown().await;

        assert!(agent.lifecycle().is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_start() {
        let dir = TempDir::new().unwrap();
        let mut config =
            CourierConfig::for_testing("https://collector.example.com/v1", dir.path());
        config.delivery.destination = "not a url".to_string();

        let result = CourierAgent::start_with_transport(config, MockTransport::new()).await;
        assert!(result.is_err());
    }
}
