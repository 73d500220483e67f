// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Agent Integration Tests
//!
//! End-to-end tests through the assembled agent:
//!
//! - Producer enqueue through spool and scheduler to the transport
//! - Lifecycle transitions triggering flush and state persistence
//! - Orphan recovery across simulated process restarts
//! - Event bookkeeping (sessions, sequence numbers, one-shot markers)

use courier_agent::{AppPhase, CourierAgent};
use courier_core::types::TelemetryPayload;
use courier_deliver::MockTransport;
use courier_spool::Spool;
use courier_tests::common::{
    init_test_logging, wait_until, PayloadFixtures, SessionFixtures, TestHarness,
};

// =============================================================================
// Producer Path
// =============================================================================

#[tokio::test]
async fn test_enqueue_to_delivery_end_to_end() {
    init_test_logging();
    let harness = TestHarness::new();

    let agent = CourierAgent::start_with_transport(harness.config(), MockTransport::new())
        .await
        .unwrap();

    for payload in PayloadFixtures::batch(5) {
        agent.enqueue(payload).await;
    }
    wait_until(|| agent.delivery_metrics().delivered == 5).await;

    // Spool drained completely.
    assert_eq!(harness.spool_file_count(), 0);
    assert_eq!(agent.delivery_metrics().dropped, 0);
}

#[tokio::test]
async fn test_producer_is_never_failed_by_delivery_errors() {
    let harness = TestHarness::new();

    // Every delivery fails, forever.
    let agent = CourierAgent::start_with_transport(harness.config(), MockTransport::failing())
        .await
        .unwrap();

    // Enqueue never panics or reports failure to the producer; items are
    // retried then silently dropped.
    agent.enqueue(PayloadFixtures::small()).await;
    wait_until(|| agent.delivery_metrics().dropped == 1).await;
    assert_eq!(harness.spool_file_count(), 0);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_background_transition_flushes_and_persists() {
    let harness = TestHarness::new();
    let agent = CourierAgent::start_with_transport(harness.config(), MockTransport::new())
        .await
        .unwrap();

    agent.sessions().restored().await;
    agent.sessions().record_start(SessionFixtures::session()).await;
    agent.enqueue(PayloadFixtures::small()).await;

    agent.lifecycle().notify_phase(AppPhase::Background);

    // The lifecycle task flushes deliveries and syncs the caches to disk.
    let sessions_file = harness.path().join("cache").join("sessions.json");
    wait_until(|| sessions_file.exists()).await;
    wait_until(|| agent.delivery_metrics().delivered == 1).await;
}

#[tokio::test]
async fn test_shutdown_after_work_completes_cleanly() {
    let harness = TestHarness::new();
    let agent = CourierAgent::start_with_transport(harness.config(), MockTransport::new())
        .await
        .unwrap();

    agent.enqueue(PayloadFixtures::small()).await;
    wait_until(|| agent.delivery_metrics().delivered == 1).await;

    agent.shutdown().await;
    assert!(agent.lifecycle().is_shutdown_initiated());
    assert_eq!(harness.spool_file_count(), 0);
}

// =============================================================================
// Restart Recovery
// =============================================================================

#[tokio::test]
async fn test_agent_restart_recovers_spooled_items() {
    let harness = TestHarness::new();
    let config = harness.config();

    // A previous launch spooled two items and died before delivering.
    {
        let spool = Spool::open(config.spool.clone()).unwrap();
        spool.write(PayloadFixtures::sized(64).bytes()).await.unwrap();
        spool.write(PayloadFixtures::sized(64).bytes()).await.unwrap();
    }

    let agent = CourierAgent::start_with_transport(config, MockTransport::new())
        .await
        .unwrap();

    wait_until(|| agent.delivery_metrics().delivered == 2).await;
    assert_eq!(harness.spool_file_count(), 0);
}

// =============================================================================
// Event Bookkeeping
// =============================================================================

#[tokio::test]
async fn test_session_and_event_bookkeeping_flow() {
    let harness = TestHarness::new();
    let agent = CourierAgent::start_with_transport(harness.config(), MockTransport::new())
        .await
        .unwrap();

    let session = SessionFixtures::session();
    agent.sessions().restored().await;
    agent.sequence_index().restored().await;
    agent.sent_markers().restored().await;

    agent.sessions().record_start(session.clone()).await;

    // Events get stable, increasing sequence numbers.
    let first = agent
        .sequence_index()
        .index_for_event(&SessionFixtures::event_in(&session, 100))
        .await;
    let second = agent
        .sequence_index()
        .index_for_event(&SessionFixtures::event_in(&session, 200))
        .await;
    assert_eq!(first, 0);
    assert_eq!(second, 1);

    // One-shot events fire exactly once per session.
    let marker = SessionFixtures::event_in(&session, 100);
    assert!(agent.sent_markers().check_and_set(&marker).await);
    assert!(!agent.sent_markers().check_and_set(&marker).await);

    // The session registry saw the session.
    assert!(agent.sessions().get(&session).await.is_some());

    // Telemetry about these events delivers independently of bookkeeping.
    agent
        .enqueue(TelemetryPayload::new(b"events 0-1".to_vec()))
        .await;
    wait_until(|| agent.delivery_metrics().delivered == 1).await;
}
