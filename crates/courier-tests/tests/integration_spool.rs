// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Spool Integration Tests
//!
//! Integration tests for the spool / disk quota manager:
//!
//! - The quota gate and full-reset semantics
//! - Statistics accuracy and refresh behavior
//! - Serialization of concurrent writers with resets

use std::sync::Arc;

use courier_tests::common::{init_test_logging, PayloadFixtures, TestHarness};

// =============================================================================
// Quota Gate and Reset
// =============================================================================

#[tokio::test]
async fn test_quota_exceeded_write_resets_then_succeeds() {
    init_test_logging();
    let harness = TestHarness::new();

    // Quota 100 bytes; the absolute ceiling is the binding limit.
    let spool = harness.spool_with_quota(100);

    // A 150-byte item lands in the empty spool.
    spool.write(PayloadFixtures::sized(150).bytes()).await.unwrap();

    // The gate sees 150 > 100: full reset, caller-visible failure.
    assert!(!spool.check_integrity_and_quota().await);

    // The directory is empty and statistics report zero occupancy.
    let stats = spool.refresh_statistics().await.unwrap();
    assert!(stats.valid_state);
    assert_eq!(stats.occupied_bytes, 0);
    assert_eq!(harness.spool_file_count(), 0);
}

#[tokio::test]
async fn test_write_after_breach_lands_in_empty_spool() {
    let harness = TestHarness::new();
    let spool = harness.spool_with_quota(100);

    spool.write(PayloadFixtures::sized(150).bytes()).await.unwrap();

    // The next write gates first (reset), then succeeds.
    let fresh = spool.write(PayloadFixtures::sized(20).bytes()).await.unwrap();

    let remaining = spool.scan().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id(), fresh.id());
}

#[tokio::test]
async fn test_healthy_spool_passes_gate_without_data_loss() {
    let harness = TestHarness::new();
    let spool = harness.spool_with_quota(10_000);

    for payload in PayloadFixtures::batch(5) {
        spool.write(payload.bytes()).await.unwrap();
    }

    assert!(spool.check_integrity_and_quota().await);
    assert_eq!(spool.scan().await.unwrap().len(), 5);
}

// =============================================================================
// Statistics
// =============================================================================

#[tokio::test]
async fn test_statistics_percent_and_quota_fields() {
    let harness = TestHarness::new();
    let spool = harness.spool_with_quota(1_000);

    spool.write(PayloadFixtures::sized(250).bytes()).await.unwrap();

    let stats = spool.refresh_statistics().await.unwrap();
    assert_eq!(stats.occupied_bytes, 250);
    assert_eq!(stats.quota_bytes, 1_000);
    assert!((stats.percent_of_quota_used - 0.25).abs() < f64::EPSILON);
    assert!(!stats.quota_exceeded);
    assert!(stats.free_disk_bytes > 0);
}

#[tokio::test]
async fn test_delete_returns_bytes_to_quota() {
    let harness = TestHarness::new();
    let spool = harness.spool_with_quota(1_000);

    let handle = spool.write(PayloadFixtures::sized(400).bytes()).await.unwrap();
    assert_eq!(spool.refresh_statistics().await.unwrap().occupied_bytes, 400);

    spool.delete(&handle).await.unwrap();
    assert_eq!(spool.refresh_statistics().await.unwrap().occupied_bytes, 0);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_writers_never_corrupt_the_directory() {
    let harness = TestHarness::new();
    let spool = Arc::new(harness.spool_with_quota(1_000_000));

    let mut handles = Vec::new();
    for worker in 0..8usize {
        let spool = spool.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..20usize {
                spool
                    .write(format!("worker-{worker}-item-{i}").as_bytes())
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let scanned = spool.scan().await.unwrap();
    assert_eq!(scanned.len(), 8 * 20);

    // Every item reads back intact.
    for handle in &scanned {
        let bytes = spool.read(handle).await.unwrap();
        assert!(String::from_utf8(bytes).unwrap().starts_with("worker-"));
    }
}

#[tokio::test]
async fn test_reset_during_writes_leaves_consistent_state() {
    let harness = TestHarness::new();
    let spool = Arc::new(harness.spool_with_quota(1_000_000));

    let writer = {
        let spool = spool.clone();
        tokio::spawn(async move {
            for i in 0..50usize {
                let _ = spool.write(format!("item-{i}").as_bytes()).await;
            }
        })
    };

    // Interleave resets with the writer; mutations serialize, so every
    // observable state is either pre- or post-reset, never torn.
    for _ in 0..5 {
        spool.reset_all().await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    writer.await.unwrap();

    let stats = spool.refresh_statistics().await.unwrap();
    assert!(stats.valid_state);
    let scanned = spool.scan().await.unwrap();
    for handle in &scanned {
        assert!(spool.read(handle).await.is_ok());
    }
}
