// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Mocks
//!
//! Transport implementations with controlled failure behavior, complementing
//! the scriptable [`MockTransport`](courier_deliver::MockTransport) shipped
//! with `courier-deliver`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use courier_core::error::{DeliveryError, DeliveryResult};
use courier_deliver::{DeliveryDescriptor, DeliveryTransport};

// =============================================================================
// Flaky Transport
// =============================================================================

/// A transport that fails a fixed number of times before succeeding.
///
/// Models a collector recovering from an outage mid-retry-sequence.
#[derive(Debug)]
pub struct FlakyTransport {
    failures_remaining: AtomicU64,
    send_count: AtomicU64,
}

impl FlakyTransport {
    /// Creates a transport that fails the first `failures` sends.
    pub fn new(failures: u64) -> Self {
        Self {
            failures_remaining: AtomicU64::new(failures),
            send_count: AtomicU64::new(0),
        }
    }

    /// Returns the number of sends attempted.
    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DeliveryTransport for FlakyTransport {
    async fn send(&self, _descriptor: &DeliveryDescriptor, _payload: &[u8]) -> DeliveryResult<()> {
        self.send_count.fetch_add(1, Ordering::Relaxed);

        let remaining = self.failures_remaining.load(Ordering::Relaxed);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::Relaxed);
            return Err(DeliveryError::response_status(503));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

// =============================================================================
// Slow Transport
// =============================================================================

/// A transport that holds every request for a fixed latency, then succeeds.
///
/// Used to keep submissions in flight while `flush` is exercised.
#[derive(Debug)]
pub struct SlowTransport {
    latency: Duration,
    send_count: AtomicU64,
}

impl SlowTransport {
    /// Creates a transport with the given per-request latency.
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            send_count: AtomicU64::new(0),
        }
    }

    /// Returns the number of sends completed.
    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DeliveryTransport for SlowTransport {
    async fn send(&self, _descriptor: &DeliveryDescriptor, _payload: &[u8]) -> DeliveryResult<()> {
        tokio::time::sleep(self.latency).await;
        self.send_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &str {
        "slow"
    }
}
