// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Delivery transport boundary.
//!
//! The scheduler talks to the network through [`DeliveryTransport`]: one
//! POST per item, success meaning a 2xx-equivalent response. The HTTP
//! implementation is stateless per request; everything an attempt needs
//! travels in the descriptor, never in transport state.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use courier_core::error::{DeliveryError, DeliveryResult};

use crate::descriptor::DeliveryDescriptor;

// =============================================================================
// Transport Configuration
// =============================================================================

/// Configuration for the HTTP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Upper bound on any single request timeout.
    #[serde(default = "default_max_timeout")]
    #[serde(with = "duration_secs")]
    pub max_timeout: Duration,

    /// Content type sent with every payload.
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// User agent sent with every request; generated when not overridden.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_max_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_content_type() -> String {
    "application/x-protobuf".to_string()
}

fn default_user_agent() -> String {
    format!("courier/{} ({})", crate::VERSION, std::env::consts::OS)
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

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_timeout: default_max_timeout(),
            content_type: default_content_type(),
            user_agent: default_user_agent(),
        }
    }
}

// =============================================================================
// Delivery Transport Trait
// =============================================================================

/// One-shot payload delivery to the collector.
///
/// # Implementation Requirements
///
/// - `send` must be self-contained: no reliance on state captured at an
///   earlier submission, since the caller may be a different process launch
///   than the one that spooled the item.
/// - Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait DeliveryTransport: Send + Sync + Debug {
    /// Posts one payload.
    ///
    /// # Returns
    ///
    /// - `Ok(())` on a 2xx-equivalent response
    /// - `Err(DeliveryError)` for non-2xx responses, transport-level
    ///   errors, and timeouts, all of which feed the retry decision
    async fn send(&self, descriptor: &DeliveryDescriptor, payload: &[u8]) -> DeliveryResult<()>;

    /// Returns the name of this transport for logging/metrics.
    fn name(&self) -> &str;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// HTTP POST transport backed by `reqwest`.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Creates a transport with the given configuration.
    pub fn new(config: TransportConfig) -> DeliveryResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DeliveryError::transport_failed_with("failed to build HTTP client", e))?;

        Ok(Self { client, config })
    }

    /// Creates a transport with default configuration.
    pub fn with_defaults() -> DeliveryResult<Self> {
        Self::new(TransportConfig::default())
    }
}

#[async_trait]
impl DeliveryTransport for HttpTransport {
    async fn send(&self, descriptor: &DeliveryDescriptor, payload: &[u8]) -> DeliveryResult<()> {
        let timeout = descriptor.effective_timeout(self.config.max_timeout);

        let response = self
            .client
            .post(&descriptor.destination)
            .header(reqwest::header::CONTENT_TYPE, &self.config.content_type)
            .timeout(timeout)
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::timeout(timeout)
                } else {
                    DeliveryError::transport_failed_with("request failed", e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::response_status(status.as_u16()))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

// =============================================================================
// Mock Transport (for testing)
// =============================================================================

/// Scripted outcome for one [`MockTransport`] send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    /// 2xx-equivalent success.
    Success,
    /// Non-2xx response with the given status.
    Status(u16),
    /// Transport-level failure (connection refused, DNS, ...).
    TransportError,
    /// Request timeout.
    Timeout,
}

/// A mock transport that replays scripted outcomes.
///
/// Outcomes are consumed front-to-back; once the script is exhausted the
/// default outcome applies. Every send is recorded with the descriptor's
/// attempt count so tests can assert the exact retry sequence.
#[derive(Debug)]
pub struct MockTransport {
    script: parking_lot::Mutex<std::collections::VecDeque<MockOutcome>>,
    default_outcome: MockOutcome,
    send_count: AtomicU64,
    seen: parking_lot::Mutex<Vec<(Uuid, u32)>>,
}

impl MockTransport {
    /// Creates a transport that always succeeds.
    pub fn new() -> Self {
        Self::with_default(MockOutcome::Success)
    }

    /// Creates a transport that always fails at the transport level.
    pub fn failing() -> Self {
        Self::with_default(MockOutcome::TransportError)
    }

    /// Creates a transport with the given fallback outcome.
    pub fn with_default(default_outcome: MockOutcome) -> Self {
        Self {
            script: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            default_outcome,
            send_count: AtomicU64::new(0),
            seen: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Appends scripted outcomes consumed before the default applies.
    pub fn script(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.script.lock().extend(outcomes);
    }

    /// Returns the number of sends attempted.
    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::Relaxed)
    }

    /// Returns the `(id, attempt_count)` pairs seen, in order.
    pub fn seen(&self) -> Vec<(Uuid, u32)> {
        self.seen.lock().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryTransport for MockTransport {
    async fn send(&self, descriptor: &DeliveryDescriptor, _payload: &[u8]) -> DeliveryResult<()> {
        self.send_count.fetch_add(1, Ordering::Relaxed);
        self.seen
            .lock()
            .push((descriptor.id, descriptor.attempt_count));

        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(self.default_outcome);

        match outcome {
            MockOutcome::Success => Ok(()),
            MockOutcome::Status(status) => Err(DeliveryError::response_status(status)),
            MockOutcome::TransportError => {
                Err(DeliveryError::transport_failed("scripted transport error"))
            }
            MockOutcome::Timeout => Err(DeliveryError::timeout(Duration::from_secs(1))),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// Tests
// =============================================================================
