// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # courier-deliver
//!
//! Retry/backoff delivery scheduling for spooled telemetry payloads.
//!
//! Each spooled item is described by a [`DeliveryDescriptor`] persisted as a
//! JSON sidecar *before* the item is handed to the transport, so a
//! completion, which may happen in a later process launch, can always be
//! reconciled from disk alone. The scheduler drives the per-item state
//! machine:
//!
//! ```text
//! Spooled → Submitted → { Delivered | Retrying → Submitted | Dropped }
//! ```
//!
//! Failures are retried on a fixed backoff table and dropped once the
//! attempt limit is exhausted; nothing is ever surfaced to the producer.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_deliver::{DeliveryConfig, DeliveryScheduler, HttpTransport, TransportConfig};
//!
//! let transport = HttpTransport::new(TransportConfig::default());
//! let scheduler = DeliveryScheduler::new(spool, transport, DeliveryConfig::new(url));
//!
//! scheduler.recover_orphans().await;
//! scheduler.enqueue(&payload_bytes).await;
//! scheduler.flush().await; // before suspension
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod descriptor;
mod scheduler;
mod transport;

pub use descriptor::{DeliveryDescriptor, DeliveryState};
pub use scheduler::{DeliveryConfig, DeliveryMetrics, DeliveryScheduler};
pub use transport::{DeliveryTransport, HttpTransport, MockOutcome, MockTransport, TransportConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
