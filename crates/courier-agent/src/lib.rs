// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # courier-agent
//!
//! The embedding surface of the Courier telemetry delivery agent.
//!
//! A [`CourierAgent`] wires the spool, the delivery scheduler, and the keyed
//! caches into one explicitly constructed instance; there are no global
//! singletons. The host application:
//!
//! - hands serialized telemetry batches to [`CourierAgent::enqueue`]
//!   (fire-and-forget; delivery failures are never reported back per item)
//! - forwards foreground/background transitions to the agent's
//!   [`LifecycleNotifier`], which triggers a flush before suspension
//! - calls [`CourierAgent::shutdown`] when tearing down
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_agent::CourierAgent;
//! use courier_config::CourierConfig;
//! use courier_core::types::TelemetryPayload;
//!
//! let config = CourierConfig::new("https://collector.example.com/v1", "/var/lib/courier");
//! let agent = CourierAgent::start(config).await?;
//!
//! agent.enqueue(TelemetryPayload::new(encoded_batch)).await;
//!
//! // Host is about to be suspended:
//! agent.lifecycle().notify_phase(AppPhase::Background);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod agent;
mod lifecycle;
pub mod logging;
mod sessions;

pub use agent::CourierAgent;
pub use lifecycle::{AppPhase, LifecycleNotifier};
pub use sessions::{SessionRecord, SessionRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
