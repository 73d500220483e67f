// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # courier-core
//!
//! Core abstractions and shared types for the Courier telemetry delivery agent.
//!
//! This crate provides the foundational pieces used across all Courier
//! components:
//!
//! - **Types**: identifiers and the opaque payload wrapper (`SessionId`,
//!   `EventKey`, `TelemetryPayload`)
//! - **Error**: unified error hierarchy rooted at [`error::CourierError`]
//! - **Backoff**: the fixed delivery backoff table and retry limit
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_core::types::{SessionId, TelemetryPayload};
//! use courier_core::backoff::BackoffSchedule;
//!
//! let payload = TelemetryPayload::new(encoded_batch);
//! let schedule = BackoffSchedule::standard();
//! let delay = schedule.delay_for_attempt(2); // 10 minutes
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod backoff;
pub mod error;
pub mod types;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
