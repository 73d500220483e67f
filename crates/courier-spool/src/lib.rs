// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # courier-spool
//!
//! On-disk payload staging for the Courier delivery subsystem.
//!
//! The spool holds serialized telemetry batches awaiting upload, one file
//! per item. Existence of a file *is* the item's pending state; no further
//! metadata is kept by the spool itself. Occupied size is tracked against a
//! quota derived from an absolute ceiling and a fraction of free device
//! storage, and a failed or exceeded quota check triggers a full reset of
//! the directory rather than selective eviction.
//!
//! # Design Principles
//!
//! - **Opaque items**: the spool never interprets payload bytes.
//! - **Serialized mutation**: writes, deletes, and resets go through one
//!   async mutex, so a reset never interleaves with a write.
//! - **Debounced statistics**: the directory walk is expensive and runs
//!   off the caller's path, single-flight, with a trailing cooldown.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_spool::{Spool, SpoolConfig};
//!
//! let spool = Spool::open(SpoolConfig::new("/var/lib/courier/spool"))?;
//!
//! let handle = spool.write(&payload_bytes).await?;
//! // ... hand the item to the delivery scheduler ...
//! spool.delete(&handle).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod quota;
mod spool;
mod stats;

pub use quota::{SpoolConfig, SpoolConfigBuilder};
pub use spool::{ItemHandle, Spool};
pub use stats::SpoolStatistics;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
