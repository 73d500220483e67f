// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # courier-config
//!
//! Configuration schema and loading for the Courier agent.
//!
//! Embedding applications usually construct [`CourierConfig`] in code; the
//! loader exists for deployments that ship a YAML or TOML file alongside the
//! host application and for tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_config::{load_config, CourierConfig};
//!
//! // From a file, with COURIER_* environment overrides applied:
//! let config = load_config("courier.yaml")?;
//!
//! // Or programmatically:
//! let config = CourierConfig::new("https://collector.example.com/v1/batches", "/var/lib/courier");
//! config.validate()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod loader;
mod schema;

pub use loader::{load_config, ConfigLoader};
pub use schema::{AgentSection, CourierConfig, LogFormat, LoggingSection};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
