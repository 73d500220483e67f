// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for Courier.
//!
//! This module defines the error type system shared by every Courier
//! component:
//!
//! - Provides clear, descriptive error messages
//! - Supports error chaining for traceability
//! - Distinguishes between retryable and non-retryable errors
//! - Supports structured logging
//!
//! # Error Hierarchy
//!
//! ```text
//! CourierError (root)
//! ├── ConfigError    - Configuration parsing and validation
//! ├── CacheError     - Keyed persistent cache operations
//! ├── SpoolError     - Spool / disk quota operations
//! ├── DeliveryError  - Delivery scheduling and transport
//! └── AgentError     - Agent wiring and lifecycle
//! ```
//!
//! Nothing in the delivery path propagates an error back to telemetry
//! producers; these types exist for logs and for component boundaries. The
//! worst observable effect of any failure is data loss, never host
//! application instability.
//!
//! # Examples
//!
//! ```
//! use courier_core::error::{CourierError, DeliveryError};
//!
//! let error = DeliveryError::response_status(503);
//! assert!(error.is_retryable());
//!
//! let root: CourierError = error.into();
//! assert!(root.is_retryable());
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// CourierError - Root Error Type
// =============================================================================

/// The root error type for Courier.
///
/// All errors in Courier can be converted to this type, providing a unified
/// handling interface across the agent.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Keyed persistent cache error.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Spool error.
    #[error("Spool error: {0}")]
    Spool(#[from] SpoolError),

    /// Delivery error.
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Agent error.
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

impl CourierError {
    /// Returns `true` if this error is retryable.
    ///
    /// Retryable errors are transient conditions that may succeed on a
    /// subsequent attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            CourierError::Cache(e) => e.is_retryable(),
            CourierError::Spool(e) => e.is_retryable(),
            CourierError::Delivery(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            CourierError::Config(_) => "config",
            CourierError::Cache(_) => "cache",
            CourierError::Spool(_) => "spool",
            CourierError::Delivery(_) => "delivery",
            CourierError::Agent(_) => "agent",
        }
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration file.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Error message.
        message: String,
        /// Underlying parser error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation failed.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Unsupported configuration file format.
    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat {
        /// The unrecognized file extension.
        extension: String,
    },

    /// File I/O error.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
        }
    }

    /// Returns the error type for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConfigError::Parse { .. } => "parse",
            ConfigError::Validation { .. } => "validation",
            ConfigError::UnsupportedFormat { .. } => "unsupported_format",
            ConfigError::Io { .. } => "io",
        }
    }
}

// =============================================================================
// CacheError
// =============================================================================

/// Keyed persistent cache errors.
///
/// Per the error handling design, cache failures are absorbed at the call
/// site: a failed load is treated as "no prior data" and a failed save is
/// logged and ignored. These variants exist so the absorbing code can log
/// what actually happened.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to read the backing store.
    #[error("Failed to load cache '{name}': {message}")]
    LoadFailed {
        /// The cache's unique name.
        name: String,
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failed to write the backing store.
    #[error("Failed to save cache '{name}': {message}")]
    SaveFailed {
        /// The cache's unique name.
        name: String,
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Stored bytes could not be decoded.
    #[error("Corrupted cache data for '{name}': {message}")]
    Corrupted {
        /// The cache's unique name.
        name: String,
        /// Error message.
        message: String,
    },
}

impl CacheError {
    /// Creates a load failed error.
    pub fn load_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LoadFailed {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a load failed error with a source.
    pub fn load_failed_with<E>(name: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::LoadFailed {
            name: name.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a save failed error.
    pub fn save_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SaveFailed {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a save failed error with a source.
    pub fn save_failed_with<E>(name: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::SaveFailed {
            name: name.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a corrupted data error.
    pub fn corrupted(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        // A save can succeed on the next sync; corrupted or unreadable data
        // will not improve by retrying.
        matches!(self, CacheError::SaveFailed { .. })
    }

    /// Returns the error type for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            CacheError::LoadFailed { .. } => "load_failed",
            CacheError::SaveFailed { .. } => "save_failed",
            CacheError::Corrupted { .. } => "corrupted",
        }
    }
}

// =============================================================================
// SpoolError
// =============================================================================

/// Spool / disk quota manager errors.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// Failed to write an item to the spool directory.
    #[error("Failed to write spool item: {message}")]
    WriteFailed {
        /// Error message.
        message: String,
        /// Underlying I/O error.
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to read an item back from the spool directory.
    #[error("Failed to read spool item '{id}': {message}")]
    ReadFailed {
        /// The item id.
        id: String,
        /// Error message.
        message: String,
    },

    /// The statistics walk failed; the spool is treated as corrupted.
    #[error("Spool statistics unavailable: {message}")]
    StatisticsFailed {
        /// Error message.
        message: String,
    },

    /// Occupied bytes exceed the derived quota.
    #[error("Spool quota exceeded: {occupied}/{quota} bytes")]
    QuotaExceeded {
        /// Occupied bytes at the time of the check.
        occupied: u64,
        /// Quota bytes at the time of the check.
        quota: u64,
    },

    /// Full reset of the spool directory failed.
    #[error("Failed to reset spool: {message}")]
    ResetFailed {
        /// Error message.
        message: String,
        /// Underlying I/O error.
        #[source]
        source: Option<std::io::Error>,
    },
}

impl SpoolError {
    /// Creates a write failed error.
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a write failed error from an I/O error.
    pub fn write_failed_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::WriteFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a read failed error.
    pub fn read_failed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates a statistics failed error.
    pub fn statistics_failed(message: impl Into<String>) -> Self {
        Self::StatisticsFailed {
            message: message.into(),
        }
    }

    /// Creates a quota exceeded error.
    pub fn quota_exceeded(occupied: u64, quota: u64) -> Self {
        Self::QuotaExceeded { occupied, quota }
    }

    /// Creates a reset failed error.
    pub fn reset_failed(message: impl Into<String>, source: Option<std::io::Error>) -> Self {
        Self::ResetFailed {
            message: message.into(),
            source,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        // Quota breaches and failed statistics trigger a full reset instead
        // of a retry; individual I/O failures may be transient.
        matches!(self, SpoolError::WriteFailed { .. } | SpoolError::ReadFailed { .. })
    }

    /// Returns the error type for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            SpoolError::WriteFailed { .. } => "write_failed",
            SpoolError::ReadFailed { .. } => "read_failed",
            SpoolError::StatisticsFailed { .. } => "statistics_failed",
            SpoolError::QuotaExceeded { .. } => "quota_exceeded",
            SpoolError::ResetFailed { .. } => "reset_failed",
        }
    }
}

// =============================================================================
// DeliveryError
// =============================================================================

/// Delivery scheduling and transport errors.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The transport could not complete the request.
    #[error("Transport failed: {message}")]
    TransportFailed {
        /// Error message.
        message: String,
        /// Underlying transport error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The collector answered with a non-success status.
    #[error("Collector returned status {status}")]
    ResponseStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The request did not complete within the descriptor's timeout.
    #[error("Delivery timed out after {duration:?}")]
    Timeout {
        /// The timeout that elapsed.
        duration: Duration,
    },

    /// The spool gate rejected the attempt before submission.
    #[error("Spool rejected delivery attempt: {message}")]
    SpoolRejected {
        /// Error message.
        message: String,
    },

    /// The descriptor sidecar could not be written or decoded.
    #[error("Descriptor persistence failed for '{id}': {message}")]
    DescriptorFailed {
        /// The delivery item id.
        id: String,
        /// Error message.
        message: String,
    },

    /// The retry limit was exhausted; the item was dropped.
    #[error("Delivery dropped after {attempts} attempts")]
    Exhausted {
        /// Total attempts made.
        attempts: u32,
    },
}

impl DeliveryError {
    /// Creates a transport failed error.
    pub fn transport_failed(message: impl Into<String>) -> Self {
        Self::TransportFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport failed error with a source.
    pub fn transport_failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TransportFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a response status error.
    pub fn response_status(status: u16) -> Self {
        Self::ResponseStatus { status }
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Creates a spool rejected error.
    pub fn spool_rejected(message: impl Into<String>) -> Self {
        Self::SpoolRejected {
            message: message.into(),
        }
    }

    /// Creates a descriptor persistence error.
    pub fn descriptor_failed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DescriptorFailed {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates an exhausted error.
    pub fn exhausted(attempts: u32) -> Self {
        Self::Exhausted { attempts }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Every transport-level outcome short of success feeds the retry table;
    /// exhaustion and spool rejection are terminal for the attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeliveryError::TransportFailed { .. }
                | DeliveryError::ResponseStatus { .. }
                | DeliveryError::Timeout { .. }
        )
    }

    /// Returns the error type for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            DeliveryError::TransportFailed { .. } => "transport_failed",
            DeliveryError::ResponseStatus { .. } => "response_status",
            DeliveryError::Timeout { .. } => "timeout",
            DeliveryError::SpoolRejected { .. } => "spool_rejected",
            DeliveryError::DescriptorFailed { .. } => "descriptor_failed",
            DeliveryError::Exhausted { .. } => "exhausted",
        }
    }
}

// =============================================================================
// AgentError
// =============================================================================

/// Agent wiring and lifecycle errors.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Component initialization failed.
    #[error("Initialization failed: {message}")]
    Initialization {
        /// Error message.
        message: String,
    },

    /// The agent was used after shutdown.
    #[error("Agent is shut down")]
    ShutDown,
}

impl AgentError {
    /// Creates an initialization error.
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization {
            message: message.into(),
        }
    }

    /// Returns the error type for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            AgentError::Initialization { .. } => "initialization",
            AgentError::ShutDown => "shut_down",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// A Result type with CourierError.
pub type CourierResult<T> = Result<T, CourierError>;

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A Result type with CacheError.
pub type CacheResult<T> = Result<T, CacheError>;

/// A Result type with SpoolError.
pub type SpoolResult<T> = Result<T, SpoolError>;

/// A Result type with DeliveryError.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// A Result type with AgentError.
pub type AgentResult<T> = Result<T, AgentError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_retryable() {
        assert!(DeliveryError::transport_failed("connection refused").is_retryable());
        assert!(DeliveryError::response_status(503).is_retryable());
        assert!(DeliveryError::timeout(Duration::from_secs(30)).is_retryable());
        assert!(!DeliveryError::spool_rejected("quota").is_retryable());
        assert!(!DeliveryError::exhausted(6).is_retryable());
    }

    #[test]
    fn test_spool_error_retryable() {
        assert!(SpoolError::write_failed("disk busy").is_retryable());
        assert!(!SpoolError::quota_exceeded(300, 200).is_retryable());
        assert!(!SpoolError::statistics_failed("walk failed").is_retryable());
    }

    #[test]
    fn test_cache_error_retryable() {
        assert!(CacheError::save_failed("sessions", "disk full").is_retryable());
        assert!(!CacheError::load_failed("sessions", "missing").is_retryable());
        assert!(!CacheError::corrupted("sessions", "bad json").is_retryable());
    }

    #[test]
    fn test_root_error_conversion() {
        let delivery = DeliveryError::response_status(500);
        let root: CourierError = delivery.into();

        assert!(root.is_retryable());
        assert_eq!(root.error_type(), "delivery");
    }

    #[test]
    fn test_config_error_helpers() {
        let error = ConfigError::validation("spool.relative_fraction", "must be in (0, 1]");
        assert!(matches!(error, ConfigError::Validation { .. }));
        assert_eq!(error.error_type(), "validation");

        let error = ConfigError::unsupported_format("ini");
        assert!(matches!(error, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_error_type_strings() {
        assert_eq!(SpoolError::quota_exceeded(1, 1).error_type(), "quota_exceeded");
        assert_eq!(DeliveryError::exhausted(6).error_type(), "exhausted");
        assert_eq!(CacheError::corrupted("n", "m").error_type(), "corrupted");
        assert_eq!(AgentError::ShutDown.error_type(), "shut_down");
    }
}
