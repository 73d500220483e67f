// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for Courier.
//!
//! This module provides the identifiers and the opaque payload wrapper that
//! form the foundation of telemetry handling across the agent. Payload
//! *contents* are never interpreted here; encoding is a producer concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// A unique identifier for a telemetry session.
///
/// Session IDs are generated by the host-facing capture layer and must be
/// stable for the lifetime of one app session.
///
/// # Examples
///
/// ```
/// use courier_core::types::SessionId;
///
/// let id = SessionId::new("f3a1c2");
/// assert_eq!(id.as_str(), "f3a1c2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session ID.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the ID and returns the inner string.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Composite Cache Keys
// =============================================================================

/// A composite key addressing one event within a session.
///
/// The dedup/index caches key entries by session, event timestamp, and a
/// purpose suffix, rendered as `"{session_id}.{timestamp_millis}.{suffix}"`.
/// Building the key in one place keeps every consumer's format identical, so
/// markers written by one call site are visible to the others.
///
/// # Examples
///
/// ```
/// use courier_core::types::{EventKey, SessionId};
///
/// let key = EventKey::new(SessionId::new("s1"), 1700000000000, "eventIndex");
/// assert_eq!(key.render(), "s1.1700000000000.eventIndex");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    session_id: SessionId,
    timestamp_millis: i64,
    suffix: &'static str,
}

impl EventKey {
    /// Creates a new composite event key.
    pub fn new(session_id: SessionId, timestamp_millis: i64, suffix: &'static str) -> Self {
        Self {
            session_id,
            timestamp_millis,
            suffix,
        }
    }

    /// Returns the session this key belongs to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Renders the key into its canonical string form.
    pub fn render(&self) -> String {
        format!("{}.{}.{}", self.session_id, self.timestamp_millis, self.suffix)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.session_id, self.timestamp_millis, self.suffix)
    }
}

// =============================================================================
// Telemetry Payload
// =============================================================================

/// An opaque, already-serialized telemetry batch awaiting delivery.
///
/// Producers serialize their batches (protobuf or equivalent) before handing
/// them to the delivery subsystem; the spool and scheduler only ever see
/// bytes. The creation timestamp is informational and used for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    /// The serialized batch.
    bytes: Vec<u8>,

    /// When the payload was handed to the delivery subsystem.
    created_at: DateTime<Utc>,
}

impl TelemetryPayload {
    /// Wraps serialized bytes as a payload.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            created_at: Utc::now(),
        }
    }

    /// Returns the serialized bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the payload size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the payload carries no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns when the payload was created.
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Consumes the payload and returns the inner bytes.
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<Vec<u8>> for TelemetryPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for TelemetryPayload {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_roundtrip() {
        let id = SessionId::new("abc-123");
        assert_eq!(id.as_str(), "abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.clone().into_inner(), "abc-123");
    }

    #[test]
    fn test_session_id_from_conversions() {
        let from_str: SessionId = "s".into();
        let from_string: SessionId = String::from("s").into();
        assert_eq!(from_str, from_string);
    }

    #[test]
    fn test_event_key_render() {
        let key = EventKey::new(SessionId::new("s1"), 42, "eventIndex");
        assert_eq!(key.render(), "s1.42.eventIndex");
        assert_eq!(key.to_string(), key.render());
    }

    #[test]
    fn test_payload_wraps_bytes() {
        let payload = TelemetryPayload::new(vec![1u8, 2, 3]);
        assert_eq!(payload.len(), 3);
        assert!(!payload.is_empty());
        assert_eq!(payload.bytes(), &[1, 2, 3]);
        assert_eq!(payload.into_bytes(), vec![1, 2, 3]);
    }

    #[test]
    fn test_payload_empty() {
        let payload = TelemetryPayload::new(Vec::new());
        assert!(payload.is_empty());
        assert_eq!(payload.len(), 0);
    }
}
