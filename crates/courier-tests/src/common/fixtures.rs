// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built telemetry data for consistent and reproducible testing.

use courier_core::types::{EventKey, SessionId, TelemetryPayload};

// =============================================================================
// Payload Fixtures
// =============================================================================

/// Fixture providing serialized telemetry payloads.
pub struct PayloadFixtures;

impl PayloadFixtures {
    /// A small, recognizable payload.
    pub fn small() -> TelemetryPayload {
        TelemetryPayload::new(b"trace-batch-0001".to_vec())
    }

    /// A payload of exactly `size` bytes.
    pub fn sized(size: usize) -> TelemetryPayload {
        TelemetryPayload::new(vec![0xAB; size])
    }

    /// A batch of distinct payloads.
    pub fn batch(count: usize) -> Vec<TelemetryPayload> {
        (0..count)
            .map(|i| TelemetryPayload::new(format!("trace-batch-{i:04}").into_bytes()))
            .collect()
    }
}

// =============================================================================
// Session Fixtures
// =============================================================================

/// Fixture providing session identifiers and event keys.
pub struct SessionFixtures;

impl SessionFixtures {
    /// A standard session id.
    pub fn session() -> SessionId {
        SessionId::new("session-0001")
    }

    /// Multiple sessions for batch testing.
    pub fn session_batch(count: usize) -> Vec<SessionId> {
        (0..count)
            .map(|i| SessionId::new(format!("session-{i:04}")))
            .collect()
    }

    /// An event key within the standard session.
    pub fn event(timestamp_millis: i64) -> EventKey {
        EventKey::new(Self::session(), timestamp_millis, "eventIndex")
    }

    /// An event key within the given session.
    pub fn event_in(session: &SessionId, timestamp_millis: i64) -> EventKey {
        EventKey::new(session.clone(), timestamp_millis, "eventIndex")
    }
}
