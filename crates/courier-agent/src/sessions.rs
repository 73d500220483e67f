// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session registry over the keyed cache.
//!
//! One record per observed app session, keyed by session id. Retirement is
//! entirely the cache's maintenance: records past the 31-day lifetime go
//! first, then the oldest beyond the 100-record capacity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_cache::{CacheConfig, CacheStore, KeyedCache};
use courier_core::types::SessionId;

// =============================================================================
// Session Record
// =============================================================================

/// Durable record of one app session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The session id.
    pub session_id: SessionId,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// When the session last produced telemetry.
    pub last_event_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Creates a record for a session starting now.
    pub fn new(session_id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            started_at: now,
            last_event_at: now,
        }
    }
}

// =============================================================================
// Session Registry
// =============================================================================

/// Keeps the bounded list of recent sessions.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    cache: KeyedCache<SessionRecord>,
}

impl SessionRegistry {
    /// Opens a registry over its own cache instance.
    pub fn open(store: Arc<dyn CacheStore<SessionRecord>>) -> Self {
        Self {
            cache: KeyedCache::open(CacheConfig::session_registry(), store),
        }
    }

    /// Wraps an already-opened cache (used by tests with custom bounds).
    pub fn with_cache(cache: KeyedCache<SessionRecord>) -> Self {
        Self { cache }
    }

    /// Records a session start, replacing any prior record for the id.
    pub async fn record_start(&self, session_id: SessionId) -> SessionRecord {
        let record = SessionRecord::new(session_id.clone());
        self.cache.put(session_id.as_str(), record.clone()).await;
        record
    }

    /// Marks the session as active now.
    ///
    /// Unknown sessions are registered on the spot: a session that produced
    /// telemetry existed, whether or not its start was observed.
    pub async fn touch(&self, session_id: &SessionId) {
        let mut record = match self.cache.get(session_id.as_str()).await {
            Some(record) => record,
            None => SessionRecord::new(session_id.clone()),
        };
        record.last_event_at = Utc::now();
        self.cache.put(session_id.as_str(), record).await;
    }

    /// Returns the record for a session, if still retained.
    pub async fn get(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.cache.get(session_id.as_str()).await
    }

    /// Returns all retained session records.
    pub async fn all(&self) -> Vec<SessionRecord> {
        self.cache.values().await
    }

    /// Returns sessions last written inside the given time window.
    pub async fn sessions_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<SessionRecord> {
        self.cache
            .entries_between(start, end)
            .await
            .into_values()
            .collect()
    }

    /// Returns the retained session count.
    pub async fn len(&self) -> usize {
        self.cache.len().await
    }

    /// Returns `true` when no sessions are retained.
    pub async fn is_empty(&self) -> bool {
        self.cache.is_empty().await
    }

    /// Waits until the backing store has been restored.
    pub async fn restored(&self) {
        self.cache.restored().await;
    }

    /// Runs retirement and persists the registry.
    pub async fn sync(&self) {
        self.cache.sync().await;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use courier_cache::MemoryStore;

    fn registry() -> SessionRegistry {
        SessionRegistry::open(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_record_and_get() {
        let registry = registry();
        registry.restored().await;

        let record = registry.record_start(SessionId::new("s1")).await;
        let fetched = registry.get(&SessionId::new("s1")).await.unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn test_touch_registers_unknown_session() {
        let registry = registry();
        registry.restored().await;

        let id = SessionId::new("unseen");
        registry.touch(&id).await;

        assert!(registry.get(&id).await.is_some());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_touch_advances_last_event() {
        let registry = registry();
        registry.restored().await;

        let id = SessionId::new("s1");
        let record = registry.record_start(id.clone()).await;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        registry.touch(&id).await;

        let touched = registry.get(&id).await.unwrap();
        assert!(touched.last_event_at > record.last_event_at);
        assert_eq!(touched.started_at, record.started_at);
    }

    #[tokio::test]
    async fn test_registry_survives_restore() {
        let store = Arc::new(MemoryStore::new());

        {
            let registry = SessionRegistry::open(store.clone());
            registry.restored().await;
            registry.record_start(SessionId::new("s1")).await;
            registry.sync().await;
        }

        let revived = SessionRegistry::open(store);
        revived.restored().await;
        assert!(revived.get(&SessionId::new("s1")).await.is_some());
    }

    #[tokio::test]
    async fn test_capacity_preset_applies() {
        let registry = registry();
        assert_eq!(registry.cache.config().max_capacity, 100);
    }
}
