// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Dedup/index facades over [`KeyedCache`].
//!
//! Two small wrappers cover the agent's event bookkeeping:
//!
//! - [`SequenceIndex`] assigns each event a monotonically increasing
//!   per-session number and keeps the assignment stable across repeat
//!   queries for the same event.
//! - [`OnceFlags`] remembers which one-shot events have already fired for a
//!   session.
//!
//! Both are thin facades; bounds, restore, and persistence come from the
//! underlying cache instance.

use std::sync::Arc;

use courier_core::types::{EventKey, SessionId};

use crate::keyed::{CacheConfig, KeyedCache};
use crate::store::CacheStore;

// =============================================================================
// Sequence Index
// =============================================================================

/// Assigns monotonically increasing per-session event numbers.
///
/// The next free number per session lives under a dedicated counter key;
/// each event's assigned number is recorded under its composite
/// [`EventKey`], so asking twice for the same event returns the same number.
#[derive(Debug, Clone)]
pub struct SequenceIndex {
    cache: KeyedCache<u64>,

    /// Serializes allocation, which spans several cache operations.
    allocate: Arc<tokio::sync::Mutex<()>>,
}

impl SequenceIndex {
    /// Opens a sequence index over its own cache instance.
    pub fn open(store: Arc<dyn CacheStore<u64>>) -> Self {
        Self::with_cache(KeyedCache::open(CacheConfig::sequence_index(), store))
    }

    /// Wraps an already-opened cache (used by tests with custom bounds).
    pub fn with_cache(cache: KeyedCache<u64>) -> Self {
        Self {
            cache,
            allocate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Returns the sequence number for the event, assigning the session's
    /// next free number on first sight.
    pub async fn index_for_event(&self, key: &EventKey) -> u64 {
        let _guard = self.allocate.lock().await;

        let rendered = key.render();
        if let Some(existing) = self.cache.get(&rendered).await {
            return existing;
        }

        let counter_key = Self::counter_key(key.session_id());
        let next = self.cache.get(&counter_key).await.unwrap_or(0);
        self.cache.put(counter_key, next + 1).await;
        self.cache.put(rendered, next).await;
        next
    }

    /// Waits until the backing store has been restored.
    pub async fn restored(&self) {
        self.cache.restored().await;
    }

    /// Persists the index.
    pub async fn sync(&self) {
        self.cache.sync().await;
    }

    fn counter_key(session_id: &SessionId) -> String {
        format!("{session_id}.nextEventIndex")
    }
}

// =============================================================================
// Once Flags
// =============================================================================

/// Remembers which one-shot events have already fired.
#[derive(Debug, Clone)]
pub struct OnceFlags {
    cache: KeyedCache<bool>,
}

impl OnceFlags {
    /// Opens a marker set over its own cache instance.
    pub fn open(store: Arc<dyn CacheStore<bool>>) -> Self {
        Self {
            cache: KeyedCache::open(CacheConfig::once_flags(), store),
        }
    }

    /// Wraps an already-opened cache.
    pub fn with_cache(cache: KeyedCache<bool>) -> Self {
        Self { cache }
    }

    /// Marks the event fired. Returns `true` if this was the first firing.
    pub async fn check_and_set(&self, key: &EventKey) -> bool {
        let rendered = key.render();
        if self.cache.get(&rendered).await.is_some() {
            return false;
        }
        self.cache.put(rendered, true).await;
        true
    }

    /// Returns `true` if the event has already fired.
    pub async fn has_fired(&self, key: &EventKey) -> bool {
        self.cache.get(&key.render()).await.is_some()
    }

    /// Waits until the backing store has been restored.
    pub async fn restored(&self) {
        self.cache.restored().await;
    }

    /// Persists the markers.
    pub async fn sync(&self) {
        self.cache.sync().await;
    }
}

// =============================================================================
// Tests
// =============================================================================
