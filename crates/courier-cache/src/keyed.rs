// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The keyed persistent cache.
//!
//! [`KeyedCache`] is the generic store behind the agent's session registry,
//! app-state history, sent-event markers, and sequence counters. Each
//! instance is explicitly constructed and identified by a `unique_name`;
//! there are no process-wide singletons.
//!
//! # Concurrency
//!
//! All operations, reads included, are funneled through a single
//! `tokio::sync::Mutex`. Concurrent callers queue and are served one
//! operation at a time; a waiting caller is suspended, never parked on an
//! OS thread. This is the component's core correctness property: the cache
//! backs multiple unrelated dedup/index use-cases that must not race.
//!
//! # Restore
//!
//! Construction returns immediately with an empty cache and spawns an
//! asynchronous load from the backing store. [`KeyedCache::is_restored`]
//! flips to true exactly once, after that load has been applied. Callers
//! that need durability guarantees must await [`KeyedCache::restored`]
//! before trusting absence-of-key as "never seen". A failed load is treated
//! as "no prior data", not as a fatal error.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::entry::CacheEntry;
use crate::store::CacheStore;

// =============================================================================
// Cache Configuration
// =============================================================================

/// Configuration for one [`KeyedCache`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Identifies the instance in logs and namespaces its backing store.
    pub unique_name: String,

    /// Target upper bound on entry count, enforced during maintenance.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,

    /// Maximum entry age from last write, if bounded.
    #[serde(default = "default_max_lifetime")]
    #[serde(with = "opt_duration_secs")]
    pub max_lifetime: Option<Duration>,
}

fn default_max_capacity() -> usize {
    1_000
}

fn default_max_lifetime() -> Option<Duration> {
    Some(Duration::from_secs(31 * 24 * 60 * 60))
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_secs()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

impl CacheConfig {
    /// Creates a configuration builder.
    pub fn builder(unique_name: impl Into<String>) -> CacheConfigBuilder {
        CacheConfigBuilder::new(unique_name)
    }

    /// Session registry preset: capacity 100, lifetime 31 days.
    ///
    /// Old session records retire by age first, then by count.
    pub fn session_registry() -> Self {
        Self {
            unique_name: "session-registry".to_string(),
            max_capacity: 100,
            max_lifetime: Some(Duration::from_secs(31 * 24 * 60 * 60)),
        }
    }

    /// Per-session sequence index preset: capacity 1,000, lifetime 31 days.
    pub fn sequence_index() -> Self {
        Self {
            unique_name: "event-sequence-index".to_string(),
            max_capacity: 1_000,
            max_lifetime: Some(Duration::from_secs(31 * 24 * 60 * 60)),
        }
    }

    /// One-shot marker preset: capacity 100, lifetime 31 days.
    pub fn once_flags() -> Self {
        Self {
            unique_name: "sent-event-markers".to_string(),
            max_capacity: 100,
            max_lifetime: Some(Duration::from_secs(31 * 24 * 60 * 60)),
        }
    }

    /// Small bounds for tests.
    pub fn for_testing(unique_name: impl Into<String>) -> Self {
        Self {
            unique_name: unique_name.into(),
            max_capacity: 8,
            max_lifetime: Some(Duration::from_secs(3600)),
        }
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    fn new(unique_name: impl Into<String>) -> Self {
        Self {
            config: CacheConfig {
                unique_name: unique_name.into(),
                max_capacity: default_max_capacity(),
                max_lifetime: default_max_lifetime(),
            },
        }
    }

    /// Sets the capacity target.
    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.config.max_capacity = capacity;
        self
    }

    /// Sets the entry lifetime.
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.config.max_lifetime = lifetime;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CacheConfig {
        self.config
    }
}

// =============================================================================
// Keyed Cache
// =============================================================================

/// A capacity-and-age-bounded persistent keyed cache.
///
/// See the module docs for the concurrency and restore model. Values are
/// cloned out on read; `V` is expected to be cheap to clone (ids, counters,
/// small records).
pub struct KeyedCache<V> {
    config: CacheConfig,
    store: Arc<dyn CacheStore<V>>,
    entries: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
    restored: Arc<AtomicBool>,
    restore_notify: Arc<Notify>,
}

impl<V> Clone for KeyedCache<V> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            entries: self.entries.clone(),
            restored: self.restored.clone(),
            restore_notify: self.restore_notify.clone(),
        }
    }
}

impl<V> Debug for KeyedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedCache")
            .field("unique_name", &self.config.unique_name)
            .field("max_capacity", &self.config.max_capacity)
            .field("restored", &self.restored.load(Ordering::Acquire))
            .finish()
    }
}

impl<V> KeyedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Opens a cache and starts the asynchronous restore.
    ///
    /// Must be called from within a tokio runtime; the restore task is
    /// spawned immediately and [`KeyedCache::is_restored`] flips once it has
    /// been applied.
    pub fn open(config: CacheConfig, store: Arc<dyn CacheStore<V>>) -> Self {
        let cache = Self {
            config,
            store,
            entries: Arc::new(Mutex::new(HashMap::new())),
            restored: Arc::new(AtomicBool::new(false)),
            restore_notify: Arc::new(Notify::new()),
        };

        cache.spawn_restore();
        cache
    }

    fn spawn_restore(&self) {
        let name = self.config.unique_name.clone();
        let store = self.store.clone();
        let entries = self.entries.clone();
        let restored = self.restored.clone();
        let notify = self.restore_notify.clone();

        tokio::spawn(async move {
            let loaded = match store.load().await {
                Ok(Some(map)) => {
                    debug!(cache = %name, entries = map.len(), "Cache restored");
                    map
                }
                Ok(None) => {
                    debug!(cache = %name, "No prior cache data");
                    HashMap::new()
                }
                Err(e) => {
                    // No prior data; writes made since construction stand.
                    warn!(cache = %name, error = %e, "Cache restore failed, starting empty");
                    HashMap::new()
                }
            };

            {
                let mut guard = entries.lock().await;
                // Writes that raced ahead of the restore are newer than
                // anything on disk; keep them.
                for (key, entry) in loaded {
                    guard.entry(key).or_insert(entry);
                }
            }

            restored.store(true, Ordering::Release);
            notify.notify_waiters();
        });
    }

    /// Returns the instance configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns `true` once the backing store has been read and applied.
    pub fn is_restored(&self) -> bool {
        self.restored.load(Ordering::Acquire)
    }

    /// Waits until the restore has completed.
    pub async fn restored(&self) {
        while !self.is_restored() {
            let notified = self.restore_notify.notified();
            if self.is_restored() {
                break;
            }
            notified.await;
        }
    }

    /// Returns the value for `key`, if present.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().await.get(key).map(|e| e.value.clone())
    }

    /// Inserts or replaces the value for `key`, refreshing `updated_at`.
    pub async fn put(&self, key: impl Into<String>, value: V) {
        self.entries
            .lock()
            .await
            .insert(key.into(), CacheEntry::new(value));
    }

    /// Removes the value for `key`, returning it if present.
    pub async fn remove(&self, key: &str) -> Option<V> {
        self.entries.lock().await.remove(key).map(|e| e.value)
    }

    /// Returns all keys.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }

    /// Returns all values.
    pub async fn values(&self) -> Vec<V> {
        self.entries
            .lock()
            .await
            .values()
            .map(|e| e.value.clone())
            .collect()
    }

    /// Returns the entries whose `updated_at` falls inside the given bounds
    /// (inclusive). `None` leaves that side unbounded.
    pub async fn entries_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> HashMap<String, V> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|(_, entry)| {
                start.is_none_or(|s| entry.updated_at >= s)
                    && end.is_none_or(|e| entry.updated_at <= e)
            })
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Returns the current entry count.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Runs maintenance and persists the result to the backing store.
    ///
    /// Maintenance restores the target bounds: entries past `max_lifetime`
    /// are purged first, then the oldest entries beyond `max_capacity`. A
    /// failed save is logged and otherwise ignored; the in-memory state
    /// remains authoritative until the next successful sync.
    pub async fn sync(&self) {
        let snapshot = {
            let mut guard = self.entries.lock().await;
            Self::maintain(&self.config, &mut guard);
            guard.clone()
        };

        if let Err(e) = self.store.save(&snapshot).await {
            warn!(
                cache = %self.config.unique_name,
                error = %e,
                error_type = e.error_type(),
                "Cache save failed, keeping in-memory state"
            );
        }
    }

    /// Restores the capacity and age bounds on the given map.
    ///
    /// Age purge runs before count purge, so session-registry retirement
    /// happens by age first, then by count.
    fn maintain(config: &CacheConfig, entries: &mut HashMap<String, CacheEntry<V>>) {
        let now = Utc::now();

        if let Some(lifetime) = config.max_lifetime {
            let lifetime = chrono::Duration::from_std(lifetime)
                .unwrap_or_else(|_| chrono::Duration::MAX);
            entries.retain(|_, entry| !entry.is_expired(now, lifetime));
        }

        if entries.len() > config.max_capacity {
            let surplus = entries.len() - config.max_capacity;
            let mut by_age: Vec<(String, DateTime<Utc>)> = entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.updated_at))
                .collect();
            by_age.sort_by_key(|(_, updated_at)| *updated_at);

            for (key, _) in by_age.into_iter().take(surplus) {
                entries.remove(&key);
            }

            debug!(
                cache = %config.unique_name,
                evicted = surplus,
                remaining = entries.len(),
                "Capacity maintenance evicted oldest entries"
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
