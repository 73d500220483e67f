// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Cache persistence boundary.
//!
//! The cache talks to durable storage exclusively through [`CacheStore`]:
//! a whole-map `load` at restore time and a whole-map `save` at sync time.
//! Where and how the map is kept is the store's concern. Two implementations
//! are provided: a JSON file store for production and an in-memory store for
//! tests.

use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use courier_core::error::{CacheError, CacheResult};

use crate::entry::CacheEntry;

// =============================================================================
// Cache Store Trait
// =============================================================================

/// Durable backing store for one [`KeyedCache`](crate::KeyedCache).
///
/// # Implementation Requirements
///
/// - `load` returns `Ok(None)` when no prior data exists; that is not an
///   error condition.
/// - `save` replaces the previous contents atomically: a crash mid-save must
///   leave either the old map or the new map readable, never a torn file.
/// - Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait CacheStore<V>: Send + Sync + Debug {
    /// Reads the persisted entry map, if any.
    async fn load(&self) -> CacheResult<Option<HashMap<String, CacheEntry<V>>>>;

    /// Persists the entry map, replacing any previous contents.
    async fn save(&self, entries: &HashMap<String, CacheEntry<V>>) -> CacheResult<()>;
}

// =============================================================================
// File Store
// =============================================================================

/// JSON file-backed cache store.
///
/// The map is serialized as one JSON document and written through a
/// temporary file followed by a rename, so a crash mid-write never leaves a
/// torn document behind.
#[derive(Debug)]
pub struct FileStore<V> {
    /// Path of the JSON document.
    path: PathBuf,

    _marker: PhantomData<fn() -> V>,
}

impl<V> FileStore<V> {
    /// Creates a store writing to the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Returns the document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl<V> CacheStore<V> for FileStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + Debug,
{
    async fn load(&self) -> CacheResult<Option<HashMap<String, CacheEntry<V>>>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::load_failed_with(self.name(), "read failed", e));
            }
        };

        let entries = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::corrupted(self.name(), e.to_string()))?;

        Ok(Some(entries))
    }

    async fn save(&self, entries: &HashMap<String, CacheEntry<V>>) -> CacheResult<()> {
        let bytes = serde_json::to_vec(entries)
            .map_err(|e| CacheError::save_failed_with(self.name(), "encode failed", e))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::save_failed_with(self.name(), "mkdir failed", e))?;
        }

        // Write-then-rename keeps the previous document intact on a crash.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| CacheError::save_failed_with(self.name(), "write failed", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CacheError::save_failed_with(self.name(), "rename failed", e))?;

        Ok(())
    }
}

// =============================================================================
// Memory Store (for testing)
// =============================================================================

/// In-memory cache store for tests.
///
/// Failure injection mirrors the production failure modes: `fail_loads`
/// exercises the empty-cache fallback, `fail_saves` exercises the
/// log-and-ignore path.
#[derive(Debug, Default)]
pub struct MemoryStore<V> {
    contents: parking_lot::Mutex<Option<HashMap<String, CacheEntry<V>>>>,

    /// When set, `load` returns an error.
    fail_loads: AtomicBool,

    /// When set, `save` returns an error.
    fail_saves: AtomicBool,

    /// Number of completed `load` calls.
    load_count: AtomicU64,

    /// Number of completed `save` calls.
    save_count: AtomicU64,
}

impl<V> MemoryStore<V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            contents: parking_lot::Mutex::new(None),
            fail_loads: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            load_count: AtomicU64::new(0),
            save_count: AtomicU64::new(0),
        }
    }

    /// Creates a store pre-seeded with entries.
    pub fn seeded(entries: HashMap<String, CacheEntry<V>>) -> Self {
        let store = Self::new();
        *store.contents.lock() = Some(entries);
        store
    }

    /// Sets whether loads fail.
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::Relaxed);
    }

    /// Sets whether saves fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }

    /// Returns the number of completed loads.
    pub fn load_count(&self) -> u64 {
        self.load_count.load(Ordering::Relaxed)
    }

    /// Returns the number of completed saves.
    pub fn save_count(&self) -> u64 {
        self.save_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<V> CacheStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + Debug,
{
    async fn load(&self) -> CacheResult<Option<HashMap<String, CacheEntry<V>>>> {
        if self.fail_loads.load(Ordering::Relaxed) {
            return Err(CacheError::load_failed("memory", "injected load failure"));
        }
        self.load_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.contents.lock().clone())
    }

    async fn save(&self, entries: &HashMap<String, CacheEntry<V>>) -> CacheResult<()> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(CacheError::save_failed("memory", "injected save failure"));
        }
        self.save_count.fetch_add(1, Ordering::Relaxed);
        *self.contents.lock() = Some(entries.clone());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> HashMap<String, CacheEntry<u32>> {
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), CacheEntry::new(1));
        entries.insert("b".to_string(), CacheEntry::new(2));
        entries
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<u32> = FileStore::new(dir.path().join("cache.json"));

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<u32> = FileStore::new(dir.path().join("cache.json"));

        let entries = sample_entries();
        store.save(&entries).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["a"].value, 1);
        assert_eq!(loaded["b"].value, 2);
    }

    #[tokio::test]
    async fn test_file_store_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<u32> = FileStore::new(dir.path().join("cache.json"));

        store.save(&sample_entries()).await.unwrap();

        let first = store.load().await.unwrap().unwrap();
        let second = store.load().await.unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_file_store_corrupted_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let store: FileStore<u32> = FileStore::new(&path);
        let err = store.load().await.unwrap_err();
        assert_eq!(err.error_type(), "corrupted");
    }

    #[tokio::test]
    async fn test_file_store_save_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<u32> = FileStore::new(dir.path().join("cache.json"));

        store.save(&sample_entries()).await.unwrap();

        let mut second = HashMap::new();
        second.insert("c".to_string(), CacheEntry::new(3));
        store.save(&second).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("c"));
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store: MemoryStore<u32> = MemoryStore::new();

        store.set_fail_loads(true);
        assert!(store.load().await.is_err());

        store.set_fail_loads(false);
        assert!(store.load().await.unwrap().is_none());

        store.set_fail_saves(true);
        assert!(store.save(&sample_entries()).await.is_err());
        assert_eq!(store.save_count(), 0);
    }
}
