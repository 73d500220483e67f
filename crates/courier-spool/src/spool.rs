// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The spool / disk quota manager.
//!
//! One directory, one file per pending payload, named by a generated UUID
//! that becomes the delivery item's identity end-to-end. The quota gate
//! every delivery attempt passes before writing a new item performs a
//! **full reset** on corruption or quota breach: whatever telemetry was
//! queued is sacrificed so the spool can never grow unbounded or wedge the
//! agent.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use courier_core::error::{SpoolError, SpoolResult};

use crate::quota::SpoolConfig;
use crate::stats::SpoolStatistics;

/// File extension for spooled payloads.
const PAYLOAD_EXTENSION: &str = "payload";

// =============================================================================
// Item Handle
// =============================================================================

/// Handle to one spooled item.
///
/// The UUID is the item's identity for the whole delivery pipeline; the
/// path locates its payload file inside the spool directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemHandle {
    id: Uuid,
    path: PathBuf,
}

impl ItemHandle {
    /// Returns the item id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the payload file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// =============================================================================
// Spool
// =============================================================================

struct SpoolInner {
    config: SpoolConfig,

    /// Serializes writes, deletes, and resets. A reset is "stop the world"
    /// for the directory; holding this across every mutation is the
    /// simplest way to guarantee it never interleaves with a write.
    mutate: Mutex<()>,

    /// Single-flight guard for the statistics walk.
    refresh: Mutex<()>,

    /// Last computed statistics snapshot.
    stats: parking_lot::RwLock<SpoolStatistics>,

    /// When the last walk completed.
    last_walk: parking_lot::Mutex<Option<Instant>>,

    /// Whether a debounced refresh is already queued.
    refresh_queued: AtomicBool,
}

/// The on-disk payload spool.
///
/// Cheap to clone; clones share the directory, statistics, and
/// serialization points.
#[derive(Clone)]
pub struct Spool {
    inner: Arc<SpoolInner>,
}

impl std::fmt::Debug for Spool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spool")
            .field("directory", &self.inner.config.directory)
            .field("statistics", &self.statistics())
            .finish()
    }
}

impl Spool {
    /// Opens the spool, creating its directory if needed.
    pub fn open(config: SpoolConfig) -> SpoolResult<Self> {
        std::fs::create_dir_all(&config.directory)
            .map_err(|e| SpoolError::write_failed_io("failed to create spool directory", e))?;

        Ok(Self {
            inner: Arc::new(SpoolInner {
                config,
                mutate: Mutex::new(()),
                refresh: Mutex::new(()),
                stats: parking_lot::RwLock::new(SpoolStatistics::invalid()),
                last_walk: parking_lot::Mutex::new(None),
                refresh_queued: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the spool configuration.
    pub fn config(&self) -> &SpoolConfig {
        &self.inner.config
    }

    /// Returns the spool directory.
    pub fn directory(&self) -> &Path {
        &self.inner.config.directory
    }

    // -------------------------------------------------------------------------
    // Item operations
    // -------------------------------------------------------------------------

    /// Writes an opaque payload blob as a new spool item.
    ///
    /// Runs the integrity/quota gate first. If the gate fails, the spool has
    /// already been fully reset and the write proceeds into the empty
    /// directory, so an oversize spool costs the queued backlog, never the
    /// new item.
    pub async fn write(&self, bytes: &[u8]) -> SpoolResult<ItemHandle> {
        let _guard = self.inner.mutate.lock().await;

        if !self.gate_locked().await {
            debug!(directory = %self.directory().display(), "Writing into freshly reset spool");
        }

        let id = Uuid::new_v4();
        let path = self.payload_path(id);

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| SpoolError::write_failed_io("failed to write payload", e))?;

        self.inner.stats.write().apply_write(bytes.len() as u64);

        debug!(id = %id, bytes = bytes.len(), "Spooled payload");
        Ok(ItemHandle { id, path })
    }

    /// Reads an item's payload back for submission.
    pub async fn read(&self, handle: &ItemHandle) -> SpoolResult<Vec<u8>> {
        tokio::fs::read(&handle.path)
            .await
            .map_err(|e| SpoolError::read_failed(handle.id.to_string(), e.to_string()))
    }

    /// Deletes an item. Deleting an already-absent item is not an error.
    pub async fn delete(&self, handle: &ItemHandle) -> SpoolResult<()> {
        let _guard = self.inner.mutate.lock().await;

        let size = tokio::fs::metadata(&handle.path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        match tokio::fs::remove_file(&handle.path).await {
            Ok(()) => {
                self.inner.stats.write().apply_delete(size);
                debug!(id = %handle.id, "Deleted spool item");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SpoolError::write_failed_io("failed to delete payload", e)),
        }
    }

    /// Returns `true` if the item's payload file still exists.
    pub async fn file_exists(&self, handle: &ItemHandle) -> bool {
        tokio::fs::try_exists(&handle.path).await.unwrap_or(false)
    }

    /// Reconstructs the handle for a known item id.
    ///
    /// Used when only the id survived a process restart; existence is not
    /// checked here.
    pub fn handle_for(&self, id: Uuid) -> ItemHandle {
        ItemHandle {
            id,
            path: self.payload_path(id),
        }
    }

    /// Lists the payload items currently on disk, for orphan recovery.
    pub async fn scan(&self) -> SpoolResult<Vec<ItemHandle>> {
        let mut handles = Vec::new();
        let mut entries = tokio::fs::read_dir(self.directory())
            .await
            .map_err(|e| SpoolError::statistics_failed(e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SpoolError::statistics_failed(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PAYLOAD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Foreign files in the directory are left alone.
            if let Ok(id) = Uuid::parse_str(stem) {
                handles.push(ItemHandle { id, path });
            }
        }

        Ok(handles)
    }

    fn payload_path(&self, id: Uuid) -> PathBuf {
        self.inner
            .config
            .directory
            .join(format!("{id}.{PAYLOAD_EXTENSION}"))
    }

    // -------------------------------------------------------------------------
    // Quota gate and reset
    // -------------------------------------------------------------------------

    /// The gate every delivery attempt passes before writing a new item.
    ///
    /// Returns false when the statistics walk fails (treated as corruption)
    /// or occupancy exceeds quota; in both cases the entire spool directory
    /// has been reset by the time this returns.
    pub async fn check_integrity_and_quota(&self) -> bool {
        let _guard = self.inner.mutate.lock().await;
        self.gate_locked().await
    }

    async fn gate_locked(&self) -> bool {
        match Self::walk(&self.inner).await {
            Ok(stats) if !stats.quota_exceeded => true,
            Ok(stats) => {
                warn!(
                    occupied = stats.occupied_bytes,
                    quota = stats.quota_bytes,
                    "Spool quota exceeded, performing full reset"
                );
                self.reset_locked().await;
                false
            }
            Err(e) => {
                error!(error = %e, "Spool statistics failed, performing full reset");
                self.reset_locked().await;
                false
            }
        }
    }

    /// Deletes the entire spool directory and recreates it empty.
    pub async fn reset_all(&self) {
        let _guard = self.inner.mutate.lock().await;
        self.reset_locked().await;
    }

    async fn reset_locked(&self) {
        let dir = self.inner.config.directory.clone();

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                error!(error = %e, directory = %dir.display(), "Spool reset failed");
            }
        }
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            error!(error = %e, directory = %dir.display(), "Spool directory recreation failed");
            *self.inner.stats.write() = SpoolStatistics::invalid();
            return;
        }

        let free = fs2::available_space(&dir).unwrap_or(0);
        let quota = self.inner.config.quota_bytes(free);
        *self.inner.stats.write() = SpoolStatistics::empty(free, quota);
        *self.inner.last_walk.lock() = Some(Instant::now());

        info!(directory = %dir.display(), "Spool reset complete");
    }

    // -------------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------------

    /// Returns the last cached statistics snapshot.
    pub fn statistics(&self) -> SpoolStatistics {
        self.inner.stats.read().clone()
    }

    /// Recomputes statistics now and returns the fresh snapshot.
    ///
    /// Concurrent callers share one walk via the single-flight guard.
    pub async fn refresh_statistics(&self) -> SpoolResult<SpoolStatistics> {
        Self::walk(&self.inner).await
    }

    /// Requests a background refresh, debounced.
    ///
    /// A request made while one is already queued is a no-op; the queued
    /// walk fires no sooner than the debounce window after the previous one
    /// completed.
    pub fn request_refresh(&self) {
        if self.inner.refresh_queued.swap(true, Ordering::AcqRel) {
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let wait = Self::cooldown_remaining(&inner);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            if let Err(e) = Self::walk(&inner).await {
                debug!(error = %e, "Background statistics refresh failed");
            }
            inner.refresh_queued.store(false, Ordering::Release);
        });
    }

    fn cooldown_remaining(inner: &SpoolInner) -> Duration {
        let last = *inner.last_walk.lock();
        match last {
            Some(at) => inner.config.refresh_debounce.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Walks the directory off the caller's path and updates the cache.
    async fn walk(inner: &Arc<SpoolInner>) -> SpoolResult<SpoolStatistics> {
        let _flight = inner.refresh.lock().await;

        let dir = inner.config.directory.clone();
        let walked = tokio::task::spawn_blocking(move || -> std::io::Result<(u64, u64)> {
            let mut occupied = 0u64;
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let metadata = entry.metadata()?;
                if metadata.is_file() {
                    occupied += metadata.len();
                }
            }
            let free = fs2::available_space(&dir)?;
            Ok((occupied, free))
        })
        .await;

        let result = match walked {
            Ok(Ok((occupied, free))) => {
                let quota = inner.config.quota_bytes(free);
                Ok(SpoolStatistics::from_walk(occupied, free, quota))
            }
            Ok(Err(e)) => Err(SpoolError::statistics_failed(e.to_string())),
            Err(e) => Err(SpoolError::statistics_failed(format!("walk task failed: {e}"))),
        };

        match &result {
            Ok(stats) => {
                *inner.stats.write() = stats.clone();
            }
            Err(_) => {
                *inner.stats.write() = SpoolStatistics::invalid();
            }
        }
        *inner.last_walk.lock() = Some(Instant::now());

        result
    }
}

// =============================================================================
// Tests
// =============================================================================
