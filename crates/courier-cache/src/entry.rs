// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Cache entry wrapper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Cache Entry
// =============================================================================

/// One cached value together with its last-write timestamp.
///
/// `updated_at` is refreshed on every write and drives both eviction
/// policies: age purging compares it against the cache lifetime, and
/// capacity purging removes the oldest entries first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,

    /// When the value was last written.
    pub updated_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Creates an entry stamped with the current time.
    pub fn new(value: V) -> Self {
        Self {
            value,
            updated_at: Utc::now(),
        }
    }

    /// Creates an entry with an explicit timestamp.
    pub fn with_timestamp(value: V, updated_at: DateTime<Utc>) -> Self {
        Self { value, updated_at }
    }

    /// Returns `true` if the entry is older than `lifetime` relative to `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, lifetime: chrono::Duration) -> bool {
        now - self.updated_at > lifetime
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_stamps_creation_time() {
        let before = Utc::now();
        let entry = CacheEntry::new(7u32);
        let after = Utc::now();

        assert_eq!(entry.value, 7);
        assert!(entry.updated_at >= before && entry.updated_at <= after);
    }

    #[test]
    fn test_entry_expiry() {
        let now = Utc::now();
        let old = CacheEntry::with_timestamp(1u8, now - chrono::Duration::days(32));
        let fresh = CacheEntry::with_timestamp(2u8, now - chrono::Duration::days(1));
        let lifetime = chrono::Duration::days(31);

        assert!(old.is_expired(now, lifetime));
        assert!(!fresh.is_expired(now, lifetime));
    }

    #[test]
    fn test_entry_serde_roundtrip() {
        let entry = CacheEntry::new("value".to_string());
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: CacheEntry<String> = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, entry);
    }
}
