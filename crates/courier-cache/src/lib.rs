// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # courier-cache
//!
//! Generic, concurrency-safe keyed persistent cache for the Courier agent.
//!
//! A [`KeyedCache`] maps string keys to one value type, bounded by capacity
//! and entry age, with crash-safe restore from a pluggable backing store.
//! The same component backs several unrelated agent concerns: the session
//! registry, app-state event history, sent-event de-duplication, and
//! per-session sequence counters.
//!
//! # Design Principles
//!
//! - **Single serialization point**: every operation, reads included, goes
//!   through one async mutex, so callers always observe fully-applied state.
//! - **Lazy bounds**: capacity and age are target bounds, enforced during
//!   maintenance (`sync()`), not on every write.
//! - **Absorb failures**: a failed restore means "no prior data"; a failed
//!   save is logged and the in-memory state stays authoritative.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_cache::{CacheConfig, FileStore, KeyedCache};
//!
//! let store = FileStore::new("/var/lib/courier/sessions.json");
//! let cache: KeyedCache<String> = KeyedCache::open(
//!     CacheConfig::session_registry(),
//!     Arc::new(store),
//! );
//!
//! cache.restored().await;
//! cache.put("session-1", "active".to_string()).await;
//! cache.sync().await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod entry;
mod index;
mod keyed;
mod store;

pub use entry::CacheEntry;
pub use index::{OnceFlags, SequenceIndex};
pub use keyed::{CacheConfig, CacheConfigBuilder, KeyedCache};
pub use store::{CacheStore, FileStore, MemoryStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
