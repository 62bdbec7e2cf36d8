//! Content-addressed package cache
//!
//! Tarballs and resolved manifests are stored under a cache root keyed by
//! their integrity digest, with an index mapping logical keys onto content.
//! Identical bytes always land on the same path, so entries are immutable
//! once written and concurrent writers cannot disagree.
//!
//! # Lookup paths
//!
//! | Key | Resolves via | Used when |
//! |-----|--------------|-----------|
//! | `Digest(integrity)` | content directory | manifest declares an integrity, or caller passes one |
//! | `Index(key)` | index record, then content | nothing better is known |

pub mod key;
pub mod memo;
pub mod store;

pub use key::CacheKey;
pub use memo::Memoizer;
pub use store::{CacheEntry, ContentStore, EntryMetadata, PutOptions, VerifyReport};

use crate::error::PkgcacheResult;
use std::collections::BTreeMap;
use std::path::Path;

/// List every entry stored under `cache_root`
pub async fn list_cache_entries(cache_root: &Path) -> PkgcacheResult<BTreeMap<String, CacheEntry>> {
    ContentStore::new(cache_root).list().await
}
