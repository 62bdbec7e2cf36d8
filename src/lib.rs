//! pkgcache - content-addressable prefetch cache
//!
//! Resolves package specifiers to version metadata and keeps their tarballs
//! in an on-disk store addressed by integrity digest. Repeated or concurrent
//! requests for the same package are collapsed in memory.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod integrity;
pub mod prefetch;
pub mod registry;
pub mod transport;

pub use cache::list_cache_entries;
pub use error::{PkgcacheError, PkgcacheResult};
pub use integrity::{Algorithm, Integrity};
pub use prefetch::{CacheSetting, PrefetchOptions, PrefetchResult, Prefetcher};
