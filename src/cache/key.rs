//! Cache keys
//!
//! Entries are addressed either by a logical index key derived from the
//! registry and package identity, or directly by an integrity digest.

use crate::integrity::Integrity;
use std::fmt;

const KEY_PREFIX: &str = "pkgcache";

/// How to find an entry in the content store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Logical key recorded in the index
    Index(String),
    /// Raw content digest
    Digest(Integrity),
}

impl CacheKey {
    /// Key for the resolved manifest view of `spec`
    pub fn manifest(registry: &str, spec: &str) -> Self {
        Self::Index(format!(
            "{}:manifest:{}:{}",
            KEY_PREFIX,
            normalize_registry(registry),
            spec
        ))
    }

    /// Key for the tarball of `name@version`
    pub fn tarball(registry: &str, name: &str, version: &str) -> Self {
        Self::Index(format!(
            "{}:tarball:{}:{}@{}",
            KEY_PREFIX,
            normalize_registry(registry),
            name,
            version
        ))
    }

    /// Index key, if this is a logical key
    pub fn as_index(&self) -> Option<&str> {
        match self {
            Self::Index(key) => Some(key),
            Self::Digest(_) => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(key) => f.write_str(key),
            Self::Digest(integrity) => write!(f, "{}", integrity),
        }
    }
}

/// Strip trailing slashes so `https://reg/` and `https://reg` share keys
pub fn normalize_registry(registry: &str) -> &str {
    registry.trim_end_matches('/')
}
