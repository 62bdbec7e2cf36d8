//! Error types for pkgcache
//!
//! All modules use `PkgcacheResult<T>` as their return type.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for pkgcache operations
pub type PkgcacheResult<T> = Result<T, PkgcacheError>;

/// All errors that can occur in pkgcache
#[derive(Error, Debug)]
pub enum PkgcacheError {
    // Integrity errors
    #[error("Malformed integrity string: {0:?}")]
    MalformedIntegrity(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // Registry errors
    #[error("Registry request to {url} failed: {reason}")]
    Registry { url: String, reason: String },

    #[error("Package not found in registry: {0}")]
    PackageNotFound(String),

    #[error("No version of {name} matches {selector:?}")]
    VersionNotFound { name: String, selector: String },

    #[error("Unsupported package specifier {spec:?}: {reason}")]
    UnsupportedSpec { spec: String, reason: String },

    #[error("Invalid manifest for {spec}: {reason}")]
    InvalidManifest { spec: String, reason: String },

    // Transport errors
    #[error("Tarball fetch from {url} failed: {reason}")]
    Transport { url: String, reason: String },

    // Cache errors
    #[error("Cache entry is corrupt: {key}: {reason}")]
    CacheCorrupt { key: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A failure replayed from a memoized prefetch shared by several callers
    #[error("{0}")]
    Memoized(Arc<PkgcacheError>),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl PkgcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a registry error
    pub fn registry(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Registry {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Turn an error shared between memo waiters back into an owned one
    ///
    /// Variants carrying only text are rebuilt as themselves. Those holding
    /// a non-cloneable source stay behind [`PkgcacheError::Memoized`].
    pub fn from_shared(shared: Arc<PkgcacheError>) -> Self {
        match &*shared {
            Self::MalformedIntegrity(s) => Self::MalformedIntegrity(s.clone()),
            Self::IntegrityMismatch { expected, actual } => Self::IntegrityMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::Registry { url, reason } => Self::registry(url.clone(), reason.clone()),
            Self::PackageNotFound(name) => Self::PackageNotFound(name.clone()),
            Self::VersionNotFound { name, selector } => Self::VersionNotFound {
                name: name.clone(),
                selector: selector.clone(),
            },
            Self::UnsupportedSpec { spec, reason } => Self::UnsupportedSpec {
                spec: spec.clone(),
                reason: reason.clone(),
            },
            Self::InvalidManifest { spec, reason } => Self::InvalidManifest {
                spec: spec.clone(),
                reason: reason.clone(),
            },
            Self::Transport { url, reason } => Self::transport(url.clone(), reason.clone()),
            Self::CacheCorrupt { key, reason } => Self::CacheCorrupt {
                key: key.clone(),
                reason: reason.clone(),
            },
            Self::ConfigInvalid { path, reason } => Self::ConfigInvalid {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::Internal(msg) => Self::Internal(msg.clone()),
            Self::User(msg) => Self::User(msg.clone()),
            Self::Memoized(inner) => Self::Memoized(Arc::clone(inner)),
            Self::ConfigDirCreate { .. }
            | Self::Io { .. }
            | Self::Json(_)
            | Self::TomlParse(_)
            | Self::TomlSerialize(_) => Self::Memoized(shared),
        }
    }

    /// The underlying error, looking through memoized wrappers
    pub fn root(&self) -> &PkgcacheError {
        match self {
            Self::Memoized(inner) => inner.root(),
            other => other,
        }
    }

    /// Check if error is retryable
    ///
    /// The cache never retries on its own; this is advice for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Self::Registry { .. } | Self::Transport { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::IntegrityMismatch { .. } => {
                Some("The registry served different bytes than it advertised; nothing was cached")
            }
            Self::CacheCorrupt { .. } => Some("Run: pkgcache verify, then pkgcache rm <key>"),
            Self::UnsupportedSpec { .. } => Some("Use an exact version or a dist-tag, e.g. foo@1.2.3"),
            Self::ConfigInvalid { .. } => Some("Fix or delete the config file, then run: pkgcache config init"),
            _ => None,
        }
    }
}
