//! Configuration schema for pkgcache
//!
//! Configuration is stored at `~/.config/pkgcache/config.toml`

use crate::integrity::Algorithm;
use crate::prefetch::DEFAULT_REGISTRY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Registry and HTTP settings
    pub registry: RegistryConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry base URL
    pub url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY.to_string(),
            timeout_secs: 60,
            user_agent: format!("pkgcache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the content store at all
    pub enabled: bool,

    /// Cache root (defaults to the platform cache dir)
    pub dir: Option<PathBuf>,

    /// Extra algorithms to address tarballs by (sha512 is always used)
    pub algorithms: Vec<Algorithm>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            algorithms: Vec::new(),
        }
    }
}

impl CacheConfig {
    /// Effective cache root
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(Self::default_dir)
    }

    /// Platform default cache root
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pkgcache")
    }
}
