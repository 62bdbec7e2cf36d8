//! Tarball transport
//!
//! The cache core only needs "give me the bytes at this URL". The HTTP
//! implementation runs blocking `ureq` calls on tokio's blocking pool.

use crate::config::schema::RegistryConfig;
use crate::error::{PkgcacheError, PkgcacheResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Largest tarball accepted off the wire
const MAX_TARBALL_BYTES: u64 = 512 * 1024 * 1024;

/// Bytes plus the upstream freshness headers
#[derive(Debug, Clone, Default)]
pub struct FetchedTarball {
    pub data: Vec<u8>,
    pub cache_control: Option<String>,
    pub age: Option<u64>,
}

/// Fetches tarball bytes by URL
#[async_trait]
pub trait TarballFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> PkgcacheResult<FetchedTarball>;
}

/// Build the HTTP agent shared by registry and tarball requests
pub fn build_agent(config: &RegistryConfig) -> ureq::Agent {
    let agent_config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
        .build();
    agent_config.into()
}

/// Plain HTTP(S) tarball fetcher
pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            agent: build_agent(config),
            user_agent: config.user_agent.clone(),
        }
    }
}

#[async_trait]
impl TarballFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> PkgcacheResult<FetchedTarball> {
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let url = url.to_string();

        debug!("Fetching tarball {}", url);
        tokio::task::spawn_blocking(move || fetch_blocking(&agent, &url, &user_agent))
            .await
            .map_err(|e| PkgcacheError::Internal(format!("tarball fetch task failed: {}", e)))?
    }
}

fn fetch_blocking(agent: &ureq::Agent, url: &str, user_agent: &str) -> PkgcacheResult<FetchedTarball> {
    let mut response = agent
        .get(url)
        .header("user-agent", user_agent)
        .header("accept", "application/octet-stream")
        .call()
        .map_err(|e| PkgcacheError::transport(url, e.to_string()))?;

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let cache_control = header("cache-control");
    let age = header("age").and_then(|v| v.trim().parse().ok());

    let data = response
        .body_mut()
        .with_config()
        .limit(MAX_TARBALL_BYTES)
        .read_to_vec()
        .map_err(|e| PkgcacheError::transport(url, e.to_string()))?;

    debug!("Fetched {} bytes from {}", data.len(), url);
    Ok(FetchedTarball {
        data,
        cache_control,
        age,
    })
}
