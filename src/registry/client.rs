//! HTTP registry client

use crate::config::schema::RegistryConfig;
use crate::error::{PkgcacheError, PkgcacheResult};
use crate::registry::manifest::{Manifest, Packument};
use crate::registry::spec::PackageSpec;
use crate::registry::{MetadataClient, ResolveOptions};
use crate::transport::build_agent;
use async_trait::async_trait;
use tracing::debug;

/// Resolves specifiers against an npm-style registry
pub struct RegistryClient {
    agent: ureq::Agent,
    user_agent: String,
}

impl RegistryClient {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            agent: build_agent(config),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Packument URL for a package
    pub fn packument_url(registry: &str, spec: &PackageSpec) -> String {
        format!("{}/{}", registry.trim_end_matches('/'), spec.escaped_name())
    }
}

#[async_trait]
impl MetadataClient for RegistryClient {
    async fn resolve(&self, spec: &str, opts: &ResolveOptions) -> PkgcacheResult<Manifest> {
        let parsed = PackageSpec::parse(spec)?;
        let url = Self::packument_url(&opts.registry, &parsed);
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();

        debug!("Resolving {} via {}", spec, url);
        let body = {
            let url = url.clone();
            let name = parsed.name.clone();
            tokio::task::spawn_blocking(move || fetch_packument(&agent, &url, &user_agent, &name))
                .await
                .map_err(|e| {
                    PkgcacheError::Internal(format!("registry request task failed: {}", e))
                })??
        };

        let packument: Packument = serde_json::from_str(&body)
            .map_err(|e| PkgcacheError::registry(&url, format!("malformed packument: {}", e)))?;

        packument.pick(&parsed)
    }
}

fn fetch_packument(
    agent: &ureq::Agent,
    url: &str,
    user_agent: &str,
    name: &str,
) -> PkgcacheResult<String> {
    let mut response = agent
        .get(url)
        .header("user-agent", user_agent)
        .header("accept", "application/json")
        .call()
        .map_err(|e| match e {
            ureq::Error::StatusCode(404) => PkgcacheError::PackageNotFound(name.to_string()),
            other => PkgcacheError::registry(url, other.to_string()),
        })?;

    response
        .body_mut()
        .read_to_string()
        .map_err(|e| PkgcacheError::registry(url, e.to_string()))
}
