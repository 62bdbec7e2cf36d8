//! Registry metadata resolution
//!
//! Turns a package specifier into a validated [`Manifest`].

mod client;
pub mod manifest;
pub mod spec;

pub use client::RegistryClient;
pub use manifest::{Manifest, Packument};
pub use spec::{PackageSpec, Selector};

use crate::error::PkgcacheResult;
use async_trait::async_trait;

/// Options passed through to a metadata lookup
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Registry base URL
    pub registry: String,
}

/// Resolves a specifier to version metadata
#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn resolve(&self, spec: &str, opts: &ResolveOptions) -> PkgcacheResult<Manifest>;
}
