//! Prefetch orchestration
//!
//! Decides, per specifier, whether a package tarball is already known-good in
//! the content store or has to be fetched:
//!
//! ```text
//! Start ──no cache──▶ NoCache
//!   │
//!   ▼
//! Resolving ──hit──▶ CacheHit
//!   │ miss
//!   ▼
//! Fetching ─▶ Verifying ─▶ Stored
//! ```
//!
//! Every configured-cache request goes through the [`Memoizer`], so one
//! `(spec, registry, cache root)` triple is resolved and fetched at most once
//! per memo generation no matter how many callers race on it.

use crate::cache::{CacheEntry, CacheKey, ContentStore, EntryMetadata, Memoizer, PutOptions};
use crate::error::{PkgcacheError, PkgcacheResult};
use crate::integrity::{Algorithm, Integrity};
use crate::registry::{Manifest, MetadataClient, ResolveOptions};
use crate::transport::TarballFetcher;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry used when the caller names none
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Whether a call may touch the content store at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSetting {
    /// Skip everything and echo the spec back
    NoCacheConfigured,
    /// Use the store rooted here
    CacheConfigured(PathBuf),
}

/// Per-call options
#[derive(Debug, Clone)]
pub struct PrefetchOptions {
    pub registry: String,
    pub cache: CacheSetting,
    /// Digest the caller already expects the tarball to have
    pub digest: Option<Integrity>,
    /// Additional algorithms to address stored tarballs by
    pub algorithms: Vec<Algorithm>,
}

impl Default for PrefetchOptions {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            cache: CacheSetting::NoCacheConfigured,
            digest: None,
            algorithms: Vec::new(),
        }
    }
}

impl PrefetchOptions {
    pub fn with_cache(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache = CacheSetting::CacheConfigured(root.into());
        self
    }

    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into();
        self
    }

    pub fn with_digest(mut self, digest: Integrity) -> Self {
        self.digest = Some(digest);
        self
    }
}

/// Result of a prefetch
///
/// Serializes to `{"spec": ...}` when no cache was configured, otherwise to
/// `{"spec", "manifest", "integrity", "byDigest"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefetchResult {
    pub spec: String,
    #[serde(flatten)]
    pub resolved: Option<ResolvedPrefetch>,
}

/// The cache-configured part of a [`PrefetchResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPrefetch {
    pub manifest: Manifest,
    /// Set only when the tarball was already cached before this call
    pub integrity: Option<Integrity>,
    /// Set when the hit came from the caller's digest rather than the manifest
    #[serde(rename = "byDigest")]
    pub by_digest: bool,
}

impl PrefetchResult {
    fn spec_only(spec: &str) -> Self {
        Self {
            spec: spec.to_string(),
            resolved: None,
        }
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.resolved.as_ref().map(|r| &r.manifest)
    }

    pub fn integrity(&self) -> Option<&Integrity> {
        self.resolved.as_ref().and_then(|r| r.integrity.as_ref())
    }

    pub fn by_digest(&self) -> bool {
        self.resolved.as_ref().is_some_and(|r| r.by_digest)
    }
}

/// Memo key: the fully qualified request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefetchKey {
    spec: String,
    registry: String,
    cache_root: PathBuf,
}

/// Shared memo table type
pub type PrefetchMemo = Memoizer<PrefetchKey, PrefetchResult>;

/// Ties metadata resolution, the content store and the transport together
pub struct Prefetcher {
    metadata: Arc<dyn MetadataClient>,
    transport: Arc<dyn TarballFetcher>,
    memo: Arc<PrefetchMemo>,
}

impl Prefetcher {
    /// Create a prefetcher with its own memo table
    pub fn new(metadata: Arc<dyn MetadataClient>, transport: Arc<dyn TarballFetcher>) -> Self {
        Self::with_memo(metadata, transport, Arc::new(Memoizer::new()))
    }

    /// Create a prefetcher sharing `memo` with others
    pub fn with_memo(
        metadata: Arc<dyn MetadataClient>,
        transport: Arc<dyn TarballFetcher>,
        memo: Arc<PrefetchMemo>,
    ) -> Self {
        Self {
            metadata,
            transport,
            memo,
        }
    }

    /// Prefetch `spec`
    ///
    /// Without a configured cache this returns `{spec}` and calls nothing.
    /// Failures are memoized too. Every waiter gets the same error, rebuilt
    /// by [`PkgcacheError::from_shared`]; IO and parse failures stay behind
    /// [`PkgcacheError::Memoized`], so match on [`PkgcacheError::root`].
    pub async fn prefetch(
        &self,
        spec: &str,
        opts: &PrefetchOptions,
    ) -> PkgcacheResult<PrefetchResult> {
        let cache_root = match &opts.cache {
            CacheSetting::NoCacheConfigured => {
                debug!("No cache configured, skipping prefetch of {}", spec);
                return Ok(PrefetchResult::spec_only(spec));
            }
            CacheSetting::CacheConfigured(root) => root.clone(),
        };

        let key = PrefetchKey {
            spec: spec.to_string(),
            registry: opts.registry.trim_end_matches('/').to_string(),
            cache_root: cache_root.clone(),
        };

        let run = PrefetchRun {
            metadata: Arc::clone(&self.metadata),
            transport: Arc::clone(&self.transport),
            store: ContentStore::new(cache_root),
            spec: spec.to_string(),
            opts: opts.clone(),
        };

        self.memo
            .get_or_create(key, move || run.execute())
            .await
            .map_err(PkgcacheError::from_shared)
    }

    /// Forget memoized results; the content store is untouched
    pub fn clear_memoized(&self) {
        self.memo.clear();
    }
}

/// One un-memoized pass through the state machine
struct PrefetchRun {
    metadata: Arc<dyn MetadataClient>,
    transport: Arc<dyn TarballFetcher>,
    store: ContentStore,
    spec: String,
    opts: PrefetchOptions,
}

impl PrefetchRun {
    async fn execute(self) -> PkgcacheResult<PrefetchResult> {
        let resolve_opts = ResolveOptions {
            registry: self.opts.registry.clone(),
        };
        let manifest = self.metadata.resolve(&self.spec, &resolve_opts).await?;
        debug!(
            "Resolved {} to {}@{}",
            self.spec, manifest.name, manifest.version
        );

        if let Some((entry, by_digest)) = self.find_cached(&manifest).await? {
            info!(
                "Cache hit for {} ({})",
                self.spec,
                if by_digest { "by digest" } else { "by manifest" }
            );
            return Ok(self.finish(manifest, Some(entry.integrity), by_digest));
        }

        info!("Cache miss for {}, fetching {}", self.spec, manifest.resolved);
        let fetched = self.transport.fetch(&manifest.resolved).await?;

        let expected = manifest.integrity.clone().or_else(|| self.opts.digest.clone());
        let mut algorithms = self.opts.algorithms.clone();
        if let Some(digest) = &self.opts.digest {
            algorithms.extend(digest.algorithms());
        }

        let tarball_key = CacheKey::tarball(&self.opts.registry, &manifest.name, &manifest.version);
        self.store
            .put(
                &tarball_key.to_string(),
                &fetched.data,
                PutOptions {
                    integrity: expected,
                    algorithms,
                    metadata: EntryMetadata {
                        url: Some(manifest.resolved.clone()),
                        cache_control: fetched.cache_control,
                        age: fetched.age,
                        content_type: Some("application/octet-stream".to_string()),
                    },
                },
            )
            .await?;

        let manifest_key = CacheKey::manifest(&self.opts.registry, &self.spec);
        self.store
            .put(
                &manifest_key.to_string(),
                &serde_json::to_vec(&manifest)?,
                PutOptions {
                    metadata: EntryMetadata {
                        content_type: Some("application/json".to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await?;

        Ok(self.finish(manifest, None, false))
    }

    /// Look for the tarball in the store
    ///
    /// The caller's digest is only consulted when the manifest has no
    /// integrity of its own.
    async fn find_cached(&self, manifest: &Manifest) -> PkgcacheResult<Option<(CacheEntry, bool)>> {
        if manifest.integrity.is_none() {
            if let Some(digest) = &self.opts.digest {
                if let Some(entry) = self.store.lookup(&CacheKey::Digest(digest.clone())).await? {
                    return Ok(Some((entry, true)));
                }
            }
        }

        let key = match &manifest.integrity {
            Some(integrity) => CacheKey::Digest(integrity.clone()),
            None => CacheKey::tarball(&self.opts.registry, &manifest.name, &manifest.version),
        };
        Ok(self.store.lookup(&key).await?.map(|entry| (entry, false)))
    }

    fn finish(
        &self,
        manifest: Manifest,
        integrity: Option<Integrity>,
        by_digest: bool,
    ) -> PrefetchResult {
        PrefetchResult {
            spec: self.spec.clone(),
            resolved: Some(ResolvedPrefetch {
                manifest,
                integrity,
                by_digest,
            }),
        }
    }
}
