//! Prefetch behaviour against in-memory registry and transport doubles

use async_trait::async_trait;
use pkgcache::registry::{Manifest, MetadataClient, ResolveOptions};
use pkgcache::transport::{FetchedTarball, TarballFetcher};
use pkgcache::{
    list_cache_entries, Algorithm, Integrity, PkgcacheError, PkgcacheResult, PrefetchOptions,
    Prefetcher,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const REGISTRY: &str = "https://mock.reg";
const SPEC: &str = "foo@1.0.0";
const TARBALL: &[u8] = b"\x1f\x8b mock tarball: package/package.json + package/index.js";

struct MockRegistry {
    manifest: Manifest,
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl MetadataClient for MockRegistry {
    async fn resolve(&self, _spec: &str, opts: &ResolveOptions) -> PkgcacheResult<Manifest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        if self.fail {
            return Err(PkgcacheError::registry(format!("{}/foo", opts.registry), "500"));
        }
        Ok(self.manifest.clone())
    }
}

struct MockTarballs {
    data: Vec<u8>,
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl TarballFetcher for MockTarballs {
    async fn fetch(&self, url: &str) -> PkgcacheResult<FetchedTarball> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(url, "https://foo.bar/x.tgz");
        if self.fail {
            return Err(PkgcacheError::transport(url, "503"));
        }
        Ok(FetchedTarball {
            data: self.data.clone(),
            cache_control: Some("immutable".to_string()),
            age: None,
        })
    }
}

struct Harness {
    registry: Arc<MockRegistry>,
    tarballs: Arc<MockTarballs>,
    prefetcher: Prefetcher,
    cache: TempDir,
}

impl Harness {
    fn new(manifest: Manifest) -> Self {
        Self::build(manifest, TARBALL.to_vec(), false)
    }

    fn build(manifest: Manifest, data: Vec<u8>, fail: bool) -> Self {
        Self::with_failures(manifest, data, fail, false)
    }

    fn with_failures(
        manifest: Manifest,
        data: Vec<u8>,
        registry_fails: bool,
        transport_fails: bool,
    ) -> Self {
        let registry = Arc::new(MockRegistry {
            manifest,
            fail: registry_fails,
            calls: AtomicUsize::new(0),
        });
        let tarballs = Arc::new(MockTarballs {
            data,
            fail: transport_fails,
            calls: AtomicUsize::new(0),
        });
        let prefetcher = Prefetcher::new(registry.clone(), tarballs.clone());
        Self {
            registry,
            tarballs,
            prefetcher,
            cache: TempDir::new().unwrap(),
        }
    }

    fn opts(&self) -> PrefetchOptions {
        PrefetchOptions::default()
            .with_registry(REGISTRY)
            .with_cache(self.cache.path())
    }

    fn registry_calls(&self) -> usize {
        self.registry.calls.load(Ordering::SeqCst)
    }

    fn tarball_calls(&self) -> usize {
        self.tarballs.calls.load(Ordering::SeqCst)
    }

    async fn entry_count(&self) -> usize {
        list_cache_entries(self.cache.path()).await.unwrap().len()
    }
}

fn sha1_of_tarball() -> Integrity {
    Integrity::from_bytes(TARBALL, &[Algorithm::Sha1])
}

/// Manifest as published, with the sha1 integrity of the tarball
fn base_manifest() -> Manifest {
    Manifest {
        name: "foo".to_string(),
        version: "1.0.0".to_string(),
        has_shrinkwrap: Some(false),
        integrity: Some(sha1_of_tarball()),
        resolved: "https://foo.bar/x.tgz".to_string(),
    }
}

fn manifest_without_integrity() -> Manifest {
    Manifest {
        integrity: None,
        ..base_manifest()
    }
}

#[tokio::test]
async fn prefetch_by_manifest_if_nothing_cached() {
    let h = Harness::new(base_manifest());

    let info = h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();

    assert_eq!(
        serde_json::to_value(&info).unwrap(),
        serde_json::json!({
            "spec": SPEC,
            "manifest": serde_json::to_value(base_manifest()).unwrap(),
            "integrity": null,
            "byDigest": false
        })
    );
    assert_eq!(h.registry_calls(), 1);
    assert_eq!(h.tarball_calls(), 1);
    assert_eq!(h.entry_count().await, 2);
}

#[tokio::test]
async fn skip_if_no_cache_is_provided() {
    let h = Harness::new(base_manifest());

    let info = h
        .prefetcher
        .prefetch(SPEC, &PrefetchOptions::default())
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&info).unwrap(),
        serde_json::json!({ "spec": SPEC })
    );
    assert!(info.manifest().is_none());
    assert_eq!(h.registry_calls(), 0);
    assert_eq!(h.tarball_calls(), 0);
    assert_eq!(std::fs::read_dir(h.cache.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn use_cache_content_if_found() {
    let h = Harness::new(base_manifest());

    h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();
    h.prefetcher.clear_memoized();
    let info = h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();

    assert_eq!(info.manifest(), Some(&base_manifest()));
    assert_eq!(info.integrity(), Some(&sha1_of_tarball()));
    assert!(!info.by_digest());
    assert_eq!(h.registry_calls(), 2);
    assert_eq!(h.tarball_calls(), 1);
    assert_eq!(h.entry_count().await, 2);
}

#[tokio::test]
async fn prefetch_by_manifest_if_digest_provided_but_nothing_cached() {
    let h = Harness::new(base_manifest());
    let opts = h
        .opts()
        .with_digest(Integrity::from_bytes(TARBALL, &[Algorithm::Sha512]));

    let info = h.prefetcher.prefetch(SPEC, &opts).await.unwrap();

    assert_eq!(info.manifest(), Some(&base_manifest()));
    assert!(info.integrity().is_none());
    assert!(!info.by_digest());
    assert_eq!(h.registry_calls(), 1);
    assert_eq!(h.tarball_calls(), 1);
    assert_eq!(h.entry_count().await, 2);
}

#[tokio::test]
async fn cache_hit_by_derived_key_without_manifest_integrity() {
    let h = Harness::new(manifest_without_integrity());

    h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();
    h.prefetcher.clear_memoized();
    let info = h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();

    assert_eq!(
        info.integrity(),
        Some(&Integrity::from_bytes(TARBALL, &[]))
    );
    assert!(!info.by_digest());
    assert_eq!(h.tarball_calls(), 1);
}

#[tokio::test]
async fn cache_hit_by_caller_digest() {
    let h = Harness::new(manifest_without_integrity());
    let digest = Integrity::from_bytes(TARBALL, &[Algorithm::Sha512]);

    h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();
    h.prefetcher.clear_memoized();
    let info = h
        .prefetcher
        .prefetch(SPEC, &h.opts().with_digest(digest.clone()))
        .await
        .unwrap();

    assert!(info.by_digest());
    assert_eq!(info.integrity(), Some(&digest));
    assert_eq!(h.tarball_calls(), 1);
}

#[tokio::test]
async fn caller_digest_ignored_when_manifest_has_integrity() {
    let h = Harness::new(base_manifest());
    let digest = Integrity::from_bytes(TARBALL, &[Algorithm::Sha512]);

    h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();
    h.prefetcher.clear_memoized();
    let info = h
        .prefetcher
        .prefetch(SPEC, &h.opts().with_digest(digest))
        .await
        .unwrap();

    assert!(!info.by_digest());
    assert_eq!(info.integrity(), Some(&sha1_of_tarball()));
}

#[tokio::test]
async fn memoized_result_is_reused_until_cleared() {
    let h = Harness::new(base_manifest());

    let first = h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();
    let second = h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();

    // Still the fetch-performed result, even though the store is now warm
    assert_eq!(first, second);
    assert!(second.integrity().is_none());
    assert_eq!(h.registry_calls(), 1);
    assert_eq!(h.tarball_calls(), 1);
}

#[tokio::test]
async fn concurrent_prefetches_collapse() {
    let h = Harness::new(base_manifest());
    let opts = h.opts();

    let (a, b) = tokio::join!(
        h.prefetcher.prefetch(SPEC, &opts),
        h.prefetcher.prefetch(SPEC, &opts)
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(h.registry_calls(), 1);
    assert_eq!(h.tarball_calls(), 1);
    assert_eq!(h.entry_count().await, 2);
}

#[tokio::test]
async fn concurrent_prefetches_across_tasks_collapse() {
    let h = Arc::new(Harness::new(base_manifest()));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.prefetcher.prefetch(SPEC, &h.opts()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.registry_calls(), 1);
    assert_eq!(h.tarball_calls(), 1);
}

#[tokio::test]
async fn integrity_mismatch_writes_nothing() {
    let h = Harness::build(base_manifest(), b"not the advertised bytes".to_vec(), false);

    let err = h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap_err();
    assert!(matches!(err.root(), PkgcacheError::IntegrityMismatch { .. }));
    assert_eq!(h.entry_count().await, 0);

    // Waiters on the same key see the same failure without another fetch
    let again = h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap_err();
    assert!(matches!(again.root(), PkgcacheError::IntegrityMismatch { .. }));
    assert_eq!(h.tarball_calls(), 1);
}

#[tokio::test]
async fn registry_failure_is_fatal() {
    let h = Harness::build(base_manifest(), TARBALL.to_vec(), true);

    let err = h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap_err();

    assert!(matches!(err.root(), PkgcacheError::Registry { .. }));
    assert!(err.is_retryable());
    assert_eq!(h.tarball_calls(), 0);
    assert_eq!(h.entry_count().await, 0);
}

#[tokio::test]
async fn transport_failure_is_shared_by_concurrent_callers() {
    let h = Harness::with_failures(base_manifest(), TARBALL.to_vec(), false, true);
    let opts = h.opts();

    let (a, b) = tokio::join!(
        h.prefetcher.prefetch(SPEC, &opts),
        h.prefetcher.prefetch(SPEC, &opts)
    );
    let (a, b) = (a.unwrap_err(), b.unwrap_err());

    assert!(matches!(a, PkgcacheError::Transport { .. }));
    assert!(matches!(b, PkgcacheError::Transport { .. }));
    assert_eq!(a.to_string(), b.to_string());
    assert!(a.is_retryable());
    assert_eq!(h.registry_calls(), 1);
    assert_eq!(h.tarball_calls(), 1);
    assert_eq!(h.entry_count().await, 0);
}

#[tokio::test]
async fn transport_failure_is_retried_after_clear() {
    let h = Harness::with_failures(base_manifest(), TARBALL.to_vec(), false, true);

    h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap_err();
    h.prefetcher.clear_memoized();
    h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap_err();

    assert_eq!(h.tarball_calls(), 2);
    assert_eq!(h.entry_count().await, 0);
}

#[tokio::test]
async fn clear_memoized_keeps_store_entries() {
    let h = Harness::new(base_manifest());

    h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();
    h.prefetcher.clear_memoized();

    assert_eq!(h.entry_count().await, 2);
}

#[tokio::test]
async fn cache_roots_do_not_share_memo_entries() {
    let h = Harness::new(base_manifest());
    let other = TempDir::new().unwrap();

    h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();
    let info = h
        .prefetcher
        .prefetch(SPEC, &h.opts().with_cache(other.path()))
        .await
        .unwrap();

    assert!(info.integrity().is_none());
    assert_eq!(h.registry_calls(), 2);
    assert_eq!(h.tarball_calls(), 2);
}

#[tokio::test]
async fn tarball_entry_records_freshness_metadata() {
    let h = Harness::new(base_manifest());

    h.prefetcher.prefetch(SPEC, &h.opts()).await.unwrap();
    let entries = list_cache_entries(h.cache.path()).await.unwrap();

    let tarball = entries
        .values()
        .find(|e| e.metadata.url.is_some())
        .unwrap();
    assert_eq!(tarball.metadata.url.as_deref(), Some("https://foo.bar/x.tgz"));
    assert_eq!(tarball.metadata.cache_control.as_deref(), Some("immutable"));
    assert_eq!(tarball.size, TARBALL.len() as u64);
    assert!(tarball.integrity.matches(&sha1_of_tarball()));
}
