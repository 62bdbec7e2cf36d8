//! Prefetch command - resolve and cache package tarballs

use crate::cli::args::PrefetchArgs;
use crate::cli::commands::cache_root;
use crate::config::Config;
use crate::error::PkgcacheResult;
use crate::integrity::Integrity;
use crate::prefetch::{CacheSetting, PrefetchOptions, Prefetcher};
use crate::registry::RegistryClient;
use crate::transport::HttpFetcher;
use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

/// Execute the prefetch command
pub async fn execute(args: PrefetchArgs, config: &Config) -> PkgcacheResult<()> {
    let opts = build_options(&args, config)?;

    let prefetcher = Prefetcher::new(
        Arc::new(RegistryClient::new(&config.registry)),
        Arc::new(HttpFetcher::new(&config.registry)),
    );

    debug!("Prefetching {} specifier(s)", args.specs.len());
    // Duplicate specifiers collapse onto one memoized fetch
    let results = try_join_all(args.specs.iter().map(|spec| prefetcher.prefetch(spec, &opts))).await?;

    let output = if results.len() == 1 {
        serde_json::to_string_pretty(&results[0])?
    } else {
        serde_json::to_string_pretty(&results)?
    };
    println!("{}", output);

    Ok(())
}

fn build_options(args: &PrefetchArgs, config: &Config) -> PkgcacheResult<PrefetchOptions> {
    let cache = if args.no_cache || !config.cache.enabled {
        CacheSetting::NoCacheConfigured
    } else {
        CacheSetting::CacheConfigured(cache_root(&args.cache_dir, config))
    };

    let digest = args.digest.as_deref().map(Integrity::parse).transpose()?;

    Ok(PrefetchOptions {
        registry: args
            .registry
            .clone()
            .unwrap_or_else(|| config.registry.url.clone()),
        cache,
        digest,
        algorithms: config.cache.algorithms.clone(),
    })
}
