//! Rm command - invalidate a cache entry

use crate::cache::ContentStore;
use crate::cli::args::RmArgs;
use crate::cli::commands::cache_root;
use crate::config::Config;
use crate::error::{PkgcacheError, PkgcacheResult};
use console::style;

/// Execute the rm command
pub async fn execute(args: RmArgs, config: &Config) -> PkgcacheResult<()> {
    let store = ContentStore::new(cache_root(&args.cache_dir, config));

    if !store.invalidate(&args.key).await? {
        return Err(PkgcacheError::User(format!("No cache entry for {}", args.key)));
    }

    println!("{} {}", style("Removed").green(), args.key);
    Ok(())
}
