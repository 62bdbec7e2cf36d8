//! CLI command implementations

pub mod config;
pub mod ls;
pub mod prefetch;
pub mod rm;
pub mod verify;

pub use config::execute as config;
pub use ls::execute as ls;
pub use prefetch::execute as prefetch;
pub use rm::execute as rm;
pub use verify::execute as verify;

use crate::cli::args::CacheDirArgs;
use crate::config::Config;
use std::path::PathBuf;

/// Cache root from the flag, falling back to config
pub(crate) fn cache_root(args: &CacheDirArgs, config: &Config) -> PathBuf {
    args.cache
        .clone()
        .unwrap_or_else(|| config.cache.resolved_dir())
}
