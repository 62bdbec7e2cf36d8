//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// pkgcache - content-addressable prefetch cache for package tarballs
///
/// Resolves package specifiers against a registry and keeps their tarballs
/// in a local store addressed by integrity digest.
#[derive(Parser, Debug)]
#[command(name = "pkgcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PKGCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve packages and make sure their tarballs are cached
    Prefetch(PrefetchArgs),

    /// List cache entries
    Ls(LsArgs),

    /// Remove a cache entry from the index
    Rm(RmArgs),

    /// Re-hash cached content and report corruption
    Verify(VerifyArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Cache root selection shared by cache commands
#[derive(Parser, Debug, Clone)]
pub struct CacheDirArgs {
    /// Cache root (overrides config)
    #[arg(long, env = "PKGCACHE_DIR")]
    pub cache: Option<PathBuf>,
}

/// Arguments for the prefetch command
#[derive(Parser, Debug)]
pub struct PrefetchArgs {
    /// Package specifiers (name, name@version, name@tag)
    #[arg(required = true)]
    pub specs: Vec<String>,

    /// Registry base URL (overrides config)
    #[arg(long)]
    pub registry: Option<String>,

    #[command(flatten)]
    pub cache_dir: CacheDirArgs,

    /// Do not use the cache; only echo the specifiers back
    #[arg(long, conflicts_with = "cache")]
    pub no_cache: bool,

    /// Integrity the tarball is expected to have
    #[arg(long)]
    pub digest: Option<String>,
}

/// Arguments for the ls command
#[derive(Parser, Debug)]
pub struct LsArgs {
    #[command(flatten)]
    pub cache_dir: CacheDirArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the rm command
#[derive(Parser, Debug)]
pub struct RmArgs {
    /// Entry key as shown by `ls`
    pub key: String,

    #[command(flatten)]
    pub cache_dir: CacheDirArgs,
}

/// Arguments for the verify command
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub cache_dir: CacheDirArgs,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., registry.url)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for the ls command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Keys only, one per line
    Plain,
}
