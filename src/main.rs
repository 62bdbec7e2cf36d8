//! pkgcache - content-addressable prefetch cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use pkgcache::cli::{Cli, Commands};
use pkgcache::config::ConfigManager;
use pkgcache::error::PkgcacheResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> PkgcacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("pkgcache=warn"),
        1 => EnvFilter::new("pkgcache=info"),
        _ => EnvFilter::new("pkgcache=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }

    debug!("Loaded config from {}", config_manager.path().display());

    match cli.command {
        Commands::Prefetch(args) => pkgcache::cli::commands::prefetch(args, &config).await,
        Commands::Ls(args) => pkgcache::cli::commands::ls(args, &config).await,
        Commands::Rm(args) => pkgcache::cli::commands::rm(args, &config).await,
        Commands::Verify(args) => pkgcache::cli::commands::verify(args, &config).await,
        Commands::Config(args) => {
            pkgcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
