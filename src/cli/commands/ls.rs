//! Ls command - list cache entries

use crate::cache::{list_cache_entries, CacheEntry};
use crate::cli::args::{LsArgs, OutputFormat};
use crate::cli::commands::cache_root;
use crate::config::Config;
use crate::error::PkgcacheResult;
use std::collections::BTreeMap;

/// Format bytes as human-readable size (e.g., "1.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, config: &Config) -> PkgcacheResult<()> {
    let root = cache_root(&args.cache_dir, config);
    let entries = list_cache_entries(&root).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for key in entries.keys() {
                println!("{}", key);
            }
        }
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("No cache entries in {}", root.display());
            } else {
                print_table(&entries);
            }
        }
    }

    Ok(())
}

fn print_table(entries: &BTreeMap<String, CacheEntry>) {
    println!("{:<60} {:>10} {:<20}", "KEY", "SIZE", "STORED");
    println!("{}", "-".repeat(92));

    for (key, entry) in entries {
        println!(
            "{:<60} {:>10} {:<20}",
            key,
            format_bytes(entry.size),
            entry.time.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("Total: {} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
}
