//! Verify command - check cached content against its digests

use crate::cache::ContentStore;
use crate::cli::args::VerifyArgs;
use crate::cli::commands::cache_root;
use crate::config::Config;
use crate::error::{PkgcacheError, PkgcacheResult};
use console::style;

/// Execute the verify command
pub async fn execute(args: VerifyArgs, config: &Config) -> PkgcacheResult<()> {
    let store = ContentStore::new(cache_root(&args.cache_dir, config));
    let report = store.verify().await?;

    for key in &report.corrupt {
        println!("{} {}", style("corrupt").red(), key);
    }
    for key in &report.missing {
        println!("{} {}", style("missing").yellow(), key);
    }

    if report.is_clean() {
        println!(
            "{} {} entr{} verified",
            style("OK").green(),
            report.checked,
            if report.checked == 1 { "y" } else { "ies" }
        );
        Ok(())
    } else {
        Err(PkgcacheError::CacheCorrupt {
            key: store.root().display().to_string(),
            reason: format!(
                "{} corrupt, {} missing of {} entries",
                report.corrupt.len(),
                report.missing.len(),
                report.checked
            ),
        })
    }
}
