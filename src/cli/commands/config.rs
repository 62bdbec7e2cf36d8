//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{PkgcacheError, PkgcacheResult};
use crate::integrity::Algorithm;
use console::style;
use std::path::PathBuf;

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "registry.url",
    "registry.timeout_secs",
    "registry.user_agent",
    "cache.enabled",
    "cache.dir",
    "cache.algorithms",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> PkgcacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let mut updated = config.clone();
            set_value(&mut updated, &key, &value)?;
            manager.save(&updated).await?;
            println!("{} {} = {}", style("Set").green(), key, value);
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> PkgcacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> PkgcacheResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            style("!").yellow(),
            path.display()
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    println!(
        "{} Configuration initialized at {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}

/// Apply a dot-separated `key = value` to `config`
fn set_value(config: &mut Config, key: &str, value: &str) -> PkgcacheResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => {
                return Err(PkgcacheError::User(format!(
                    "Invalid log format: {}. Use text or json",
                    value
                )))
            }
        },

        ["registry", "url"] => config.registry.url = value.to_string(),
        ["registry", "timeout_secs"] => config.registry.timeout_secs = parse_u64(value)?,
        ["registry", "user_agent"] => config.registry.user_agent = value.to_string(),

        ["cache", "enabled"] => config.cache.enabled = parse_bool(value)?,
        ["cache", "dir"] => {
            config.cache.dir = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            }
        }
        ["cache", "algorithms"] => {
            config.cache.algorithms = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Algorithm>())
                .collect::<PkgcacheResult<Vec<_>>>()?;
        }

        _ => {
            return Err(PkgcacheError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

fn parse_bool(value: &str) -> PkgcacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(PkgcacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_u64(value: &str) -> PkgcacheResult<u64> {
    value
        .parse()
        .map_err(|_| PkgcacheError::User(format!("Invalid number: {}", value)))
}
