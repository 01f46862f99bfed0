pub mod config;

use std::path::Path;

use clap::{Parser, Subcommand};

use rb_domain::config::Config;

/// Default config path when neither `--config` nor `RB_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "relaybot.toml";

/// relaybot: relays Telegram chats to a coding agent, one session per chat.
#[derive(Debug, Parser)]
#[command(name = "relaybot", version, about)]
pub struct Cli {
    /// Path to the config file (overrides `RB_CONFIG`).
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start relaying (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `path_override`, else `RB_CONFIG`, else
/// [`DEFAULT_CONFIG_PATH`].  A missing file yields the defaults.  Returns
/// the parsed [`Config`] and the path that was used.
pub fn load_config(path_override: Option<&str>) -> anyhow::Result<(Config, String)> {
    let config_path = match path_override {
        Some(p) => p.to_owned(),
        None => std::env::var("RB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into()),
    };

    let config = if Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}
