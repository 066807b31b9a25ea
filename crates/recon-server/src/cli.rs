//! Command-line interface for `recon-server`.
//!
//! ```bash
//! # Defaults (127.0.0.1:8787, config from the platform directory)
//! recon-server
//!
//! # Explicit config and bind address, JSON logs
//! recon-server --config ./recon.toml --bind 0.0.0.0:8080 --log-format json
//! ```

use clap::{Parser, ValueEnum};
use recon_core::config::{BIND_ENV, CONFIG_ENV};
use recon_core::{Config, Result};
use std::path::PathBuf;

/// Log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Main CLI structure for the `recon-server` command
#[derive(Parser, Clone, Debug)]
#[command(name = "recon-server")]
#[command(version)]
#[command(
    about = "Reconnaissance relay: fallback-aware proxy endpoints over public data sources",
    long_about = None
)]
pub struct Cli {
    /// Address to listen on (overrides `server.bind`)
    #[arg(long, value_name = "ADDR", env = BIND_ENV)]
    pub bind: Option<String>,

    /// Path to configuration file (overrides autodiscovery)
    #[arg(long, value_name = "FILE", env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Log per-attempt upstream detail
    #[arg(long)]
    pub debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Resolve configuration: explicit file or autodiscovery, then
    /// environment overrides, then `--bind`.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = Config::from_path(path)?;
                config.apply_env_overrides();
                config
            },
            None => Config::load()?,
        };
        if let Some(bind) = self.bind.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            config.server.bind = bind.to_string();
        }
        config.validate()?;
        Ok(config)
    }
}
