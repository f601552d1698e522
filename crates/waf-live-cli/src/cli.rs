//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use waf_live::{LiveConfig, TransportKind};

use crate::error::CliError;

/// Follow the WAF dashboard live feed from a terminal.
#[derive(Parser, Debug, Clone)]
#[command(name = "waf-live")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, env = "WAF_LIVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Feed endpoint, overriding the configuration.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// REST API base URL, overriding the configuration.
    #[arg(long)]
    pub api_url: Option<String>,

    /// Transport: auto, websocket or polling.
    #[arg(long)]
    pub transport: Option<TransportKind>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable lines.
    #[default]
    Table,
    /// JSON for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print every feed event until interrupted.
    Watch(WatchArgs),

    /// Print the dashboard view after following the feed briefly.
    Snapshot(SnapshotArgs),

    /// Write a sample configuration file.
    InitConfig {
        /// Destination path.
        #[arg(short, long, default_value = "waf-live.toml")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for `watch`.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Bearer credential.
    #[arg(short, long, env = "WAF_LIVE_TOKEN", hide_env_values = true)]
    pub token: String,
}

/// Arguments for `snapshot`.
#[derive(Args, Debug, Clone)]
pub struct SnapshotArgs {
    /// Bearer credential.
    #[arg(short, long, env = "WAF_LIVE_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Seconds to follow the live feed (0 skips the feed).
    #[arg(short, long, default_value_t = 5)]
    pub seconds: u64,

    /// Skip seeding from the REST API.
    #[arg(long)]
    pub no_seed: bool,

    /// Hours of traffic history to seed.
    #[arg(long, default_value_t = 24)]
    pub hours: u32,
}

impl Cli {
    /// Resolve the effective configuration.
    ///
    /// Precedence, lowest first: defaults, `--config` file, environment,
    /// command-line flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or the result is invalid.
    pub fn load_config(&self) -> Result<LiveConfig, CliError> {
        self.load_config_with(|key| std::env::var(key).ok())
    }

    /// [`load_config`](Self::load_config) with an explicit environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or the result is invalid.
    pub fn load_config_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<LiveConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => LiveConfig::from_file(path)?,
            None => LiveConfig::default(),
        };
        config.apply_env_from(lookup)?;

        if let Some(endpoint) = &self.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(api_url) = &self.api_url {
            config.api_url.clone_from(api_url);
        }
        if let Some(transport) = self.transport {
            config.transport = transport;
        }

        config.validate()?;
        Ok(config)
    }
}
