use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pagemod_core::LogLevel;
use pagemod_grafana::DEFAULT_GRAFANA_HOST;

/// Grafana page-mod tooling.
#[derive(Parser, Debug)]
#[command(name = "pagemod", about = "Check page-mod configs and dry-run module activation")]
pub struct CliArgs {
    /// Log level until a config overrides it (RUST_LOG always wins)
    #[arg(long, global = true, env = "PAGEMOD_LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a config file, report problems and print its summary
    Check {
        /// Path to config.yaml
        config: PathBuf,

        /// Fail when validation reports any problem
        #[arg(long)]
        strict: bool,
    },

    /// Show which page mods activate for a URL
    Route {
        /// Page URL, e.g. https://grafana.xip.se/d/abc/overview
        url: String,

        /// Config used by the activated modules
        #[arg(long, env = "PAGEMOD_CONFIG")]
        config: Option<PathBuf>,

        /// Host regex the Grafana modules match against
        #[arg(long, default_value = DEFAULT_GRAFANA_HOST)]
        host_pattern: String,
    },

    /// Fetch alert rules from Grafana and print counts per alert button
    Rules {
        /// Grafana base URL
        #[arg(long, env = "GRAFANA_URL")]
        base_url: String,

        /// Path to config.yaml
        #[arg(long, env = "PAGEMOD_CONFIG")]
        config: PathBuf,

        /// Service-account token
        #[arg(long, env = "GRAFANA_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}
