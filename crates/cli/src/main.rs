mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let log = pagemod_core::logging::init_tracing(args.log_level);

    match args.command {
        Command::Check { config, strict } => {
            let config = commands::check(&config, strict)?;
            if let Some(level) = config.log_level {
                log.set_level(level);
            }
            println!("config ok");
        }
        Command::Route {
            url,
            config,
            host_pattern,
        } => {
            let active = commands::route(&url, config.as_deref(), &host_pattern).await?;
            if active.is_empty() {
                println!("no page mods match {url}");
            }
            for kind in active {
                println!("{kind}\t{}", kind.path_pattern());
            }
        }
        Command::Rules {
            base_url,
            config,
            token,
            json,
        } => {
            let rows = commands::rules(&base_url, &config, token.as_deref()).await?;
            commands::print_counts(&rows, json)?;
        }
    }

    Ok(())
}
