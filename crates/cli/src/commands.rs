//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use pagemod_core::{Config, ConfigCell, ConfigError, Location};
use pagemod_grafana::{register_all, GrafanaModule, GrafanaServices, GrafanaSettings};
use pagemod_rules::{filter_response, tally, AlertCounts, AlertingBackend, GrafanaClient};
use pagemod_runtime::{MemoryDocument, ModuleRouter, RuntimeSettings};

/// Parse and validate a config. Parse failures are errors; validation
/// problems are warnings unless `strict` is set.
pub fn check(path: &Path, strict: bool) -> Result<Config> {
    let config = Config::from_file(path).with_context(|| format!("failed to load {}", path.display()))?;
    config.log_summary();

    let problems = config.validate();
    for problem in &problems {
        warn!("{problem}");
    }
    if strict && !problems.is_empty() {
        return Err(ConfigError::Invalid(format!("{} problem(s) in {}", problems.len(), path.display())).into());
    }
    Ok(config)
}

/// Register every Grafana module against an empty document at `url` and
/// report which ones activate.
pub async fn route(url: &str, config: Option<&Path>, host_pattern: &str) -> Result<Vec<GrafanaModule>> {
    Location::parse(url).with_context(|| format!("not a page URL: {url}"))?;

    let cell = ConfigCell::new();
    match config {
        Some(path) => {
            cell.load_into(path)
                .await
                .with_context(|| format!("failed to load {}", path.display()))?;
        }
        None => {
            cell.publish(Config::default());
        }
    }

    let settings = GrafanaSettings::default().with_host_pattern(host_pattern);
    let services = GrafanaServices::offline(cell);
    let document = Arc::new(MemoryDocument::new(url));
    let mut router = ModuleRouter::new(document, RuntimeSettings::default());

    let activated = register_all(&mut router, &settings, &services).context("failed to register modules")?;
    info!(url, active = activated.len(), "dry run complete");
    router.shutdown();
    Ok(activated)
}

#[derive(Debug, Serialize)]
pub struct ButtonCounts {
    pub name: String,
    pub label_filter: String,
    #[serde(flatten)]
    pub counts: AlertCounts,
}

/// Fetch the rules once and tally them for every alert button that applies
/// to the Grafana host.
pub async fn rules(base_url: &str, config: &Path, token: Option<&str>) -> Result<Vec<ButtonCounts>> {
    let config = Config::from_file(config).with_context(|| format!("failed to load {}", config.display()))?;
    let host = Location::parse(base_url)
        .with_context(|| format!("invalid Grafana URL: {base_url}"))?
        .host()
        .to_string();

    let mut client = GrafanaClient::new(base_url)?;
    if let Some(token) = token {
        client = client.with_token(token);
    }
    let response = client.fetch_rules().await.context("failed to fetch alert rules")?;

    Ok(button_counts(&config, &host, &response))
}

fn button_counts(config: &Config, host: &str, response: &pagemod_rules::schema::RulesResponse) -> Vec<ButtonCounts> {
    config
        .alert_buttons_for(host)
        .map(|button| ButtonCounts {
            name: button.name.clone(),
            label_filter: button.labels.to_label_filter(),
            counts: tally(filter_response(response, &button.labels)),
        })
        .collect()
}

pub fn print_counts(rows: &[ButtonCounts], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("no alert buttons apply to this host");
        return Ok(());
    }
    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(6);
    println!("{:<width$}  {:>6}  {:>7}  {:>4}", "BUTTON", "FIRING", "PENDING", "OK");
    for row in rows {
        println!(
            "{:<width$}  {:>6}  {:>7}  {:>4}",
            row.name, row.counts.firing, row.counts.pending, row.counts.ok
        );
    }
    Ok(())
}
