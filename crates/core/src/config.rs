use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::labels::LabelPredicate;
use crate::logging::LogLevel;

/// Default badge refresh interval for alert buttons, in milliseconds.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30_000;

// ── Top-level config ──────────────────────────────────────────

/// Page-mod configuration (`config.yaml`).
///
/// Every field is optional. The default value is what consumers see before
/// the file has loaded, and it disables every configurable feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<LogLevel>,
    pub separator_text: Option<String>,
    pub alert_buttons: Vec<AlertButton>,
    pub static_links: Vec<StaticLink>,
    pub dashboard_edit_warnings: Option<DashboardEditWarnings>,
    pub alert_edit_warnings: Option<AlertEditWarnings>,
}

impl Config {
    /// Parse YAML text. An empty document yields the default config.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let has_content = text
            .lines()
            .map(str::trim)
            .any(|line| !line.is_empty() && !line.starts_with('#') && line != "---");
        if !has_content {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Alert buttons that are enabled and apply to `host`.
    pub fn alert_buttons_for<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a AlertButton> + 'a {
        self.alert_buttons
            .iter()
            .filter(move |b| b.enabled && applies_to_host(b.domain.as_deref(), host))
    }

    /// Static links that are enabled and apply to `host`.
    pub fn static_links_for<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a StaticLink> + 'a {
        self.static_links
            .iter()
            .filter(move |l| l.enabled && applies_to_host(l.domain.as_deref(), host))
    }

    /// Non-fatal problems worth reporting (duplicate names, odd domain filters).
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut seen = HashSet::new();
        for button in &self.alert_buttons {
            if button.name.trim().is_empty() {
                problems.push("alert button with empty name".to_string());
            } else if !seen.insert(button.name.as_str()) {
                problems.push(format!("duplicate alert button name '{}'", button.name));
            }
            if button.refresh_interval == Some(0) {
                problems.push(format!("alert button '{}' has refresh_interval 0", button.name));
            }
            check_domain(&mut problems, "alert button", &button.name, button.domain.as_deref());
        }

        let mut seen = HashSet::new();
        for link in &self.static_links {
            if link.name.trim().is_empty() {
                problems.push("static link with empty name".to_string());
            } else if !seen.insert(link.name.as_str()) {
                problems.push(format!("duplicate static link name '{}'", link.name));
            }
            if link.href.trim().is_empty() {
                problems.push(format!("static link '{}' has no href", link.name));
            }
            check_domain(&mut problems, "static link", &link.name, link.domain.as_deref());
        }

        if let Some(w) = &self.dashboard_edit_warnings {
            if w.enabled && w.tags.is_empty() {
                problems.push("dashboard_edit_warnings is enabled but lists no tags".to_string());
            }
        }
        if let Some(w) = &self.alert_edit_warnings {
            if w.enabled && w.labels.is_empty() {
                problems.push("alert_edit_warnings is enabled with an empty label filter".to_string());
            }
        }

        problems
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  log_level:      {}",
            self.log_level.map(|l| l.to_string()).unwrap_or_else(|| "(default)".to_string())
        );
        tracing::info!("  separator:      {}", self.separator_text.as_deref().unwrap_or("(none)"));
        tracing::info!(
            "  alert_buttons:  {} ({} enabled)",
            self.alert_buttons.len(),
            self.alert_buttons.iter().filter(|b| b.enabled).count()
        );
        tracing::info!(
            "  static_links:   {} ({} enabled)",
            self.static_links.len(),
            self.static_links.iter().filter(|l| l.enabled).count()
        );
        tracing::info!(
            "  dashboard edit warnings: {}",
            self.dashboard_edit_warnings.as_ref().is_some_and(|w| w.enabled)
        );
        tracing::info!(
            "  alert edit warnings:     {}",
            self.alert_edit_warnings.as_ref().is_some_and(|w| w.enabled)
        );
    }
}

fn check_domain(problems: &mut Vec<String>, what: &str, name: &str, domain: Option<&str>) {
    if let Some(domain) = domain {
        let inner = domain.strip_prefix("*.").unwrap_or(domain);
        if inner.is_empty() || inner.contains('*') {
            problems.push(format!(
                "{what} '{name}' has unsupported domain filter '{domain}' (use an exact host or *.suffix)"
            ));
        }
    }
}

/// Domain filter check: no filter applies everywhere, otherwise an exact
/// host or a `*.suffix` wildcard (which also matches the bare suffix).
pub fn applies_to_host(filter: Option<&str>, host: &str) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    if filter == host {
        return true;
    }
    match filter.strip_prefix("*.") {
        Some(suffix) => host == suffix || host.ends_with(&format!(".{suffix}")),
        None => false,
    }
}

// ── Sidebar entries ───────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertButton {
    pub name: String,
    pub enabled: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Badge refresh interval in milliseconds.
    pub refresh_interval: Option<u64>,
    pub icon: String,
    pub domain: Option<String>,
    pub labels: LabelPredicate,
}

impl AlertButton {
    pub fn refresh_interval_ms(&self) -> u64 {
        match self.refresh_interval {
            Some(ms) if ms > 0 => ms,
            _ => DEFAULT_REFRESH_INTERVAL_MS,
        }
    }

    /// Alert list URL pre-filtered by this button's labels.
    pub fn href(&self) -> String {
        format!("/alerting/list?labelFilter={}", self.labels.to_label_filter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticLink {
    pub name: String,
    pub enabled: bool,
    pub icon: String,
    pub domain: Option<String>,
    pub href: String,
}

// ── Edit warnings ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardEditWarnings {
    pub enabled: bool,
    pub tags: Vec<String>,
    pub warning_message: Option<String>,
    pub parent_dashboard_button_text: Option<String>,
}

impl DashboardEditWarnings {
    pub fn warning_message(&self) -> &str {
        self.warning_message
            .as_deref()
            .unwrap_or("Warning: This dashboard has restricted tags")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertEditWarnings {
    pub enabled: bool,
    pub warning_message: Option<String>,
    pub labels: LabelPredicate,
}

impl AlertEditWarnings {
    pub fn warning_message(&self) -> &str {
        self.warning_message
            .as_deref()
            .unwrap_or("Warning: This alert has restricted labels")
    }
}
