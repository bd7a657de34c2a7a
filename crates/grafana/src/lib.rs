//! Grafana page mods.
//!
//! This crate provides:
//! - `SidebarLinks`: separator, alert buttons with live badges, static links
//! - `DashboardEditWarning`: restricted-tag edit warning, parent-dashboard button
//! - `QueryCopyButtons`: copy buttons carrying the resolved query text
//! - `AlertListEditWarnings`: restyled edit links for restricted or derived rules
//! - `descriptors` / `register_all` to wire them into a `ModuleRouter`

pub mod alert_list;
pub mod dashboard;
pub mod query_copy;
pub mod selectors;
pub mod sidebar;
pub mod variables;
pub mod widgets;

use std::fmt;
use std::sync::Arc;

use pagemod_core::{Config, ConfigCell};
use pagemod_rules::{AlertingBackend, DashboardBackend, OfflineBackend};
use pagemod_runtime::{ModuleDescriptor, ModuleError, ModuleRouter, PageModule, RouterError};

pub use alert_list::AlertListEditWarnings;
pub use dashboard::DashboardEditWarning;
pub use query_copy::QueryCopyButtons;
pub use sidebar::SidebarLinks;

pub const DEFAULT_GRAFANA_HOST: &str = r"^grafana\.xip\.se$";

/// Kind tag for each Grafana page mod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrafanaModule {
    SidebarLinks,
    DashboardEditWarning,
    QueryCopyButtons,
    AlertListEditWarnings,
}

impl GrafanaModule {
    pub const ALL: [GrafanaModule; 4] = [
        Self::SidebarLinks,
        Self::DashboardEditWarning,
        Self::QueryCopyButtons,
        Self::AlertListEditWarnings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SidebarLinks => "SidebarLinks",
            Self::DashboardEditWarning => "DashboardEditWarning",
            Self::QueryCopyButtons => "QueryCopyButtons",
            Self::AlertListEditWarnings => "AlertListEditWarnings",
        }
    }

    /// Path regex the module activates on.
    pub fn path_pattern(&self) -> &'static str {
        match self {
            Self::SidebarLinks => r"^/.*$",
            Self::DashboardEditWarning => r"^/d/.*$",
            Self::QueryCopyButtons => r"^/d/.+$",
            Self::AlertListEditWarnings => r"^/alerting/list.*",
        }
    }
}

impl fmt::Display for GrafanaModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct GrafanaSettings {
    /// Host regex every Grafana module matches against.
    pub host_pattern: String,
}

impl Default for GrafanaSettings {
    fn default() -> Self {
        Self {
            host_pattern: DEFAULT_GRAFANA_HOST.to_string(),
        }
    }
}

impl GrafanaSettings {
    pub fn with_host_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.host_pattern = pattern.into();
        self
    }
}

/// Shared handles every Grafana module works with.
#[derive(Clone)]
pub struct GrafanaServices {
    pub config: ConfigCell,
    pub alerting: Arc<dyn AlertingBackend>,
    pub dashboards: Arc<dyn DashboardBackend>,
}

impl GrafanaServices {
    pub fn new(config: ConfigCell, alerting: Arc<dyn AlertingBackend>, dashboards: Arc<dyn DashboardBackend>) -> Self {
        Self {
            config,
            alerting,
            dashboards,
        }
    }

    /// No backend: badges stay empty and dashboards are never found.
    pub fn offline(config: ConfigCell) -> Self {
        Self::new(config, Arc::new(OfflineBackend), Arc::new(OfflineBackend))
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.current()
    }
}

/// Descriptors for every Grafana module, in registration order.
pub fn descriptors(
    settings: &GrafanaSettings,
    services: &GrafanaServices,
) -> Result<Vec<ModuleDescriptor<GrafanaModule>>, ModuleError> {
    GrafanaModule::ALL
        .iter()
        .map(|&kind| {
            let services = services.clone();
            ModuleDescriptor::new(kind, kind.name(), &settings.host_pattern, kind.path_pattern(), move || {
                instantiate(kind, services.clone())
            })
        })
        .collect()
}

fn instantiate(kind: GrafanaModule, services: GrafanaServices) -> Arc<dyn PageModule> {
    match kind {
        GrafanaModule::SidebarLinks => Arc::new(SidebarLinks::new(services)),
        GrafanaModule::DashboardEditWarning => Arc::new(DashboardEditWarning::new(services)),
        GrafanaModule::QueryCopyButtons => Arc::new(QueryCopyButtons::new()),
        GrafanaModule::AlertListEditWarnings => Arc::new(AlertListEditWarnings::new(services)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Register every Grafana module with `router`. Returns the kinds that
/// activated immediately.
pub fn register_all(
    router: &mut ModuleRouter<GrafanaModule>,
    settings: &GrafanaSettings,
    services: &GrafanaServices,
) -> Result<Vec<GrafanaModule>, RegistrationError> {
    let mut activated = Vec::new();
    for descriptor in descriptors(settings, services)? {
        let kind = descriptor.kind();
        if router.register(descriptor)? {
            activated.push(kind);
        }
    }
    Ok(activated)
}
