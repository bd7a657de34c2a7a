//! Alert list page: warn before editing restricted rules and send edits of
//! derived rules to their template.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex};

use async_trait::async_trait;
use pagemod_rules::filter_response;
use pagemod_rules::schema::AlertRule;
use pagemod_runtime::{ElementId, HostDocument, ModuleContext, PageModule, ReconcileAction};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::selectors::ALERT_EDIT_LINK;
use crate::widgets::{self, Tooltip};
use crate::GrafanaServices;

pub const TEMPLATE_TOOLTIP: &str = "Ändra template";

static EDIT_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/alerting/([^/]+)/edit").expect("edit href regex"));

/// UID of the rule an edit link points at.
pub fn edit_link_uid(href: &str) -> Option<&str> {
    EDIT_HREF.captures(href).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Rules selected by the warning filter, with their template parents.
#[derive(Debug, Clone, Default)]
pub struct RestrictedRules {
    uids: HashSet<String>,
    parents: HashMap<String, String>,
}

impl RestrictedRules {
    pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a AlertRule>) -> Self {
        let mut restricted = Self::default();
        for rule in rules {
            if let Some(parent) = rule.parent_uid() {
                restricted.parents.insert(rule.uid.clone(), parent.to_string());
            }
            restricted.uids.insert(rule.uid.clone());
        }
        restricted
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.uids.contains(uid)
    }

    pub fn parent_of(&self, uid: &str) -> Option<&str> {
        self.parents.get(uid).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }
}

pub struct AlertListEditWarnings {
    services: GrafanaServices,
    rules: Mutex<Option<Arc<RestrictedRules>>>,
    tooltips: Mutex<HashMap<ElementId, Tooltip>>,
}

impl AlertListEditWarnings {
    pub fn new(services: GrafanaServices) -> Self {
        Self {
            services,
            rules: Mutex::new(None),
            tooltips: Mutex::new(HashMap::new()),
        }
    }

    pub fn restricted(&self) -> Option<Arc<RestrictedRules>> {
        self.rules.lock().expect("rules lock poisoned").clone()
    }

    /// Number of edit links currently carrying a tooltip.
    pub fn tracked_tooltips(&self) -> usize {
        self.tooltips.lock().expect("tooltips lock poisoned").len()
    }

    /// Drop tooltips whose edit link has left the document.
    fn prune_detached(&self, document: &dyn HostDocument) {
        let mut tooltips = self.tooltips.lock().expect("tooltips lock poisoned");
        tooltips.retain(|&link, tooltip| {
            let attached = document.contains(link);
            if !attached {
                tooltip.remove();
            }
            attached
        });
    }

    /// Restyle every edit link that points at a restricted rule.
    pub fn modify_edit_buttons(&self, document: &Arc<dyn HostDocument>) -> anyhow::Result<()> {
        self.prune_detached(&**document);
        let Some(rules) = self.restricted().filter(|r| !r.is_empty()) else {
            return Ok(());
        };
        let config = self.services.config();
        let warning = config
            .alert_edit_warnings
            .as_ref()
            .map(|w| w.warning_message().to_string())
            .unwrap_or_default();

        let mut tooltips = self.tooltips.lock().expect("tooltips lock poisoned");
        for link in document.query_all_str(ALERT_EDIT_LINK)? {
            let Some(href) = document.attribute(link, "href") else {
                continue;
            };
            let Some(uid) = edit_link_uid(&href) else {
                continue;
            };
            if !rules.contains(uid) {
                continue;
            }
            if widgets::is_marked(&**document, link) && tooltips.contains_key(&link) {
                continue;
            }

            let message = match rules.parent_of(uid) {
                Some(parent) => {
                    widgets::mark(&**document, link, "parent", "green")?;
                    document.set_attribute(link, "href", &format!("/alerting/grafana/{parent}"))?;
                    debug!(%uid, %parent, "edit link redirected to template");
                    TEMPLATE_TOOLTIP
                }
                None => {
                    widgets::mark(&**document, link, "warning", "red")?;
                    debug!(%uid, "edit link marked as restricted");
                    warning.as_str()
                }
            };
            let tooltip = Tooltip::attach(document.clone(), link, message)?;
            if let Some(previous) = tooltips.insert(link, tooltip) {
                previous.remove();
            }
        }
        Ok(())
    }

    async fn load_rules(&self) -> Option<Arc<RestrictedRules>> {
        let config = self.services.config.wait_loaded().await;
        let Some(warnings) = config.alert_edit_warnings.as_ref().filter(|w| w.enabled) else {
            debug!("alert edit warnings disabled");
            return None;
        };

        let response = match self.services.alerting.fetch_rules().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "failed to fetch alert rules, edit links left untouched");
                return None;
            }
        };
        let rules = Arc::new(RestrictedRules::from_rules(filter_response(&response, &warnings.labels)));
        info!(matching = rules.len(), derived = rules.parents.len(), "restricted alert rules loaded");
        *self.rules.lock().expect("rules lock poisoned") = Some(rules.clone());
        Some(rules)
    }
}

#[async_trait]
impl PageModule for AlertListEditWarnings {
    async fn execute(self: Arc<Self>, ctx: ModuleContext) -> anyhow::Result<()> {
        if self.load_rules().await.is_none() {
            return Ok(());
        }

        let document = ctx.document().clone();
        let module = self.clone();
        ctx.register_action(ReconcileAction::new(
            "modifyEditButtons",
            "Modify alert edit buttons",
            move || {
                let module = module.clone();
                let document = document.clone();
                async move { module.modify_edit_buttons(&document) }
            },
        ));
        ctx.start_reconciliation();
        Ok(())
    }

    fn cleanup(&self) -> anyhow::Result<()> {
        let mut tooltips = self.tooltips.lock().expect("tooltips lock poisoned");
        for (_, tooltip) in tooltips.drain() {
            tooltip.remove();
        }
        Ok(())
    }
}
