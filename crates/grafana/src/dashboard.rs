//! Dashboard page: restricted-tag edit warning and parent-dashboard button.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pagemod_core::Location;
use pagemod_rules::schema::DashboardDocument;
use pagemod_runtime::{HostDocument, ModuleContext, PageModule, ReconcileAction, Selector};
use tracing::{debug, info, warn};

use crate::selectors::{EDIT_DASHBOARD_BUTTON, PARENT_DASHBOARD_ATTR};
use crate::widgets::{self, Tooltip};
use crate::GrafanaServices;

pub const DEFAULT_PARENT_BUTTON_TEXT: &str = "Parent Dashboard";

pub struct DashboardEditWarning {
    services: GrafanaServices,
    uid: Mutex<Option<String>>,
    dashboard: Mutex<Option<Arc<DashboardDocument>>>,
    tooltip: Mutex<Option<Tooltip>>,
}

impl DashboardEditWarning {
    pub fn new(services: GrafanaServices) -> Self {
        Self {
            services,
            uid: Mutex::new(None),
            dashboard: Mutex::new(None),
            tooltip: Mutex::new(None),
        }
    }

    /// UID of the dashboard the module currently tracks.
    pub fn current_uid(&self) -> Option<String> {
        self.uid.lock().expect("uid lock poisoned").clone()
    }

    /// Follow in-app navigation between dashboards. A new UID drops the
    /// cached dashboard and the markup derived from it.
    pub fn sync_location(&self, document: &dyn HostDocument) -> anyhow::Result<()> {
        let href = document.location();
        let uid = match Location::parse(&href) {
            Ok(location) => location.path_segment(1).map(str::to_string),
            Err(e) => {
                debug!(%href, error = %e, "unparsable location, keeping dashboard state");
                return Ok(());
            }
        };
        {
            let mut current = self.uid.lock().expect("uid lock poisoned");
            if *current == uid {
                return Ok(());
            }
            info!(from = ?*current, to = ?uid, "dashboard changed");
            *current = uid;
        }

        *self.dashboard.lock().expect("dashboard lock poisoned") = None;
        if let Some(tooltip) = self.tooltip.lock().expect("tooltip lock poisoned").take() {
            tooltip.remove();
        }
        if let Some(edit_button) = document.query_str(EDIT_DASHBOARD_BUTTON)? {
            if widgets::is_marked(document, edit_button) {
                widgets::unmark(document, edit_button)?;
            }
        }
        for wrapper in document.query_all(&Selector::with_attribute(None, PARENT_DASHBOARD_ATTR, "true")) {
            document.remove(wrapper)?;
        }
        Ok(())
    }

    /// The dashboard for the current UID. Fetched once per UID; failures are
    /// not cached so the next pass retries.
    pub async fn dashboard(&self) -> Option<Arc<DashboardDocument>> {
        let cached = self.dashboard.lock().expect("dashboard lock poisoned").clone();
        if cached.is_some() {
            return cached;
        }
        let uid = self.uid.lock().expect("uid lock poisoned").clone()?;

        match self.services.dashboards.fetch_dashboard(&uid).await {
            Ok(Some(document)) => {
                debug!(%uid, tags = ?document.dashboard.tags, "dashboard fetched");
                let document = Arc::new(document);
                if self.current_uid().as_deref() != Some(uid.as_str()) {
                    debug!(%uid, "navigated away during fetch, result dropped");
                    return None;
                }
                *self.dashboard.lock().expect("dashboard lock poisoned") = Some(document.clone());
                Some(document)
            }
            Ok(None) => {
                warn!(%uid, "dashboard not found");
                None
            }
            Err(e) => {
                warn!(%uid, error = %e, "failed to fetch dashboard");
                None
            }
        }
    }

    /// Paint the edit button red with a tooltip when the dashboard carries a
    /// restricted tag.
    pub async fn modify_edit_button(&self, document: &Arc<dyn HostDocument>) -> anyhow::Result<()> {
        self.sync_location(&**document)?;
        let config = self.services.config();
        let Some(warnings) = config.dashboard_edit_warnings.as_ref().filter(|w| w.enabled) else {
            return Ok(());
        };
        let Some(edit_button) = document.query_str(EDIT_DASHBOARD_BUTTON)? else {
            return Ok(());
        };
        if widgets::is_marked(&**document, edit_button) {
            return Ok(());
        }
        let Some(dashboard) = self.dashboard().await else {
            return Ok(());
        };
        if !dashboard.has_any_tag(&warnings.tags) {
            return Ok(());
        }

        widgets::mark(&**document, edit_button, "warning", "red")?;
        let tooltip = Tooltip::attach(document.clone(), edit_button, warnings.warning_message())?;
        if let Some(previous) = self.tooltip.lock().expect("tooltip lock poisoned").replace(tooltip) {
            previous.remove();
        }
        info!(uid = %dashboard.dashboard.uid, "edit button marked as restricted");
        Ok(())
    }

    /// Insert a button linking to the `parentdashboard` variable's URL, in
    /// front of the edit button's container.
    pub async fn add_parent_dashboard_button(&self, document: &Arc<dyn HostDocument>) -> anyhow::Result<()> {
        self.sync_location(&**document)?;
        let Some(edit_button) = document.query_str(EDIT_DASHBOARD_BUTTON)? else {
            return Ok(());
        };
        if document
            .query(&Selector::with_attribute(None, PARENT_DASHBOARD_ATTR, "true"))
            .is_some()
        {
            return Ok(());
        }
        let Some(dashboard) = self.dashboard().await else {
            return Ok(());
        };
        let Some(url) = dashboard.parent_dashboard_url() else {
            debug!("no parentdashboard variable");
            return Ok(());
        };

        let config = self.services.config();
        let text = config
            .dashboard_edit_warnings
            .as_ref()
            .and_then(|w| w.parent_dashboard_button_text.as_deref())
            .unwrap_or(DEFAULT_PARENT_BUTTON_TEXT);

        let Some(container) = document.parent(edit_button).filter(|c| document.parent(*c).is_some()) else {
            warn!("edit button has no container to insert the parent dashboard button next to");
            return Ok(());
        };
        let button = document.create(&widgets::parent_dashboard_button(text, &url))?;
        document.insert_before(container, button)?;
        info!(%url, "parent dashboard button added");
        Ok(())
    }
}

#[async_trait]
impl PageModule for DashboardEditWarning {
    async fn execute(self: Arc<Self>, ctx: ModuleContext) -> anyhow::Result<()> {
        ctx.wait_for_element(EDIT_DASHBOARD_BUTTON).await?;
        *self.uid.lock().expect("uid lock poisoned") = ctx.location().path_segment(1).map(str::to_string);

        let document = ctx.document().clone();
        let module = self.clone();
        ctx.register_action(ReconcileAction::new("modifyEditButton", "Modify edit button", {
            let document = document.clone();
            move || {
                let module = module.clone();
                let document = document.clone();
                async move { module.modify_edit_button(&document).await }
            }
        }));
        let module = self.clone();
        ctx.register_action(ReconcileAction::new(
            "addParentDashboardButton",
            "Add parent dashboard button",
            move || {
                let module = module.clone();
                let document = document.clone();
                async move { module.add_parent_dashboard_button(&document).await }
            },
        ));
        ctx.start_reconciliation();
        Ok(())
    }

    fn cleanup(&self) -> anyhow::Result<()> {
        if let Some(tooltip) = self.tooltip.lock().expect("tooltip lock poisoned").take() {
            tooltip.remove();
        }
        Ok(())
    }
}
