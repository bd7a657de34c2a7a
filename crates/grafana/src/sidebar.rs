//! Sidebar additions: separator, alert buttons with live badges, static links.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use pagemod_core::config::AlertButton;
use pagemod_rules::{fetch_alert_counts, AlertingBackend};
use pagemod_runtime::{DomError, ElementId, HostDocument, ModuleContext, PageModule, ReconcileAction, Selector};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::selectors::{ALERT_BADGE_ATTR, ALERT_BUTTON_ATTR, NAVIGATION_MENU, SEPARATOR_ATTR, STATIC_LINK_ATTR, TEXT_SPAN_ATTR};
use crate::widgets;
use crate::GrafanaServices;

struct TrackedButton {
    link: ElementId,
    refresh: JoinHandle<()>,
}

pub struct SidebarLinks {
    services: GrafanaServices,
    buttons: Mutex<HashMap<String, TrackedButton>>,
}

impl SidebarLinks {
    pub fn new(services: GrafanaServices) -> Self {
        Self {
            services,
            buttons: Mutex::new(HashMap::new()),
        }
    }

    /// Names of alert buttons with a running badge refresh, sorted.
    pub fn tracked_buttons(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .buttons
            .lock()
            .expect("buttons lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Bring the navigation list in line with the configuration.
    pub fn add_menu_links(&self, document: &Arc<dyn HostDocument>, host: &str) -> anyhow::Result<()> {
        let Some(nav) = document.query_str(NAVIGATION_MENU)? else {
            debug!("navigation menu not found, skipping");
            return Ok(());
        };
        let config = self.services.config();

        if let Some(title) = config.separator_text.as_deref().filter(|t| !t.is_empty()) {
            let existing = document.query_within(nav, &Selector::with_attribute(None, SEPARATOR_ATTR, "true"));
            if existing.is_empty() {
                let separator = document.create(&widgets::separator(title))?;
                document.append_child(nav, separator)?;
            }
        }

        for button in config.alert_buttons_for(host) {
            self.ensure_alert_button(document, nav, button)
                .with_context(|| format!("alert button '{}'", button.name))?;
        }

        for link in config.static_links_for(host) {
            let selector = Selector::with_attribute(Some("a"), STATIC_LINK_ATTR, &link.name);
            if document.query(&selector).is_some() {
                continue;
            }
            let entry = document.create(&widgets::menu_link(link))?;
            document.append_child(nav, entry)?;
            debug!(link = %link.name, "static link added");
        }
        Ok(())
    }

    fn ensure_alert_button(
        &self,
        document: &Arc<dyn HostDocument>,
        nav: ElementId,
        button: &AlertButton,
    ) -> Result<(), DomError> {
        let selector = Selector::with_attribute(Some("a"), ALERT_BUTTON_ATTR, &button.name);
        if document.query(&selector).is_some() {
            return Ok(());
        }

        let mut buttons = self.buttons.lock().expect("buttons lock poisoned");
        if let Some(stale) = buttons.remove(&button.name) {
            // Grafana re-rendered the menu and dropped our element.
            debug!(button = %button.name, link = %stale.link, "tracked alert button detached, recreating");
            stale.refresh.abort();
        }

        let entry = document.create(&widgets::alert_button(button))?;
        document.append_child(nav, entry)?;
        let link = document
            .query_within(entry, &selector)
            .into_iter()
            .next()
            .ok_or(DomError::NoSuchElement(entry))?;

        let refresh = spawn_badge_refresh(
            document.clone(),
            self.services.alerting.clone(),
            button.clone(),
            link,
        );
        buttons.insert(button.name.clone(), TrackedButton { link, refresh });
        info!(button = %button.name, "alert button added");
        Ok(())
    }
}

#[async_trait]
impl PageModule for SidebarLinks {
    async fn execute(self: Arc<Self>, ctx: ModuleContext) -> anyhow::Result<()> {
        ctx.wait_for_element(NAVIGATION_MENU).await?;

        let document = ctx.document().clone();
        let host = ctx.location().host().to_string();
        let module = self.clone();
        ctx.register_action(ReconcileAction::new("addMenuLinks", "Add menu links", move || {
            let module = module.clone();
            let document = document.clone();
            let host = host.clone();
            async move { module.add_menu_links(&document, &host) }
        }));
        ctx.start_reconciliation();
        Ok(())
    }

    fn cleanup(&self) -> anyhow::Result<()> {
        let mut buttons = self.buttons.lock().expect("buttons lock poisoned");
        for (name, tracked) in buttons.drain() {
            debug!(button = %name, "stopping badge refresh");
            tracked.refresh.abort();
        }
        Ok(())
    }
}

// ── Badges ───────────────────────────────────────────────────────────

/// Refresh `link`'s badges now and then every `refresh_interval`.
fn spawn_badge_refresh(
    document: Arc<dyn HostDocument>,
    alerting: Arc<dyn AlertingBackend>,
    button: AlertButton,
    link: ElementId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(button.refresh_interval_ms()));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !document.contains(link) {
                debug!(button = %button.name, "alert button detached, skipping badge refresh");
                continue;
            }
            let counts = fetch_alert_counts(&*alerting, &button.labels).await;
            debug!(
                button = %button.name,
                firing = counts.firing,
                pending = counts.pending,
                ok = counts.ok,
                "alert counts"
            );
            if let Err(e) = render_badges(&*document, link, &counts) {
                warn!(button = %button.name, error = %e, "failed to render badges");
            }
        }
    })
}

fn render_badges(document: &dyn HostDocument, link: ElementId, counts: &pagemod_rules::AlertCounts) -> Result<(), DomError> {
    for old in document.query_within(link, &Selector::with_attribute(None, ALERT_BADGE_ATTR, "true")) {
        document.remove(old)?;
    }
    let Some(spec) = widgets::badges(counts) else {
        return Ok(());
    };
    let Some(text_span) = document
        .query_within(link, &Selector::with_attribute(None, TEXT_SPAN_ATTR, "true"))
        .into_iter()
        .next()
    else {
        return Ok(());
    };
    let badges = document.create(&spec)?;
    document.append_child(text_span, badges)
}
