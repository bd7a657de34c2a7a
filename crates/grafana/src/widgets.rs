//! Element trees injected into the Grafana UI.

use std::sync::Arc;

use pagemod_core::config::{AlertButton, StaticLink};
use pagemod_rules::AlertCounts;
use pagemod_runtime::{DomError, ElementId, ElementSpec, HostDocument};
use tracing::debug;

use crate::selectors::{
    ALERT_BADGE_ATTR, ALERT_BUTTON_ATTR, COPY_QUERY_CLASS, MARKER_ATTR, NAVIGATE_ATTR, PARENT_DASHBOARD_ATTR,
    QUERY_DATA_ATTR, SEPARATOR_ATTR, STATIC_LINK_ATTR, TEXT_SPAN_ATTR, TOOLTIP_ATTR,
};

const MENU_TEXT_COLOR: &str = "color: rgba(204, 204, 220, 0.65)";

pub fn separator(title: &str) -> ElementSpec {
    let line = || ElementSpec::new("div").attr("style", "flex: 1; height: 1px; background: rgba(204, 204, 220, 0.15)");
    ElementSpec::new("div").attr(SEPARATOR_ATTR, "true").child(
        ElementSpec::new("div")
            .attr("style", "display: flex; align-items: center; gap: 8px; margin-top: 12px")
            .child(line())
            .child(ElementSpec::new("span").attr("style", MENU_TEXT_COLOR).text(title))
            .child(line()),
    )
}

/// Shared sidebar entry: wrapper > link > icon + text span.
fn menu_entry(link: ElementSpec, name: &str, icon: &str) -> ElementSpec {
    let label = ElementSpec::new("div")
        .class("css-1go40k3")
        .child(ElementSpec::new("img").attr("src", icon).attr("alt", ""))
        .child(ElementSpec::new("span").attr(TEXT_SPAN_ATTR, "true").text(name));
    ElementSpec::new("div")
        .attr("style", "display: flex; margin-top: 12px")
        .child(link.attr("style", MENU_TEXT_COLOR).child(label))
}

pub fn menu_link(link: &StaticLink) -> ElementSpec {
    menu_entry(
        ElementSpec::new("a")
            .attr("data-testid", "data-testid Nav menu item")
            .attr(STATIC_LINK_ATTR, link.name.as_str())
            .attr("href", link.href.as_str())
            .class("grafana-menu-link"),
        &link.name,
        &link.icon,
    )
}

pub fn alert_button(button: &AlertButton) -> ElementSpec {
    menu_entry(
        ElementSpec::new("a")
            .attr("data-testid", "data-testid Nav menu item")
            .attr(ALERT_BUTTON_ATTR, button.name.as_str())
            .attr("href", button.href())
            .class("rancher-alerts-menu-link"),
        &button.name,
        &button.icon,
    )
}

fn status_badge(count: usize, status: &str, rgb: &str) -> ElementSpec {
    ElementSpec::new("div").attr("data-alert-status", status).child(
        ElementSpec::new("div")
            .attr(
                "style",
                format!("display: inline-flex; padding: 1px 4px; border-radius: 2px; background: rgba({rgb}, 0.15)"),
            )
            .text(format!("{count} {status}")),
    )
}

/// Firing and pending badges, or `None` when there is nothing to show.
pub fn badges(counts: &AlertCounts) -> Option<ElementSpec> {
    if counts.firing == 0 && counts.pending == 0 {
        return None;
    }
    let mut container = ElementSpec::new("div")
        .attr(ALERT_BADGE_ATTR, "true")
        .attr("style", "margin-left: 8px; display: inline-flex; gap: 8px");
    if counts.firing > 0 {
        container = container.child(status_badge(counts.firing, "firing", "242, 73, 92"));
    }
    if counts.pending > 0 {
        container = container.child(status_badge(counts.pending, "pending", "255, 153, 0"));
    }
    Some(container)
}

pub fn parent_dashboard_button(text: &str, url: &str) -> ElementSpec {
    ElementSpec::new("div")
        .attr(PARENT_DASHBOARD_ATTR, "true")
        .attr("style", "order: 3")
        .child(
            ElementSpec::new("button")
                .attr("type", "button")
                .attr("data-testid", "data-testid Parent dashboard button")
                .attr(NAVIGATE_ATTR, url)
                .attr("style", "background-color: green; color: white")
                .child(ElementSpec::new("span").text(text)),
        )
}

pub fn copy_query_button(query: &str) -> ElementSpec {
    ElementSpec::new("button")
        .class(COPY_QUERY_CLASS)
        .attr("type", "button")
        .attr(QUERY_DATA_ATTR, query)
        .text("Copy query")
}

// ── Styling ──────────────────────────────────────────────────────────

/// Restyle a Grafana element and mark it as modified.
pub fn mark(document: &dyn HostDocument, element: ElementId, marker: &str, color: &str) -> Result<(), DomError> {
    document.set_attribute(element, "style", &format!("background-color: {color}; color: white"))?;
    document.set_attribute(element, MARKER_ATTR, marker)
}

/// Undo [`mark`].
pub fn unmark(document: &dyn HostDocument, element: ElementId) -> Result<(), DomError> {
    document.remove_attribute(element, "style")?;
    document.remove_attribute(element, MARKER_ATTR)
}

pub fn is_marked(document: &dyn HostDocument, element: ElementId) -> bool {
    document.attribute(element, MARKER_ATTR).is_some()
}

// ── Tooltip ──────────────────────────────────────────────────────────

/// Custom hover text attached to an element.
///
/// Grafana's own `title` / `aria-describedby` hints are removed from the
/// target so only this message shows. The tooltip element lives in the body
/// and is removed by [`Tooltip::remove`].
pub struct Tooltip {
    document: Arc<dyn HostDocument>,
    target: ElementId,
    element: ElementId,
}

impl Tooltip {
    pub fn attach(document: Arc<dyn HostDocument>, target: ElementId, message: &str) -> Result<Self, DomError> {
        document.remove_attribute(target, "aria-describedby")?;
        document.remove_attribute(target, "title")?;

        let element = document.create(
            &ElementSpec::new("div")
                .attr(TOOLTIP_ATTR, target.to_string())
                .attr("role", "tooltip")
                .attr("style", "position: fixed; opacity: 0; pointer-events: none")
                .text(message),
        )?;
        let body = document
            .query_str("body")?
            .ok_or(DomError::NoSuchElement(target))?;
        document.append_child(body, element)?;
        debug!(%target, "tooltip attached");
        Ok(Self {
            document,
            target,
            element,
        })
    }

    pub fn target(&self) -> ElementId {
        self.target
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn message(&self) -> Option<String> {
        self.document.text(self.element)
    }

    pub fn remove(&self) {
        if self.document.contains(self.element) {
            if let Err(e) = self.document.remove(self.element) {
                debug!(error = %e, "tooltip already detached");
            }
        }
    }
}

impl std::fmt::Debug for Tooltip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tooltip")
            .field("target", &self.target)
            .field("element", &self.element)
            .finish()
    }
}
