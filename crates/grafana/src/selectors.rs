//! Selectors and attribute names for the Grafana UI.

// ── Grafana markup ───────────────────────────────────────────────────

pub const NAVIGATION_MENU: &str =
    r#"[data-testid="data-testid navigation mega-menu"] ul[aria-label="Navigation"]"#;
pub const EDIT_DASHBOARD_BUTTON: &str = r#"[data-testid="data-testid Edit dashboard button"]"#;
pub const QUERY_EDITOR_ROW: &str = ".query-editor-row";
pub const QUERY_TEXT_LINE: &str = "div.view-line";
pub const ALERT_EDIT_LINK: &str = r#"a[href*="/alerting/"][href*="/edit"]"#;
pub const RUN_QUERIES_TEXT: &str = "Run queries";

// ── Injected markup ──────────────────────────────────────────────────

pub const SEPARATOR_ATTR: &str = "data-grafana-separator";
pub const ALERT_BUTTON_ATTR: &str = "data-alert-button-name";
pub const STATIC_LINK_ATTR: &str = "data-static-link-name";
pub const ALERT_BADGE_ATTR: &str = "data-alert-badge";
pub const TEXT_SPAN_ATTR: &str = "data-text-span";
pub const PARENT_DASHBOARD_ATTR: &str = "data-parent-dashboard-button";
pub const COPY_QUERY_CLASS: &str = "copy-query-button";
pub const QUERY_DATA_ATTR: &str = "data-query";
pub const NAVIGATE_ATTR: &str = "data-href";
pub const TOOLTIP_ATTR: &str = "data-pagemod-tooltip";

/// Set on Grafana elements this crate has restyled.
pub const MARKER_ATTR: &str = "data-pagemod-marked";
