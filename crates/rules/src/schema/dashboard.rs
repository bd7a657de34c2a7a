//! Dashboard document (`/api/dashboards/uid/{uid}`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::null_as_default;

/// Templating variable that holds the parent dashboard URL.
pub const PARENT_DASHBOARD_VARIABLE: &str = "parentdashboard";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardDocument {
    #[serde(default)]
    pub meta: DashboardMeta,
    #[serde(default)]
    pub dashboard: Dashboard,
}

impl DashboardDocument {
    /// Whether the dashboard carries any of `tags`.
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        self.dashboard
            .tags
            .iter()
            .any(|t| tags.iter().any(|wanted| wanted.as_ref() == t))
    }

    pub fn variable(&self, name: &str) -> Option<&TemplateVariable> {
        self.dashboard.templating.list.iter().find(|v| v.name == name)
    }

    /// URL of the parent dashboard: the `parentdashboard` variable's current
    /// value, falling back to its query.
    pub fn parent_dashboard_url(&self) -> Option<String> {
        let var = self.variable(PARENT_DASHBOARD_VARIABLE)?;
        var.current
            .as_ref()
            .and_then(|c| c.value.as_ref())
            .and_then(first_text)
            .or_else(|| var.query.as_ref().and_then(first_text))
    }
}

/// A non-empty string, or the first non-empty string of an array.
fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMeta {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub folder_uid: String,
    #[serde(default)]
    pub folder_title: String,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub provisioned: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub templating: Templating,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Templating {
    #[serde(default, deserialize_with = "null_as_default")]
    pub list: Vec<TemplateVariable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariable {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub query: Option<Value>,
    #[serde(default)]
    pub current: Option<VariableCurrent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableCurrent {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub text: Option<Value>,
}
