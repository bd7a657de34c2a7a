//! Prometheus-compatible rules response (`/api/prometheus/grafana/api/v1/rules`).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Label linking a derived rule to the template rule it was created from.
pub const PARENT_UID_LABEL: &str = "parent-uid";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: RulesData,
}

impl RulesResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// All rules across groups, in group order.
    pub fn rules(&self) -> impl Iterator<Item = &AlertRule> {
        self.data.groups.iter().flat_map(|g| g.rules.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: Vec<RuleGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub folder_uid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<AlertRule>,
}

/// One alert rule as reported by the alerting backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: RuleState,
    #[serde(default)]
    pub health: String,
    #[serde(default)]
    pub folder_uid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alerts: Vec<AlertInstance>,
    #[serde(default)]
    pub is_paused: bool,
}

impl AlertRule {
    /// UID of the template rule this rule was derived from, if any.
    pub fn parent_uid(&self) -> Option<&str> {
        self.labels
            .get(PARENT_UID_LABEL)
            .map(String::as_str)
            .filter(|uid| !uid.is_empty())
    }
}

/// Rule evaluation state. Values this crate does not know deserialize as `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    Firing,
    Pending,
    Normal,
    #[default]
    Inactive,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for RuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleState::Firing => write!(f, "firing"),
            RuleState::Pending => write!(f, "pending"),
            RuleState::Normal => write!(f, "normal"),
            RuleState::Inactive => write!(f, "inactive"),
            RuleState::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertInstance {
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub state: AlertState,
    #[serde(default)]
    pub active_at: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// State of a single alert instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertState {
    Alerting,
    #[default]
    Normal,
    Pending,
    NoData,
    Error,
    #[serde(other)]
    Unknown,
}
