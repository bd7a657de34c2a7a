//! Ruler configuration response (`/api/ruler/grafana/api/v1/rules`).
//!
//! Keyed by folder title; each folder holds rule groups whose rules carry the
//! provisioning view (`grafana_alert`) rather than evaluation state.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::null_as_default;

pub type RulerRules = IndexMap<String, Vec<RulerGroup>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulerGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<RulerRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulerRule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub grafana_alert: GrafanaAlert,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrafanaAlert {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub namespace_uid: String,
    #[serde(default)]
    pub is_paused: bool,
}
