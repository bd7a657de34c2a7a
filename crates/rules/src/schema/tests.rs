use super::*;

const RULES_JSON: &str = r#"{
  "status": "success",
  "data": {
    "groups": [
      {
        "name": "infra",
        "file": "Infra",
        "folderUid": "f1",
        "rules": [
          {
            "uid": "r1",
            "name": "Disk full",
            "state": "firing",
            "health": "ok",
            "labels": {"team": "x", "parent-uid": "tpl-1"},
            "alerts": [{"labels": {}, "state": "Alerting", "activeAt": "2024-01-01T00:00:00Z"}],
            "isPaused": false,
            "queriedDatasourceUIDs": ["prom"]
          },
          {
            "uid": "r2",
            "name": "Recording",
            "state": "recording",
            "labels": null,
            "alerts": null
          }
        ]
      },
      {"name": "empty", "rules": null}
    ]
  }
}"#;

#[test]
fn rules_response_tolerates_nulls_and_unknown_states() {
    let resp: RulesResponse = serde_json::from_str(RULES_JSON).unwrap();
    assert!(resp.is_success());
    assert_eq!(resp.data.groups.len(), 2);

    let rules: Vec<_> = resp.rules().collect();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].state, RuleState::Firing);
    assert_eq!(rules[0].alerts[0].state, AlertState::Alerting);
    assert_eq!(rules[0].parent_uid(), Some("tpl-1"));
    assert_eq!(rules[1].state, RuleState::Unknown);
    assert!(rules[1].labels.is_empty());
    assert_eq!(rules[1].parent_uid(), None);
}

#[test]
fn missing_state_defaults_to_inactive() {
    let rule: AlertRule = serde_json::from_str(r#"{"uid": "r"}"#).unwrap();
    assert_eq!(rule.state, RuleState::Inactive);
    assert_eq!(rule.state.to_string(), "inactive");
}

#[test]
fn ruler_rules_keep_folder_order() {
    let rules: RulerRules = serde_json::from_str(
        r#"{
          "Zeta": [{"name": "g", "interval": "1m", "rules": [
            {"labels": {"team": "x"}, "grafana_alert": {"uid": "z1", "title": "Z"}}
          ]}],
          "Alpha": []
        }"#,
    )
    .unwrap();
    let folders: Vec<_> = rules.keys().cloned().collect();
    assert_eq!(folders, vec!["Zeta", "Alpha"]);
    assert_eq!(rules["Zeta"][0].rules[0].grafana_alert.uid, "z1");
}

#[test]
fn parent_dashboard_prefers_current_value() {
    let doc: DashboardDocument = serde_json::from_str(
        r#"{
          "meta": {"slug": "child", "canEdit": true},
          "dashboard": {
            "uid": "child",
            "tags": ["provisioned"],
            "templating": {"list": [
              {"name": "env", "type": "custom", "query": "prod,dev"},
              {"name": "parentdashboard", "type": "constant",
               "query": "/d/fallback",
               "current": {"value": "/d/parent", "text": "/d/parent"}}
            ]}
          }
        }"#,
    )
    .unwrap();
    assert!(doc.has_any_tag(&["other", "provisioned"]));
    assert!(!doc.has_any_tag(&["other"]));
    assert_eq!(doc.parent_dashboard_url().as_deref(), Some("/d/parent"));
}

#[test]
fn parent_dashboard_falls_back_to_query() {
    let doc: DashboardDocument = serde_json::from_str(
        r#"{"dashboard": {"templating": {"list": [
            {"name": "parentdashboard", "query": "/d/fallback", "current": {"value": ""}}
        ]}}}"#,
    )
    .unwrap();
    assert_eq!(doc.parent_dashboard_url().as_deref(), Some("/d/fallback"));

    let doc: DashboardDocument = serde_json::from_str(
        r#"{"dashboard": {"templating": {"list": [
            {"name": "parentdashboard", "current": {"value": ["/d/first", "/d/second"]}}
        ]}}}"#,
    )
    .unwrap();
    assert_eq!(doc.parent_dashboard_url().as_deref(), Some("/d/first"));
}

#[test]
fn no_parent_variable() {
    let doc = DashboardDocument::default();
    assert_eq!(doc.parent_dashboard_url(), None);
}
