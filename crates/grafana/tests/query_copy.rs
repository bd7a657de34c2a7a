//! Copy-query buttons on dashboard query editors.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{href, services, settle, MockAlerting, MockDashboards};
use pagemod_grafana::selectors::QUERY_DATA_ATTR;
use pagemod_grafana::{register_all, GrafanaModule, GrafanaSettings, QueryCopyButtons};
use pagemod_runtime::{ElementId, ElementSpec, HostDocument, MemoryDocument, ModuleRouter, RuntimeSettings};

const QUERY: &str = "rate(up{job=\"$job\",\u{a0}node=\"${ node }\"}[$__rate_interval])";

fn query_row(query: &str, with_run_button: bool) -> ElementSpec {
    let mut row = ElementSpec::new("div")
        .attr("class", "query-editor-row")
        .child(ElementSpec::new("button").attr("title", "Collapse").text("A"))
        .child(
            ElementSpec::new("div")
                .attr("class", "monaco-editor")
                .child(ElementSpec::new("div").attr("class", "view-line").text(query)),
        );
    if with_run_button {
        row = row.child(ElementSpec::new("button").child(ElementSpec::new("span").text(" Run queries ")));
    }
    row
}

fn copy_buttons(doc: &MemoryDocument) -> Vec<ElementId> {
    doc.query_all_str(".copy-query-button").unwrap()
}

#[test]
fn adds_one_button_per_runnable_row() {
    let doc = MemoryDocument::new(href("/d/abc/overview?var-job=node&var-node=10.0.0.1%3A9100&from=now-6h&to=now"));
    let runnable = doc.append_to_body(&query_row(QUERY, true)).unwrap();
    doc.append_to_body(&query_row("up", false)).unwrap();

    let module = QueryCopyButtons::new();
    module.add_copy_query_buttons(&doc).unwrap();
    module.add_copy_query_buttons(&doc).unwrap();

    let buttons = copy_buttons(&doc);
    assert_eq!(buttons.len(), 1);
    let copy = buttons[0];
    assert_eq!(doc.parent(copy), Some(runnable));
    assert_eq!(
        doc.attribute(copy, QUERY_DATA_ATTR).as_deref(),
        Some(r#"rate(up{job="node", node="10.0.0.1:9100"}[1m])"#)
    );

    // The copy button sits right before "Run queries".
    let row_buttons = doc.query_within(runnable, &"button".parse().unwrap());
    let texts: Vec<String> = row_buttons.iter().filter_map(|&b| doc.text(b)).collect();
    assert_eq!(texts, vec!["A", "Copy query", " Run queries "]);
}

#[test]
fn edited_query_refreshes_the_button() {
    let doc = MemoryDocument::new(href("/d/abc?var-job=api&from=now-7d&to=now"));
    let row = doc.append_to_body(&query_row("sum(rate(x{job=\"$job\"}[$__interval]))", true)).unwrap();
    let module = QueryCopyButtons::new();
    module.add_copy_query_buttons(&doc).unwrap();
    let copy = copy_buttons(&doc)[0];
    assert_eq!(
        doc.attribute(copy, QUERY_DATA_ATTR).as_deref(),
        Some(r#"sum(rate(x{job="api"}[1h]))"#)
    );

    let line = doc.query_within(row, &"div.view-line".parse().unwrap())[0];
    doc.set_text(line, "count(x{job=\"$job\"})").unwrap();
    module.add_copy_query_buttons(&doc).unwrap();
    assert_eq!(copy_buttons(&doc), vec![copy]);
    assert_eq!(doc.attribute(copy, QUERY_DATA_ATTR).as_deref(), Some(r#"count(x{job="api"})"#));
}

#[test]
fn unknown_variables_survive() {
    let doc = MemoryDocument::new(href("/d/abc"));
    doc.append_to_body(&query_row("up{env=\"$env\"}[$__interval]", true)).unwrap();
    QueryCopyButtons::new().add_copy_query_buttons(&doc).unwrap();
    let copy = copy_buttons(&doc)[0];
    assert_eq!(doc.attribute(copy, QUERY_DATA_ATTR).as_deref(), Some(r#"up{env="$env"}[1m]"#));
}

#[tokio::test(start_paused = true)]
async fn routed_module_waits_for_the_editor() {
    let doc = Arc::new(MemoryDocument::new(href("/d/abc/overview?var-job=node&var-node=n1")));
    let services = services("{}", MockAlerting::failing(), MockDashboards::failing());
    let mut router = ModuleRouter::new(
        doc.clone(),
        RuntimeSettings::default().with_quiet_period(Duration::from_millis(50)),
    );
    register_all(&mut router, &GrafanaSettings::default(), &services).unwrap();
    assert!(router.is_active(GrafanaModule::QueryCopyButtons));
    settle().await;
    assert_eq!(
        router
            .instance(GrafanaModule::QueryCopyButtons)
            .unwrap()
            .scheduler()
            .action_count(),
        0,
        "no editor yet"
    );

    // The row resolves the wait; the next change triggers the first pass.
    doc.append_to_body(&query_row(QUERY, true)).unwrap();
    settle().await;
    doc.append_to_body(&ElementSpec::new("div").attr("class", "tooltip-portal")).unwrap();
    settle().await;

    let copy = copy_buttons(&doc);
    assert_eq!(copy.len(), 1);
    assert_eq!(
        doc.attribute(copy[0], QUERY_DATA_ATTR).as_deref(),
        Some(r#"rate(up{job="node", node="n1"}[1m])"#)
    );
}
