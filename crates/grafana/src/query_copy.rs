//! "Copy query" buttons next to each query editor's "Run queries" button.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pagemod_core::Location;
use pagemod_runtime::{ElementId, HostDocument, ModuleContext, PageModule, ReconcileAction, Selector};
use tracing::debug;

use crate::selectors::{COPY_QUERY_CLASS, QUERY_DATA_ATTR, QUERY_EDITOR_ROW, QUERY_TEXT_LINE, RUN_QUERIES_TEXT};
use crate::variables::{extract_variables, substitute};
use crate::widgets;

#[derive(Debug, Default)]
pub struct QueryCopyButtons;

impl QueryCopyButtons {
    pub fn new() -> Self {
        Self
    }

    /// Add a copy button to every query row that lacks one and refresh the
    /// query carried by existing buttons.
    pub fn add_copy_query_buttons(&self, document: &dyn HostDocument) -> anyhow::Result<()> {
        let rows = document.query_all_str(QUERY_EDITOR_ROW)?;
        if rows.is_empty() {
            return Ok(());
        }
        let location = Location::parse(&document.location())?;
        let vars = extract_variables(&location, Utc::now());

        let buttons = Selector::parse("button")?;
        let copy_buttons = Selector::parse(&format!(".{COPY_QUERY_CLASS}"))?;
        let query_lines = Selector::parse(QUERY_TEXT_LINE)?;

        for row in rows {
            let Some(run_button) = find_run_button(document, row, &buttons) else {
                continue;
            };
            let raw = document
                .query_within(row, &query_lines)
                .into_iter()
                .next()
                .and_then(|line| document.text(line))
                .unwrap_or_default();
            let query = if raw.trim().is_empty() {
                String::new()
            } else {
                substitute(&raw, &vars)
            };

            match document.query_within(row, &copy_buttons).into_iter().next() {
                Some(existing) => {
                    if document.attribute(existing, QUERY_DATA_ATTR).as_deref() != Some(query.as_str()) {
                        document.set_attribute(existing, QUERY_DATA_ATTR, &query)?;
                    }
                }
                None => {
                    let button = document.create(&widgets::copy_query_button(&query))?;
                    document.insert_before(run_button, button)?;
                    debug!(%row, "copy query button added");
                }
            }
        }
        Ok(())
    }
}

fn find_run_button(document: &dyn HostDocument, row: ElementId, buttons: &Selector) -> Option<ElementId> {
    document.query_within(row, buttons).into_iter().find(|&button| {
        document
            .text(button)
            .is_some_and(|text| text.trim().contains(RUN_QUERIES_TEXT))
    })
}

#[async_trait]
impl PageModule for QueryCopyButtons {
    async fn execute(self: Arc<Self>, ctx: ModuleContext) -> anyhow::Result<()> {
        ctx.wait_for_element(QUERY_EDITOR_ROW).await?;

        let document = ctx.document().clone();
        let module = self.clone();
        ctx.register_action(ReconcileAction::new("copyQuery", "Copy query", move || {
            let module = module.clone();
            let document = document.clone();
            async move { module.add_copy_query_buttons(&*document) }
        }));
        ctx.start_reconciliation();
        Ok(())
    }
}
