//! Label-based rule selection and state tallies.
//!
//! Pure functions over already-fetched rules: output order follows input
//! order, nothing is deduplicated, and results do not depend on map
//! iteration order.

use pagemod_core::LabelPredicate;
use serde::Serialize;

use crate::schema::{AlertRule, RuleState, RulesResponse};

// ── Filtering ───────────────────────────────────────────────────────

/// Rules whose labels satisfy `predicate`, in input order.
pub fn filter_rules<'a, I>(rules: I, predicate: &LabelPredicate) -> Vec<&'a AlertRule>
where
    I: IntoIterator<Item = &'a AlertRule>,
{
    rules
        .into_iter()
        .filter(|rule| predicate.matches(&rule.labels))
        .collect()
}

/// Flatten every group of a rules response, then filter.
pub fn filter_response<'a>(response: &'a RulesResponse, predicate: &LabelPredicate) -> Vec<&'a AlertRule> {
    filter_rules(response.rules(), predicate)
}

// ── Tally ───────────────────────────────────────────────────────────

/// Rule counts by evaluation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertCounts {
    pub firing: usize,
    pub pending: usize,
    pub ok: usize,
}

impl AlertCounts {
    pub fn total(&self) -> usize {
        self.firing + self.pending + self.ok
    }

    pub fn is_quiet(&self) -> bool {
        self.firing == 0 && self.pending == 0
    }
}

/// Count rules by state. States other than firing, pending and normal are ignored.
pub fn tally<'a, I>(rules: I) -> AlertCounts
where
    I: IntoIterator<Item = &'a AlertRule>,
{
    rules.into_iter().fold(AlertCounts::default(), |mut counts, rule| {
        match rule.state {
            RuleState::Firing => counts.firing += 1,
            RuleState::Pending => counts.pending += 1,
            RuleState::Normal => counts.ok += 1,
            RuleState::Inactive | RuleState::Unknown => {}
        }
        counts
    })
}

// ── Tests ───────────────────────────────────────────────────────────
