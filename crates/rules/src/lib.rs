//! Alert-rule selection for page mods.
//!
//! This crate provides:
//! - Serde types for the Grafana rules, ruler and dashboard APIs
//! - Label-predicate filtering and firing/pending/ok tallies
//! - `AlertingBackend` / `DashboardBackend` traits and a reqwest client

pub mod backend;
pub mod client;
pub mod filter;
pub mod schema;

pub use backend::{fetch_alert_counts, AlertingBackend, BackendError, DashboardBackend, OfflineBackend};
pub use client::GrafanaClient;
pub use filter::{filter_response, filter_rules, tally, AlertCounts};
