//! Backend traits the page mods fetch through.
//!
//! The HTTP implementation lives in [`crate::client`]; tests and the CLI dry
//! run supply their own implementations.

use std::sync::Arc;

use async_trait::async_trait;
use pagemod_core::LabelPredicate;

use crate::filter::{filter_response, tally, AlertCounts};
use crate::schema::{DashboardDocument, RulerRules, RulesResponse};

/// Errors raised while talking to the alerting or dashboard API.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned {status}: {reason}")]
    Status {
        endpoint: String,
        status: u16,
        reason: String,
    },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AlertingBackend: Send + Sync {
    /// Evaluated rules with their current state.
    async fn fetch_rules(&self) -> Result<RulesResponse, BackendError>;

    /// Provisioned rule definitions grouped by folder.
    async fn fetch_ruler_rules(&self) -> Result<RulerRules, BackendError> {
        Err(BackendError::Unavailable("ruler API not supported".to_string()))
    }
}

#[async_trait]
pub trait DashboardBackend: Send + Sync {
    /// Dashboard by UID; `Ok(None)` when it does not exist.
    async fn fetch_dashboard(&self, uid: &str) -> Result<Option<DashboardDocument>, BackendError>;
}

#[async_trait]
impl<T: AlertingBackend + ?Sized> AlertingBackend for Arc<T> {
    async fn fetch_rules(&self) -> Result<RulesResponse, BackendError> {
        (**self).fetch_rules().await
    }

    async fn fetch_ruler_rules(&self) -> Result<RulerRules, BackendError> {
        (**self).fetch_ruler_rules().await
    }
}

#[async_trait]
impl<T: DashboardBackend + ?Sized> DashboardBackend for Arc<T> {
    async fn fetch_dashboard(&self, uid: &str) -> Result<Option<DashboardDocument>, BackendError> {
        (**self).fetch_dashboard(uid).await
    }
}

/// Fetch, filter and tally in one call. Fetch failures are logged and
/// reported as zero counts.
pub async fn fetch_alert_counts(backend: &dyn AlertingBackend, predicate: &LabelPredicate) -> AlertCounts {
    match backend.fetch_rules().await {
        Ok(response) => tally(filter_response(&response, predicate)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to fetch alert rules, reporting zero counts");
            AlertCounts::default()
        }
    }
}

/// Backend that never has data. Used where no Grafana is reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineBackend;

#[async_trait]
impl AlertingBackend for OfflineBackend {
    async fn fetch_rules(&self) -> Result<RulesResponse, BackendError> {
        Err(BackendError::Unavailable("offline".to_string()))
    }
}

#[async_trait]
impl DashboardBackend for OfflineBackend {
    async fn fetch_dashboard(&self, _uid: &str) -> Result<Option<DashboardDocument>, BackendError> {
        Ok(None)
    }
}
