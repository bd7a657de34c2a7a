//! HTTP client for a Grafana instance.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::backend::{AlertingBackend, BackendError, DashboardBackend};
use crate::schema::{DashboardDocument, RulerRules, RulesResponse};

pub const RULES_ENDPOINT: &str = "api/prometheus/grafana/api/v1/rules";
pub const RULER_ENDPOINT: &str = "api/ruler/grafana/api/v1/rules";
pub const DASHBOARD_ENDPOINT: &str = "api/dashboards/uid/";

/// Grafana API client.
///
/// Endpoints are resolved relative to `base_url`, so a Grafana served under
/// a sub-path (`https://host/grafana/`) works as well as one at the root.
#[derive(Debug, Clone)]
pub struct GrafanaClient {
    base_url: Url,
    token: Option<String>,
    client: reqwest::Client,
}

impl GrafanaClient {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            token: None,
            client: reqwest::Client::new(),
        })
    }

    /// Authenticate with a service-account token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// GET `path` and decode the JSON body. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, BackendError> {
        let url = self.endpoint(path)?;
        let mut request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            tracing::debug!(url = %url, "resource not found");
            return Ok(None);
        }
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unknown status").to_string();
            tracing::warn!(url = %url, %status, "grafana returned non-2xx status");
            return Err(BackendError::Status {
                endpoint: url.path().to_string(),
                status: status.as_u16(),
                reason,
            });
        }

        let body = response.json::<T>().await?;
        tracing::debug!(url = %url, %status, "grafana request completed");
        Ok(Some(body))
    }

    /// Like [`Self::get_json`] but a 404 is an error.
    async fn get_required<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        self.get_json(path).await?.ok_or_else(|| BackendError::Status {
            endpoint: format!("/{}", path.trim_start_matches('/')),
            status: StatusCode::NOT_FOUND.as_u16(),
            reason: "Not Found".to_string(),
        })
    }
}

#[async_trait]
impl AlertingBackend for GrafanaClient {
    async fn fetch_rules(&self) -> Result<RulesResponse, BackendError> {
        self.get_required(RULES_ENDPOINT).await
    }

    async fn fetch_ruler_rules(&self) -> Result<RulerRules, BackendError> {
        self.get_required(RULER_ENDPOINT).await
    }
}

#[async_trait]
impl DashboardBackend for GrafanaClient {
    async fn fetch_dashboard(&self, uid: &str) -> Result<Option<DashboardDocument>, BackendError> {
        let path = format!("{DASHBOARD_ENDPOINT}{}", urlencoding::encode(uid));
        self.get_json(&path).await
    }
}
