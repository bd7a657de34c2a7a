//! Shared fixtures for the Grafana page-mod tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pagemod_core::{Config, ConfigCell};
use pagemod_grafana::GrafanaServices;
use pagemod_rules::schema::{DashboardDocument, RulesResponse};
use pagemod_rules::{AlertingBackend, BackendError, DashboardBackend};
use pagemod_runtime::{ElementSpec, MemoryDocument};

pub const HOST: &str = "grafana.xip.se";

pub fn href(path: &str) -> String {
    format!("https://{HOST}{path}")
}

/// Alerting backend serving a swappable JSON body.
pub struct MockAlerting {
    body: Mutex<Option<String>>,
    pub calls: Arc<AtomicUsize>,
}

impl MockAlerting {
    pub fn new(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(Some(body.to_string())),
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(None),
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn set_body(&self, body: &str) {
        *self.body.lock().unwrap() = Some(body.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertingBackend for MockAlerting {
    async fn fetch_rules(&self) -> Result<RulesResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.body.lock().unwrap().as_deref() {
            Some(body) => Ok(serde_json::from_str(body).expect("fixture is valid JSON")),
            None => Err(BackendError::Status {
                endpoint: "api/prometheus/grafana/api/v1/rules".into(),
                status: 500,
                reason: "Internal Server Error".into(),
            }),
        }
    }
}

/// Dashboard backend serving fixed documents by UID.
pub struct MockDashboards {
    bodies: Option<HashMap<String, String>>,
    pub calls: Arc<AtomicUsize>,
}

impl MockDashboards {
    pub fn new(uid: &str, body: &str) -> Arc<Self> {
        Self::many(&[(uid, body)])
    }

    pub fn many(entries: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            bodies: Some(
                entries
                    .iter()
                    .map(|(uid, body)| (uid.to_string(), body.to_string()))
                    .collect(),
            ),
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            bodies: None,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DashboardBackend for MockDashboards {
    async fn fetch_dashboard(&self, uid: &str) -> Result<Option<DashboardDocument>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(bodies) = &self.bodies else {
            return Err(BackendError::Unavailable("dashboard API down".into()));
        };
        Ok(bodies
            .get(uid)
            .map(|body| serde_json::from_str(body).expect("fixture is valid JSON")))
    }
}

pub fn services(config: &str, alerting: Arc<MockAlerting>, dashboards: Arc<MockDashboards>) -> GrafanaServices {
    GrafanaServices::new(
        ConfigCell::loaded(Config::from_yaml_str(config).expect("fixture config parses")),
        alerting,
        dashboards,
    )
}

/// Let spawned tasks and the scheduler's quiet period run out.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

/// Any structural change to wake reconciliation.
pub fn poke(doc: &MemoryDocument) {
    doc.append_to_body(&ElementSpec::new("div").attr("data-test-poke", "1"))
        .unwrap();
}
