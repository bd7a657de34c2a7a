//! Location-driven activation of page modules.
//!
//! The router keeps a registry of [`ModuleDescriptor`]s and at most one live
//! [`ModuleInstance`] per kind. Whenever the document location changes it
//! deactivates instances that no longer match, then activates matching kinds
//! that have no live instance.

use std::future::Future;
use std::sync::Arc;

use indexmap::IndexMap;
use pagemod_core::Location;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::dom::{HostDocument, ReadyState};
use crate::module::{ModuleDescriptor, ModuleInstance, ModuleKind};
use crate::settings::RuntimeSettings;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Module {0} is already registered")]
    DuplicateModule(String),
}

/// Outcome of one activation sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<K> {
    pub location: String,
    pub activated: Vec<K>,
    pub deactivated: Vec<K>,
}

impl<K> Transition<K> {
    pub fn is_empty(&self) -> bool {
        self.activated.is_empty() && self.deactivated.is_empty()
    }
}

pub struct ModuleRouter<K: ModuleKind> {
    document: Arc<dyn HostDocument>,
    settings: RuntimeSettings,
    registry: Vec<ModuleDescriptor<K>>,
    active: IndexMap<K, ModuleInstance<K>>,
    last_href: Option<String>,
}

impl<K: ModuleKind> ModuleRouter<K> {
    pub fn new(document: Arc<dyn HostDocument>, settings: RuntimeSettings) -> Self {
        info!("module router initialized");
        Self {
            document,
            settings,
            registry: Vec::new(),
            active: IndexMap::new(),
            last_href: None,
        }
    }

    pub fn document(&self) -> &Arc<dyn HostDocument> {
        &self.document
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Add a descriptor. If the document is ready and the location matches,
    /// the module is activated right away; returns whether it was.
    pub fn register(&mut self, descriptor: ModuleDescriptor<K>) -> Result<bool, RouterError> {
        if self.registry.iter().any(|d| d.kind() == descriptor.kind()) {
            return Err(RouterError::DuplicateModule(format!(
                "{:?} ({})",
                descriptor.kind(),
                descriptor.name()
            )));
        }
        info!(module = descriptor.name(), "registered page module");

        let mut activated = false;
        if self.document.ready_state() == ReadyState::Ready {
            if let Some(location) = self.parse_current() {
                if descriptor.matches(&location) {
                    activated = activate(&mut self.active, &descriptor, &self.document, &self.settings, &location);
                }
            }
        } else {
            debug!(module = descriptor.name(), "document not ready, deferring activation");
        }
        self.registry.push(descriptor);
        Ok(activated)
    }

    // ── Sweeps ───────────────────────────────────────────────────────

    pub fn current_location(&self) -> String {
        self.document.location()
    }

    /// Re-evaluate every descriptor against the current location.
    pub fn sync(&mut self) -> Transition<K> {
        let href = self.document.location();
        self.last_href = Some(href.clone());
        let location = parse_location(&href);

        // Deactivate first so a kind can never be live twice.
        let stale: Vec<K> = self
            .active
            .iter()
            .filter(|(_, instance)| !location.as_ref().is_some_and(|l| instance.matches(l)))
            .map(|(kind, _)| *kind)
            .collect();
        let mut deactivated = Vec::with_capacity(stale.len());
        for kind in stale {
            if self.deactivate(kind) {
                deactivated.push(kind);
            }
        }

        let mut activated = Vec::new();
        if let Some(location) = &location {
            for descriptor in &self.registry {
                if self.active.contains_key(&descriptor.kind()) || !descriptor.matches(location) {
                    continue;
                }
                if activate(&mut self.active, descriptor, &self.document, &self.settings, location) {
                    activated.push(descriptor.kind());
                }
            }
        }

        let transition = Transition {
            location: href,
            activated,
            deactivated,
        };
        if !transition.is_empty() {
            info!(
                location = %transition.location,
                activated = ?transition.activated,
                deactivated = ?transition.deactivated,
                "location sweep"
            );
        }
        transition
    }

    /// Sweep only if the href differs from the last one seen.
    pub fn poll_location(&mut self) -> Option<Transition<K>> {
        let href = self.document.location();
        if self.last_href.as_deref() == Some(href.as_str()) {
            return None;
        }
        debug!(%href, "location changed");
        Some(self.sync())
    }

    /// Remove the live instance of `kind` and clean it up. Cleanup failures
    /// are logged; the instance is gone either way.
    pub fn deactivate(&mut self, kind: K) -> bool {
        let Some(mut instance) = self.active.shift_remove(&kind) else {
            return false;
        };
        info!(module = instance.name(), "deactivating page module");
        if let Err(e) = instance.cleanup() {
            warn!(module = instance.name(), error = ?e, "cleanup failed");
        }
        true
    }

    /// Deactivate everything.
    pub fn shutdown(&mut self) {
        let kinds: Vec<K> = self.active.keys().copied().collect();
        for kind in kinds {
            self.deactivate(kind);
        }
    }

    // ── Introspection ────────────────────────────────────────────────

    /// Live kinds in activation order.
    pub fn active_modules(&self) -> Vec<K> {
        self.active.keys().copied().collect()
    }

    pub fn active_module_names(&self) -> Vec<&str> {
        self.active.values().map(|i| i.name()).collect()
    }

    /// Registered kinds in registration order.
    pub fn registered_modules(&self) -> Vec<K> {
        self.registry.iter().map(|d| d.kind()).collect()
    }

    pub fn registered_module_names(&self) -> Vec<&str> {
        self.registry.iter().map(|d| d.name()).collect()
    }

    pub fn is_active(&self, kind: K) -> bool {
        self.active.contains_key(&kind)
    }

    pub fn instance(&self, kind: K) -> Option<&ModuleInstance<K>> {
        self.active.get(&kind)
    }

    // ── Event loop ───────────────────────────────────────────────────

    /// Drive the router until `shutdown` resolves, then deactivate everything.
    ///
    /// Waits for document readiness, sweeps once, then re-checks the
    /// location on every change notification and on every poll tick.
    pub async fn run<S>(&mut self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut changes = self.document.subscribe();

        let document = self.document.clone();
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("shutdown before document was ready");
                self.shutdown();
                return;
            }
            _ = document.wait_ready() => {}
        }
        self.sync();

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                change = changes.recv() => match change {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        self.poll_location();
                    }
                    Err(RecvError::Closed) => {
                        warn!("document change stream closed, router stopping");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.poll_location();
                }
            }
        }
        self.shutdown();
    }

    fn parse_current(&self) -> Option<Location> {
        parse_location(&self.document.location())
    }
}

impl<K: ModuleKind> Drop for ModuleRouter<K> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn parse_location(href: &str) -> Option<Location> {
    match Location::parse(href) {
        Ok(location) => Some(location),
        Err(e) => {
            warn!(href, error = %e, "cannot parse location, treating as no match");
            None
        }
    }
}

/// Instantiate and initialize `descriptor` unless its kind is already live.
fn activate<K: ModuleKind>(
    active: &mut IndexMap<K, ModuleInstance<K>>,
    descriptor: &ModuleDescriptor<K>,
    document: &Arc<dyn HostDocument>,
    settings: &RuntimeSettings,
    location: &Location,
) -> bool {
    if active.contains_key(&descriptor.kind()) {
        debug!(module = descriptor.name(), "already active, skipping");
        return false;
    }
    info!(module = descriptor.name(), host = location.host(), path = location.path(), "activating page module");

    let mut instance = descriptor.instantiate(document.clone(), settings);
    match instance.initialize(location.clone()) {
        Ok(()) => {
            active.insert(descriptor.kind(), instance);
            true
        }
        Err(e) => {
            error!(module = descriptor.name(), error = %e, "failed to initialize page module");
            false
        }
    }
}
