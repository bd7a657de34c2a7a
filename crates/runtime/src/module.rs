//! Page-mod capability trait and per-activation lifecycle.

use std::fmt;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use futures::FutureExt;
use pagemod_core::{Location, LocationError, LocationMatcher};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::dom::{ElementId, HostDocument, ReadyState, Selector};
use crate::scheduler::{panic_message, ActionScheduler, ReconcileAction};
use crate::settings::RuntimeSettings;
use crate::wait::wait_for_element;

// ── PageModule ───────────────────────────────────────────────────────

/// A unit of page decoration.
///
/// `execute` runs once per activation, typically: wait for an anchor
/// element, register reconciliation actions, start the scheduler.
/// `cleanup` releases module-owned resources (refresh tasks, tooltips);
/// the scheduler and execution task are handled by [`ModuleInstance`].
#[async_trait]
pub trait PageModule: Send + Sync + 'static {
    async fn execute(self: Arc<Self>, ctx: ModuleContext) -> anyhow::Result<()>;

    fn cleanup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// What `execute` gets to work with.
#[derive(Clone)]
pub struct ModuleContext {
    name: Arc<str>,
    document: Arc<dyn HostDocument>,
    scheduler: Arc<ActionScheduler>,
    location: Location,
}

impl ModuleContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Arc<dyn HostDocument> {
        &self.document
    }

    /// Location at activation time.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Resolve once an element matching `selector` is attached.
    pub async fn wait_for_element(&self, selector: &str) -> anyhow::Result<ElementId> {
        let selector = Selector::parse(selector)?;
        debug!(module = %self.name, selector = %selector, "waiting for element");
        let found = wait_for_element(&*self.document, &selector)
            .await
            .with_context(|| format!("waiting for '{selector}'"))?;
        debug!(module = %self.name, selector = %selector, element = %found, "element found");
        Ok(found)
    }

    /// Append a reconciliation action. Returns `false` after cleanup.
    pub fn register_action(&self, action: ReconcileAction) -> bool {
        self.scheduler.register(action)
    }

    /// Start (or restart) reconciliation on document changes.
    pub fn start_reconciliation(&self) {
        self.scheduler.start();
    }

    /// Run every registered action once right away.
    pub async fn reconcile_now(&self) {
        self.scheduler.reconcile_now().await;
    }
}

// ── Descriptor ───────────────────────────────────────────────────────

/// Bound for the tag that identifies a module kind.
pub trait ModuleKind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> ModuleKind for T where T: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

pub type ModuleFactory = Arc<dyn Fn() -> Arc<dyn PageModule> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("Invalid location pattern: {0}")]
    InvalidPattern(#[from] LocationError),

    #[error("Module '{0}' is already initialized")]
    AlreadyInitialized(String),

    #[error("Module '{0}' has been cleaned up")]
    CleanedUp(String),
}

/// Registration record: kind tag, name, location predicate, factory.
#[derive(Clone)]
pub struct ModuleDescriptor<K> {
    kind: K,
    name: String,
    matcher: LocationMatcher,
    factory: ModuleFactory,
}

impl<K: ModuleKind> ModuleDescriptor<K> {
    pub fn new<F>(
        kind: K,
        name: impl Into<String>,
        host_pattern: &str,
        path_pattern: &str,
        factory: F,
    ) -> Result<Self, ModuleError>
    where
        F: Fn() -> Arc<dyn PageModule> + Send + Sync + 'static,
    {
        Ok(Self {
            kind,
            name: name.into(),
            matcher: LocationMatcher::new(host_pattern, path_pattern)?,
            factory: Arc::new(factory),
        })
    }

    pub fn kind(&self) -> K {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &LocationMatcher {
        &self.matcher
    }

    pub fn matches(&self, location: &Location) -> bool {
        let result = self.matcher.matches(location);
        debug!(
            module = %self.name,
            host = location.host(),
            path = location.path(),
            host_pattern = self.matcher.host_pattern(),
            path_pattern = self.matcher.path_pattern(),
            result,
            "match check"
        );
        result
    }

    /// Build a fresh, not yet initialized instance.
    pub fn instantiate(&self, document: Arc<dyn HostDocument>, settings: &RuntimeSettings) -> ModuleInstance<K> {
        let scheduler = Arc::new(ActionScheduler::new(
            self.name.clone(),
            document.clone(),
            settings.quiet_period,
        ));
        ModuleInstance {
            kind: self.kind,
            name: self.name.clone(),
            matcher: self.matcher.clone(),
            module: (self.factory)(),
            document,
            scheduler,
            phase: Phase::Created,
            task: None,
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for ModuleDescriptor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("host", &self.matcher.host_pattern())
            .field("path", &self.matcher.path_pattern())
            .finish()
    }
}

// ── Instance ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Active,
    Inactive,
}

/// One activation of a module.
pub struct ModuleInstance<K> {
    kind: K,
    name: String,
    matcher: LocationMatcher,
    module: Arc<dyn PageModule>,
    document: Arc<dyn HostDocument>,
    scheduler: Arc<ActionScheduler>,
    phase: Phase,
    task: Option<JoinHandle<()>>,
}

impl<K: ModuleKind> ModuleInstance<K> {
    pub fn kind(&self) -> K {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn scheduler(&self) -> &Arc<ActionScheduler> {
        &self.scheduler
    }

    pub fn matches(&self, location: &Location) -> bool {
        self.matcher.matches(location)
    }

    /// Start the one-time execution. Waits for document readiness first.
    ///
    /// Failures inside `execute` are logged on the spawned task and never
    /// reach the caller.
    pub fn initialize(&mut self, location: Location) -> Result<(), ModuleError> {
        match self.phase {
            Phase::Created => {}
            Phase::Active => return Err(ModuleError::AlreadyInitialized(self.name.clone())),
            Phase::Inactive => return Err(ModuleError::CleanedUp(self.name.clone())),
        }
        self.phase = Phase::Active;

        let name: Arc<str> = Arc::from(self.name.as_str());
        let ctx = ModuleContext {
            name: name.clone(),
            document: self.document.clone(),
            scheduler: self.scheduler.clone(),
            location,
        };
        let module = self.module.clone();
        let document = self.document.clone();

        self.task = Some(tokio::spawn(async move {
            if document.ready_state() == ReadyState::Loading {
                debug!(module = %name, "document loading, waiting before execute");
                document.wait_ready().await;
            }
            match AssertUnwindSafe(module.execute(ctx)).catch_unwind().await {
                Ok(Ok(())) => debug!(module = %name, "execute finished"),
                Ok(Err(e)) => error!(module = %name, error = ?e, "execute failed"),
                Err(panic) => error!(module = %name, panic = %panic_message(&*panic), "execute panicked"),
            }
        }));
        info!(module = %self.name, "module initialized");
        Ok(())
    }

    /// Tear down: abort the execution task, close the scheduler, then run the
    /// module's own cleanup. Runs once; later calls return `Ok(())`.
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        if self.phase == Phase::Inactive {
            return Ok(());
        }
        self.phase = Phase::Inactive;

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.scheduler.close();

        let module = self.module.clone();
        match std::panic::catch_unwind(AssertUnwindSafe(|| module.cleanup())) {
            Ok(result) => result.with_context(|| format!("cleanup of '{}'", self.name)),
            Err(panic) => Err(anyhow::anyhow!(
                "cleanup of '{}' panicked: {}",
                self.name,
                panic_message(&*panic)
            )),
        }
    }
}

impl<K> Drop for ModuleInstance<K> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for ModuleInstance<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("phase", &self.phase)
            .finish()
    }
}
