//! Debounced re-application of idempotent actions.
//!
//! A page mod registers actions that bring its injected elements back in
//! line with the document. The scheduler listens for structural changes,
//! waits until the document has been quiet for the configured period, then
//! runs every action once, in registration order.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::dom::{DocumentChange, HostDocument};

// ── Actions ──────────────────────────────────────────────────────────

/// Boxed async procedure run on every reconciliation pass.
pub type ActionFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// A named, idempotent reconciliation step.
#[derive(Clone)]
pub struct ReconcileAction {
    pub name: String,
    pub description: String,
    run: ActionFn,
}

impl ReconcileAction {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            run: Arc::new(move || Box::pin(run())),
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        (self.run)().await
    }
}

impl fmt::Debug for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcileAction")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

// ── Scheduler ────────────────────────────────────────────────────────

enum State {
    Idle,
    Running(JoinHandle<()>),
    Closed,
}

/// Owns a module's actions and the task that watches for changes.
pub struct ActionScheduler {
    owner: String,
    document: Arc<dyn HostDocument>,
    quiet_period: Duration,
    actions: Arc<Mutex<Vec<ReconcileAction>>>,
    state: Mutex<State>,
    batches: Arc<AtomicU64>,
}

impl ActionScheduler {
    pub fn new(owner: impl Into<String>, document: Arc<dyn HostDocument>, quiet_period: Duration) -> Self {
        Self {
            owner: owner.into(),
            document,
            quiet_period,
            actions: Arc::new(Mutex::new(Vec::new())),
            state: Mutex::new(State::Idle),
            batches: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append an action. Never triggers a pass. Returns `false` once closed.
    pub fn register(&self, action: ReconcileAction) -> bool {
        let state = self.state.lock().expect("scheduler lock poisoned");
        if matches!(*state, State::Closed) {
            debug!(owner = %self.owner, action = %action.name, "scheduler closed, action dropped");
            return false;
        }
        debug!(owner = %self.owner, action = %action.name, "registered action");
        self.actions.lock().expect("actions lock poisoned").push(action);
        true
    }

    /// Start watching for changes. Restarts a running watcher; no-op with no
    /// actions or after [`Self::close`].
    pub fn start(&self) {
        let mut state = self.state.lock().expect("scheduler lock poisoned");
        if matches!(*state, State::Closed) {
            return;
        }
        if self.action_count() == 0 {
            debug!(owner = %self.owner, "no actions registered, not starting");
            return;
        }
        if let State::Running(handle) = std::mem::replace(&mut *state, State::Idle) {
            handle.abort();
        }

        // Subscribe here, not in the task, so changes right after start() count.
        let changes = self.document.subscribe();
        let owner = self.owner.clone();
        let actions = self.actions.clone();
        let batches = self.batches.clone();
        let quiet = self.quiet_period;
        let handle = tokio::spawn(async move {
            watch_loop(owner, changes, actions, batches, quiet).await;
        });
        *state = State::Running(handle);
        debug!(owner = %self.owner, quiet_ms = quiet.as_millis() as u64, "scheduler started");
    }

    /// Cancel the pending timer and subscription. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("scheduler lock poisoned");
        if let State::Running(handle) = std::mem::replace(&mut *state, State::Idle) {
            handle.abort();
            debug!(owner = %self.owner, "scheduler stopped");
        }
    }

    /// Stop, drop every action and refuse further registration or starts.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("scheduler lock poisoned");
        if let State::Running(handle) = std::mem::replace(&mut *state, State::Closed) {
            handle.abort();
        }
        self.actions.lock().expect("actions lock poisoned").clear();
    }

    pub fn is_running(&self) -> bool {
        matches!(
            &*self.state.lock().expect("scheduler lock poisoned"),
            State::Running(h) if !h.is_finished()
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock().expect("scheduler lock poisoned"), State::Closed)
    }

    pub fn action_count(&self) -> usize {
        self.actions.lock().expect("actions lock poisoned").len()
    }

    pub fn action_names(&self) -> Vec<String> {
        self.actions
            .lock()
            .expect("actions lock poisoned")
            .iter()
            .map(|a| a.name.clone())
            .collect()
    }

    /// Number of completed passes.
    pub fn batches_run(&self) -> u64 {
        self.batches.load(Ordering::SeqCst)
    }

    /// Run one pass now, outside the debounce.
    pub async fn reconcile_now(&self) {
        if self.is_closed() {
            return;
        }
        run_batch(&self.owner, &self.actions).await;
        self.batches.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for ActionScheduler {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let State::Running(handle) = std::mem::replace(&mut *state, State::Closed) {
                handle.abort();
            }
        }
    }
}

// ── Watch loop ───────────────────────────────────────────────────────

async fn watch_loop(
    owner: String,
    mut changes: tokio::sync::broadcast::Receiver<DocumentChange>,
    actions: Arc<Mutex<Vec<ReconcileAction>>>,
    batches: Arc<AtomicU64>,
    quiet: Duration,
) {
    loop {
        // Idle: wait for the first structural change of a burst.
        if !next_structural(&mut changes, &owner).await {
            return;
        }

        // Debounce: every further change restarts the quiet period.
        loop {
            tokio::select! {
                more = next_structural(&mut changes, &owner) => {
                    if !more {
                        return;
                    }
                }
                _ = tokio::time::sleep(quiet) => break,
            }
        }

        run_batch(&owner, &actions).await;
        batches.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wait for the next structural change. `false` when the stream closed.
async fn next_structural(
    changes: &mut tokio::sync::broadcast::Receiver<DocumentChange>,
    owner: &str,
) -> bool {
    loop {
        match changes.recv().await {
            Ok(change) if change.is_structural() => return true,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                debug!(owner, skipped, "change stream lagged");
                return true;
            }
            Err(RecvError::Closed) => {
                warn!(owner, "change stream closed, scheduler exiting");
                return false;
            }
        }
    }
}

/// Run every action once, in order. Failures are logged and never stop the pass.
async fn run_batch(owner: &str, actions: &Mutex<Vec<ReconcileAction>>) {
    let snapshot = actions.lock().expect("actions lock poisoned").clone();
    debug!(owner, count = snapshot.len(), "running reconciliation pass");

    for action in &snapshot {
        match AssertUnwindSafe(action.run()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(owner, action = %action.name, error = ?e, "action failed");
            }
            Err(panic) => {
                error!(owner, action = %action.name, panic = %panic_message(&*panic), "action panicked");
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests;
