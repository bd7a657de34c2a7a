use std::sync::Mutex as StdMutex;

use super::*;
use crate::dom::{ElementSpec, MemoryDocument};

const QUIET: Duration = Duration::from_millis(100);

fn setup() -> (Arc<MemoryDocument>, ActionScheduler) {
    let doc = Arc::new(MemoryDocument::new("https://grafana.example.com/"));
    let scheduler = ActionScheduler::new("test", doc.clone(), QUIET);
    (doc, scheduler)
}

/// Action that appends its name to a shared log.
fn recording(name: &'static str, log: &Arc<StdMutex<Vec<&'static str>>>) -> ReconcileAction {
    let log = log.clone();
    ReconcileAction::new(name, "records its name", move || {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(name);
            Ok::<(), anyhow::Error>(())
        }
    })
}

fn touch(doc: &MemoryDocument) {
    doc.append_to_body(&ElementSpec::new("div")).unwrap();
}

async fn settle() {
    tokio::time::sleep(QUIET * 3).await;
}

#[tokio::test(start_paused = true)]
async fn register_never_runs_actions() {
    let (doc, scheduler) = setup();
    let log = Arc::new(StdMutex::new(Vec::new()));
    assert!(scheduler.register(recording("a", &log)));
    touch(&doc);
    settle().await;
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(scheduler.batches_run(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_without_actions_is_noop() {
    let (_doc, scheduler) = setup();
    scheduler.start();
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn burst_within_quiet_period_runs_one_batch_in_order() {
    let (doc, scheduler) = setup();
    let log = Arc::new(StdMutex::new(Vec::new()));
    scheduler.register(recording("first", &log));
    scheduler.register(recording("second", &log));
    scheduler.start();
    assert!(scheduler.is_running());

    for _ in 0..5 {
        touch(&doc);
        tokio::time::sleep(QUIET / 2).await;
    }
    assert_eq!(scheduler.batches_run(), 0, "timer restarts on every change");

    settle().await;
    assert_eq!(scheduler.batches_run(), 1);
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);

    // A later burst is a new batch.
    touch(&doc);
    settle().await;
    assert_eq!(scheduler.batches_run(), 2);
}

#[tokio::test(start_paused = true)]
async fn failing_and_panicking_actions_do_not_stop_the_pass() {
    let (doc, scheduler) = setup();
    let log = Arc::new(StdMutex::new(Vec::new()));
    scheduler.register(ReconcileAction::new("fails", "returns an error", || async {
        Err::<(), _>(anyhow::anyhow!("boom"))
    }));
    scheduler.register(ReconcileAction::new("panics", "panics", || async {
        let empty: Vec<u32> = Vec::new();
        let _ = empty[0];
        Ok::<(), anyhow::Error>(())
    }));
    scheduler.register(recording("after", &log));
    scheduler.start();

    touch(&doc);
    settle().await;
    assert_eq!(*log.lock().unwrap(), vec!["after"]);
    assert!(scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn attribute_changes_are_ignored() {
    let (doc, scheduler) = setup();
    let log = Arc::new(StdMutex::new(Vec::new()));
    let el = doc.append_to_body(&ElementSpec::new("div")).unwrap();
    scheduler.register(recording("a", &log));
    scheduler.start();

    doc.set_attribute(el, "title", "changed").unwrap();
    settle().await;
    assert_eq!(scheduler.batches_run(), 0);

    doc.set_text(el, "changed").unwrap();
    settle().await;
    assert_eq!(scheduler.batches_run(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_batch() {
    let (doc, scheduler) = setup();
    let log = Arc::new(StdMutex::new(Vec::new()));
    scheduler.register(recording("a", &log));
    scheduler.start();

    touch(&doc);
    tokio::time::sleep(QUIET / 2).await;
    scheduler.stop();
    scheduler.stop();
    settle().await;
    assert_eq!(scheduler.batches_run(), 0);
    assert!(!scheduler.is_running());

    // Restartable after stop.
    scheduler.start();
    touch(&doc);
    settle().await;
    assert_eq!(scheduler.batches_run(), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_keeps_a_single_watcher() {
    let (doc, scheduler) = setup();
    let log = Arc::new(StdMutex::new(Vec::new()));
    scheduler.register(recording("a", &log));
    scheduler.start();
    scheduler.start();

    touch(&doc);
    settle().await;
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_refuses_further_use() {
    let (doc, scheduler) = setup();
    let log = Arc::new(StdMutex::new(Vec::new()));
    scheduler.register(recording("a", &log));
    scheduler.start();
    scheduler.close();

    assert!(scheduler.is_closed());
    assert_eq!(scheduler.action_count(), 0);
    assert!(!scheduler.register(recording("late", &log)));
    scheduler.start();
    assert!(!scheduler.is_running());

    touch(&doc);
    settle().await;
    scheduler.reconcile_now().await;
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reconcile_now_runs_immediately() {
    let (_doc, scheduler) = setup();
    let log = Arc::new(StdMutex::new(Vec::new()));
    scheduler.register(recording("a", &log));
    scheduler.register(recording("b", &log));
    assert_eq!(scheduler.action_names(), vec!["a", "b"]);

    scheduler.reconcile_now().await;
    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(scheduler.batches_run(), 1);
}
