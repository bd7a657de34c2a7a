//! Router activation scenarios against an in-memory document.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pagemod_runtime::{
    ElementSpec, HostDocument, MemoryDocument, ModuleContext, ModuleDescriptor, ModuleRouter, PageModule,
    ReconcileAction, RouterError, RuntimeSettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Dashboards,
    Alerting,
    Everywhere,
}

const HOST: &str = r"^grafana\.example\.com$";

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    executed: AtomicUsize,
    cleaned: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

struct CountingModule {
    counters: Arc<Counters>,
    fail_cleanup: bool,
    fail_execute: bool,
}

#[async_trait]
impl PageModule for CountingModule {
    async fn execute(self: Arc<Self>, ctx: ModuleContext) -> anyhow::Result<()> {
        self.counters.executed.fetch_add(1, Ordering::SeqCst);
        if self.fail_execute {
            anyhow::bail!("anchor never rendered");
        }
        let document = ctx.document().clone();
        ctx.register_action(ReconcileAction::new("mark", "mark the body", move || {
            let document = document.clone();
            async move {
                if document.query_str("[data-test-marker]")?.is_none() {
                    let marker = document.create(&ElementSpec::new("span").attr("data-test-marker", "1"))?;
                    let body = document.query_str("body")?.ok_or_else(|| anyhow::anyhow!("no body"))?;
                    document.append_child(body, marker)?;
                }
                Ok::<(), anyhow::Error>(())
            }
        }));
        ctx.start_reconciliation();
        Ok(())
    }

    fn cleanup(&self) -> anyhow::Result<()> {
        self.counters.cleaned.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
        if self.fail_cleanup {
            anyhow::bail!("cleanup exploded");
        }
        Ok(())
    }
}

fn descriptor(kind: Kind, path: &str, counters: &Arc<Counters>) -> ModuleDescriptor<Kind> {
    descriptor_with(kind, path, counters, false, false)
}

fn descriptor_with(
    kind: Kind,
    path: &str,
    counters: &Arc<Counters>,
    fail_cleanup: bool,
    fail_execute: bool,
) -> ModuleDescriptor<Kind> {
    let counters = counters.clone();
    ModuleDescriptor::new(kind, format!("{kind:?}"), HOST, path, move || {
        counters.created.fetch_add(1, Ordering::SeqCst);
        let live = counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_live.fetch_max(live, Ordering::SeqCst);
        Arc::new(CountingModule {
            counters: counters.clone(),
            fail_cleanup,
            fail_execute,
        }) as Arc<dyn PageModule>
    })
    .unwrap()
}

fn router(doc: &Arc<MemoryDocument>) -> ModuleRouter<Kind> {
    ModuleRouter::new(doc.clone(), RuntimeSettings::default().with_quiet_period(Duration::from_millis(20)))
}

#[tokio::test]
async fn two_matching_modules_activate_and_both_clean_up_once() {
    let doc = Arc::new(MemoryDocument::new("https://grafana.example.com/d/abc"));
    let dashboards = Arc::new(Counters::default());
    let everywhere = Arc::new(Counters::default());
    let mut router = router(&doc);

    assert!(router.register(descriptor(Kind::Dashboards, r"^/d/", &dashboards)).unwrap());
    assert!(router.register(descriptor(Kind::Everywhere, r"^/", &everywhere)).unwrap());
    assert_eq!(router.active_modules(), vec![Kind::Dashboards, Kind::Everywhere]);

    doc.navigate("https://other.example.com/d/abc");
    let transition = router.poll_location().expect("location changed");
    assert_eq!(transition.deactivated, vec![Kind::Dashboards, Kind::Everywhere]);
    assert!(transition.activated.is_empty());
    assert!(router.active_modules().is_empty());
    assert_eq!(dashboards.cleaned.load(Ordering::SeqCst), 1);
    assert_eq!(everywhere.cleaned.load(Ordering::SeqCst), 1);

    assert!(router.poll_location().is_none(), "same href, no sweep");
    router.shutdown();
    assert_eq!(dashboards.cleaned.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn one_instance_per_kind_across_navigation() {
    let doc = Arc::new(MemoryDocument::new("https://grafana.example.com/d/one"));
    let dashboards = Arc::new(Counters::default());
    let alerting = Arc::new(Counters::default());
    let mut router = router(&doc);
    router.register(descriptor(Kind::Dashboards, r"^/d/", &dashboards)).unwrap();
    router.register(descriptor(Kind::Alerting, r"^/alerting/list", &alerting)).unwrap();

    let hrefs = [
        "https://grafana.example.com/d/two",
        "https://grafana.example.com/d/two?orgId=1",
        "https://grafana.example.com/alerting/list",
        "https://grafana.example.com/d/three",
        "https://grafana.example.com/d/four",
        "https://grafana.example.com/alerting/list?search=x",
    ];
    for href in hrefs {
        doc.navigate(href);
        router.poll_location();
        let active = router.active_modules();
        let mut deduped = active.clone();
        deduped.dedup();
        assert_eq!(active, deduped);
        assert!(active.len() <= 1, "paths are disjoint: {active:?}");
    }

    assert_eq!(dashboards.max_live.load(Ordering::SeqCst), 1);
    assert_eq!(alerting.max_live.load(Ordering::SeqCst), 1);
    // /d/one, then again after each return from the alert list.
    assert_eq!(dashboards.created.load(Ordering::SeqCst), 2);
    assert_eq!(alerting.created.load(Ordering::SeqCst), 2);
    assert_eq!(router.active_modules(), vec![Kind::Alerting]);
}

#[tokio::test]
async fn failing_cleanup_still_removes_module() {
    let doc = Arc::new(MemoryDocument::new("https://grafana.example.com/d/abc"));
    let counters = Arc::new(Counters::default());
    let mut router = router(&doc);
    router
        .register(descriptor_with(Kind::Dashboards, r"^/d/", &counters, true, false))
        .unwrap();
    assert!(router.is_active(Kind::Dashboards));

    doc.navigate("https://grafana.example.com/explore");
    router.poll_location();
    assert!(!router.is_active(Kind::Dashboards));
    assert_eq!(counters.cleaned.load(Ordering::SeqCst), 1);

    doc.navigate("https://grafana.example.com/d/abc");
    router.poll_location();
    assert!(router.is_active(Kind::Dashboards));
}

#[tokio::test]
async fn failing_execute_is_isolated() {
    let doc = Arc::new(MemoryDocument::new("https://grafana.example.com/d/abc"));
    let broken = Arc::new(Counters::default());
    let healthy = Arc::new(Counters::default());
    let mut router = router(&doc);
    router
        .register(descriptor_with(Kind::Dashboards, r"^/d/", &broken, false, true))
        .unwrap();
    router.register(descriptor(Kind::Everywhere, r"^/", &healthy)).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(broken.executed.load(Ordering::SeqCst), 1);
    assert_eq!(healthy.executed.load(Ordering::SeqCst), 1);
    assert!(router.is_active(Kind::Dashboards), "a failed execute leaves the module active without actions");
    assert_eq!(router.instance(Kind::Dashboards).unwrap().scheduler().action_count(), 0);
    assert_eq!(router.instance(Kind::Everywhere).unwrap().scheduler().action_count(), 1);
}

#[tokio::test]
async fn duplicate_kind_is_rejected() {
    let doc = Arc::new(MemoryDocument::new("https://grafana.example.com/d/abc"));
    let counters = Arc::new(Counters::default());
    let mut router = router(&doc);
    router.register(descriptor(Kind::Dashboards, r"^/d/", &counters)).unwrap();
    let err = router
        .register(descriptor(Kind::Dashboards, r"^/", &counters))
        .unwrap_err();
    assert!(matches!(err, RouterError::DuplicateModule(_)));
    assert_eq!(router.registered_modules(), vec![Kind::Dashboards]);
    assert_eq!(counters.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unparsable_location_deactivates_everything() {
    let doc = Arc::new(MemoryDocument::new("https://grafana.example.com/d/abc"));
    let counters = Arc::new(Counters::default());
    let mut router = router(&doc);
    router.register(descriptor(Kind::Everywhere, r"^/", &counters)).unwrap();

    doc.navigate("about:blank");
    let transition = router.poll_location().unwrap();
    assert_eq!(transition.deactivated, vec![Kind::Everywhere]);
    assert!(router.active_modules().is_empty());
}

#[tokio::test]
async fn registration_before_ready_is_deferred_to_run() {
    let doc = Arc::new(MemoryDocument::loading("https://grafana.example.com/d/abc"));
    let counters = Arc::new(Counters::default());
    let mut router = router(&doc);
    assert!(!router.register(descriptor(Kind::Dashboards, r"^/d/", &counters)).unwrap());
    assert_eq!(router.registered_module_names(), vec!["Dashboards"]);
    assert!(router.active_modules().is_empty());

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let driver = {
        let doc = doc.clone();
        let counters = counters.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            doc.mark_ready();
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(counters.executed.load(Ordering::SeqCst), 1);

            // The action injects a marker on the next structural change.
            doc.append_to_body(&ElementSpec::new("div")).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert!(doc.query_str("[data-test-marker]").unwrap().is_some());

            doc.navigate("https://grafana.example.com/alerting/list");
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(counters.cleaned.load(Ordering::SeqCst), 1);
            let _ = stop_tx.send(());
        })
    };

    router
        .run(async {
            let _ = stop_rx.await;
        })
        .await;
    driver.await.unwrap();
    assert!(router.active_modules().is_empty());
    assert_eq!(counters.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_shuts_down_active_modules() {
    let doc = Arc::new(MemoryDocument::new("https://grafana.example.com/d/abc"));
    let counters = Arc::new(Counters::default());
    let mut router = router(&doc);
    router.register(descriptor(Kind::Dashboards, r"^/d/", &counters)).unwrap();

    router
        .run(async {
            tokio::time::sleep(Duration::from_millis(30)).await;
        })
        .await;
    assert!(router.active_modules().is_empty());
    assert_eq!(counters.cleaned.load(Ordering::SeqCst), 1);
}

fn permutations(items: &[&'static str]) -> Vec<Vec<&'static str>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for (i, &first) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, first);
            out.push(tail);
        }
    }
    out
}

#[tokio::test]
async fn every_navigation_order_keeps_one_instance_per_kind() {
    let locations = [
        "https://grafana.example.com/d/a",
        "https://grafana.example.com/d/b?orgId=1",
        "https://grafana.example.com/alerting/list",
        "https://grafana.example.com/explore",
        "https://other.example.com/d/a",
    ];
    let sequences = permutations(&locations);
    assert_eq!(sequences.len(), 120);

    for sequence in sequences {
        let doc = Arc::new(MemoryDocument::new("https://grafana.example.com/"));
        let counters = [
            (Kind::Dashboards, Arc::new(Counters::default())),
            (Kind::Alerting, Arc::new(Counters::default())),
            (Kind::Everywhere, Arc::new(Counters::default())),
        ];
        let mut router = router(&doc);
        router.register(descriptor(Kind::Dashboards, r"^/d/", &counters[0].1)).unwrap();
        router.register(descriptor(Kind::Alerting, r"^/alerting/list", &counters[1].1)).unwrap();
        router.register(descriptor(Kind::Everywhere, r"^/", &counters[2].1)).unwrap();

        for href in &sequence {
            doc.navigate(*href);
            router.poll_location();

            let active = router.active_modules();
            let unique: HashSet<Kind> = active.iter().copied().collect();
            assert_eq!(unique.len(), active.len(), "duplicate kind after {href} in {sequence:?}");

            for (kind, c) in &counters {
                let live = c.live.load(Ordering::SeqCst);
                assert_eq!(live, usize::from(active.contains(kind)), "{kind:?} after {href}");
                assert_eq!(
                    c.created.load(Ordering::SeqCst) - c.cleaned.load(Ordering::SeqCst),
                    live,
                    "{kind:?} after {href}"
                );
                assert!(c.max_live.load(Ordering::SeqCst) <= 1);
            }
        }

        router.shutdown();
        for (kind, c) in &counters {
            assert_eq!(c.live.load(Ordering::SeqCst), 0, "{kind:?} in {sequence:?}");
            assert_eq!(c.created.load(Ordering::SeqCst), c.cleaned.load(Ordering::SeqCst));
        }
    }
}
