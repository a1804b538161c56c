//! Tests for single-flight request coalescing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use vasari_cache::{CoalesceErrorKind, InFlightRegistry};

/// Work that counts its invocations and finishes when released.
#[derive(Clone, Default)]
struct Gate {
    calls: Arc<AtomicUsize>,
    release: Arc<Notify>,
}

impl Gate {
    fn work(&self, value: u32) -> impl std::future::Future<Output = u32> + Send + 'static {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let release = Arc::clone(&self.release);
        async move {
            release.notified().await;
            value
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

async fn explode(release: Arc<Notify>) -> u32 {
    release.notified().await;
    panic!("backend exploded")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_computation() {
    let registry: InFlightRegistry<u32> = InFlightRegistry::new();
    let gate = Gate::default();

    let first = {
        let registry = registry.clone();
        let gate = gate.clone();
        tokio::spawn(async move { registry.run("abc.jpg", || gate.work(1)).await })
    };
    wait_until(|| registry.contains("abc.jpg")).await;

    let followers: Vec<_> = (0..15)
        .map(|i| {
            let registry = registry.clone();
            let gate = gate.clone();
            tokio::spawn(async move { registry.run("abc.jpg", || gate.work(100 + i)).await })
        })
        .collect();

    // Give the followers time to attach before releasing the computation
    tokio::time::sleep(Duration::from_millis(50)).await;
    gate.release.notify_one();

    assert_eq!(first.await.unwrap().unwrap(), 1);
    for follower in followers {
        assert_eq!(follower.await.unwrap().unwrap(), 1);
    }
    assert_eq!(gate.calls(), 1);
    assert_eq!(registry.in_flight(), 0);
}

#[tokio::test]
async fn test_ticket_removed_after_completion() {
    let registry: InFlightRegistry<u32> = InFlightRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));

    for expected in 1..=3 {
        let calls = Arc::clone(&calls);
        let value = registry
            .run("abc.jpg", || async move { calls.fetch_add(1, Ordering::SeqCst) as u32 + 1 })
            .await
            .unwrap();
        assert_eq!(value, expected);
        assert!(!registry.contains("abc.jpg"));
    }
}

#[tokio::test]
async fn test_keys_are_case_insensitive() {
    let registry: InFlightRegistry<u32> = InFlightRegistry::new();
    let gate = Gate::default();

    let first = {
        let registry = registry.clone();
        let gate = gate.clone();
        tokio::spawn(async move { registry.run("Photos/ABC.jpg", || gate.work(1)).await })
    };
    wait_until(|| registry.contains("photos/abc.JPG")).await;

    let second = {
        let registry = registry.clone();
        let gate = gate.clone();
        tokio::spawn(async move { registry.run("photos/abc.jpg", || gate.work(2)).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.release.notify_one();

    assert_eq!(first.await.unwrap().unwrap(), 1);
    assert_eq!(second.await.unwrap().unwrap(), 1);
    assert_eq!(gate.calls(), 1);
}

#[tokio::test]
async fn test_distinct_keys_run_independently() {
    let registry: InFlightRegistry<&'static str> = InFlightRegistry::new();

    let (a, b) = tokio::join!(
        registry.run("a.jpg", || async { "a" }),
        registry.run("b.jpg", || async { "b" }),
    );

    assert_eq!(a.unwrap(), "a");
    assert_eq!(b.unwrap(), "b");
    assert_eq!(registry.in_flight(), 0);
}

#[tokio::test]
async fn test_panic_reaches_every_waiter_and_clears_ticket() {
    let registry: InFlightRegistry<u32> = InFlightRegistry::new();
    let release = Arc::new(Notify::new());

    let first = {
        let registry = registry.clone();
        let release = Arc::clone(&release);
        tokio::spawn(async move {
            registry
                .run("broken.jpg", || explode(release))
                .await
        })
    };
    wait_until(|| registry.contains("broken.jpg")).await;

    let second = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.run("broken.jpg", || async { 0 }).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    release.notify_one();

    for waiter in [first, second] {
        let err = waiter.await.unwrap().unwrap_err();
        match err.kind {
            CoalesceErrorKind::Panicked { key, message } => {
                assert_eq!(key, "broken.jpg");
                assert_eq!(message, "backend exploded");
            }
            other => panic!("unexpected error kind: {:?}", other),
        }
    }

    assert!(!registry.contains("broken.jpg"));
    assert_eq!(registry.run("broken.jpg", || async { 5 }).await.unwrap(), 5);
}

#[tokio::test]
async fn test_disconnected_waiter_does_not_cancel_computation() {
    let registry: InFlightRegistry<u32> = InFlightRegistry::new();
    let gate = Gate::default();
    let finished = Arc::new(AtomicUsize::new(0));

    let first = {
        let registry = registry.clone();
        let gate = gate.clone();
        let finished = Arc::clone(&finished);
        tokio::spawn(async move {
            registry
                .run("abc.jpg", || {
                    let work = gate.work(9);
                    async move {
                        let value = work.await;
                        finished.fetch_add(1, Ordering::SeqCst);
                        value
                    }
                })
                .await
        })
    };
    wait_until(|| registry.contains("abc.jpg")).await;

    // The only waiter goes away
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());
    assert!(registry.contains("abc.jpg"));

    // A new caller joins the computation that is still running
    let second = {
        let registry = registry.clone();
        let gate = gate.clone();
        tokio::spawn(async move { registry.run("abc.jpg", || gate.work(10)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.release.notify_one();

    assert_eq!(second.await.unwrap().unwrap(), 9);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(gate.calls(), 1);
    wait_until(|| !registry.contains("abc.jpg")).await;
}
