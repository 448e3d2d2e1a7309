//! Behaviour of the coordination lock manager against an in-memory store.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use huddle_core::LockManager;
use huddle_domain::HuddleError;
use parking_lot::Mutex;
use support::{fast_lock_config, FakeCoordinationStore};
use tokio_util::sync::CancellationToken;

fn manager() -> (Arc<FakeCoordinationStore>, Arc<LockManager>) {
    let store = Arc::new(FakeCoordinationStore::default());
    let locks = Arc::new(LockManager::new(store.clone(), fast_lock_config()));
    (store, locks)
}

const TTL: Duration = Duration::from_secs(30);

fn upstream_client_is_broken() -> bool {
    true
}

#[tokio::test]
async fn holder_runs_work_and_releases() {
    let (store, locks) = manager();
    let cancel = CancellationToken::new();

    let result = locks
        .run_exclusive(
            "schedule:week=5,season=2024",
            TTL,
            Duration::from_secs(1),
            || async { Ok(7) },
            || async { None },
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(result, Some(7));
    assert_eq!(store.acquisitions(), 1);
    assert!(store.value("lock:schedule:week=5,season=2024").is_none());
}

#[tokio::test]
async fn holder_returns_peeked_value_without_working() {
    let (_store, locks) = manager();
    let worked = AtomicUsize::new(0);

    let result = locks
        .run_exclusive(
            "k",
            TTL,
            Duration::from_secs(1),
            || async {
                worked.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            },
            || async { Some(99) },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, Some(99));
    assert_eq!(worked.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn work_error_propagates_after_release() {
    let (store, locks) = manager();

    let err = locks
        .run_exclusive(
            "k",
            TTL,
            Duration::from_secs(1),
            || async { Err::<u32, _>(HuddleError::RateLimited("429".into())) },
            || async { None },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    assert!(store.value("lock:k").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn waiter_is_served_by_holder_result() {
    let (_store, locks) = manager();
    let cache: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));

    let holder = {
        let locks = locks.clone();
        let cache = cache.clone();
        tokio::spawn(async move {
            let peek_cache = cache.clone();
            locks
                .run_exclusive(
                    "k",
                    TTL,
                    Duration::from_secs(1),
                    || async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        *cache.lock() = Some(42);
                        Ok(42)
                    },
                    move || {
                        let value = *peek_cache.lock();
                        async move { value }
                    },
                    &CancellationToken::new(),
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    let peek_cache = cache.clone();
    let waited = locks
        .run_exclusive(
            "k",
            TTL,
            Duration::from_secs(2),
            || async { Err(HuddleError::Internal("waiter must not run work".into())) },
            move || {
                let value = *peek_cache.lock();
                async move { value }
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(waited, Some(42));
    assert_eq!(holder.await.unwrap().unwrap(), Some(42));
}

#[tokio::test]
async fn released_without_cache_returns_none() {
    let (store, locks) = manager();
    store.overwrite("lock:k", "someone-else", Duration::from_millis(60));

    let started = Instant::now();
    let result = locks
        .run_exclusive(
            "k",
            TTL,
            Duration::from_secs(2),
            || async { Ok(1) },
            || async { None::<u32> },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, None);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn wait_timeout_returns_none() {
    let (store, locks) = manager();
    store.overwrite("lock:k", "someone-else", Duration::from_secs(30));

    let started = Instant::now();
    let result = locks
        .run_exclusive(
            "k",
            TTL,
            Duration::from_millis(100),
            || async { Ok(1) },
            || async { None::<u32> },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, None);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(1));
}

#[tokio::test]
async fn cancellation_ends_wait_early() {
    let (store, locks) = manager();
    store.overwrite("lock:k", "someone-else", Duration::from_secs(30));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = locks
        .run_exclusive(
            "k",
            TTL,
            Duration::from_secs(10),
            || async { Ok(1) },
            || async { None::<u32> },
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(result, None);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn release_does_not_remove_a_lock_taken_over_by_another_owner() {
    let (store, locks) = manager();
    let takeover = store.clone();

    let result = locks
        .run_exclusive(
            "k",
            TTL,
            Duration::from_secs(1),
            || async move {
                // Our lock expired and another process acquired it
                takeover.overwrite("lock:k", "other-owner", Duration::from_secs(30));
                Ok(5)
            },
            || async { None },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, Some(5));
    assert_eq!(store.value("lock:k").as_deref(), Some("other-owner"));
}

#[tokio::test]
async fn store_outage_is_a_coordination_error() {
    let (store, locks) = manager();
    store.set_unavailable(true);

    let err = locks
        .run_exclusive(
            "k",
            TTL,
            Duration::from_secs(1),
            || async { Ok(1) },
            || async { None::<u32> },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.is_coordination_failure());
    assert!(locks.is_locked("k").await.unwrap_err().is_coordination_failure());
}

#[tokio::test]
async fn outage_while_waiting_is_a_coordination_error() {
    let (store, locks) = manager();
    store.overwrite("lock:k", "someone-else", Duration::from_secs(30));

    let outage = store.clone();
    let err = locks
        .run_exclusive(
            "k",
            TTL,
            Duration::from_secs(2),
            || async { Ok(1) },
            move || {
                outage.set_unavailable(true);
                async { None::<u32> }
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.is_coordination_failure());
}

#[tokio::test]
async fn try_lock_is_locked_and_force_release() {
    let (_store, locks) = manager();

    assert!(locks.try_lock("admin", TTL).await.unwrap());
    assert!(!locks.try_lock("admin", TTL).await.unwrap());
    assert!(locks.is_locked("admin").await.unwrap());

    locks.force_release("admin").await.unwrap();
    assert!(!locks.is_locked("admin").await.unwrap());
    // Releasing an absent lock is not an error
    locks.force_release("admin").await.unwrap();
}

#[tokio::test]
async fn lock_expires_after_ttl() {
    let (_store, locks) = manager();
    assert!(locks.try_lock("short", Duration::from_millis(30)).await.unwrap());
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!locks.is_locked("short").await.unwrap());
}

#[tokio::test]
async fn panicking_work_still_releases() {
    let (store, locks) = manager();

    let task = {
        let locks = locks.clone();
        tokio::spawn(async move {
            locks
                .run_exclusive(
                    "k",
                    TTL,
                    Duration::from_secs(1),
                    || async {
                        if upstream_client_is_broken() {
                            panic!("upstream client bug");
                        }
                        Ok(0)
                    },
                    || async { None::<u32> },
                    &CancellationToken::new(),
                )
                .await
        })
    };

    assert!(task.await.unwrap_err().is_panic());
    assert!(store.value("lock:k").is_none());
}

#[tokio::test]
async fn default_settings_come_from_config() {
    let (_store, locks) = manager();
    let result = locks
        .run_exclusive_default("k", || async { Ok("v") }, || async { None }, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result, Some("v"));
    assert_eq!(locks.store_key("k"), "lock:k");
}
