//! Lifecycle of the warming scheduler and the health monitor.

mod support;

use std::sync::Arc;
use std::time::Duration;

use huddle_core::{
    CacheHealthTracker, CacheWarmingService, CachingDataProvider, LockManager, LockManagerConfig,
};
use huddle_domain::{HealthStatus, HealthThresholds, PolicyTable, WarmingKind, WarmingRule};
use huddle_infra::{
    HealthMonitor, HealthMonitorConfig, InMemoryStore, MokaCacheTier, SchedulerError,
    WarmingScheduler, WarmingSchedulerConfig,
};
use support::{test_config, CountingProvider};

fn warming_service(upstream: Arc<CountingProvider>) -> Arc<CacheWarmingService> {
    let config = test_config();
    let policies = Arc::new(PolicyTable::default());
    let store = Arc::new(InMemoryStore::new());
    let provider = CachingDataProvider::new(
        upstream,
        Arc::new(MokaCacheTier::new(Arc::clone(&policies))),
        store.clone(),
        Arc::new(LockManager::new(store, LockManagerConfig::from(&config.lock))),
        Arc::new(CacheHealthTracker::default()),
        policies,
    );
    Arc::new(CacheWarmingService::new(Arc::new(provider), config.warming))
}

fn fast_config(rules: Vec<WarmingRule>) -> WarmingSchedulerConfig {
    WarmingSchedulerConfig {
        enabled: true,
        rules,
        timezone: chrono_tz::America::New_York,
        job_timeout: Duration::from_secs(2),
        start_timeout: Duration::from_secs(2),
        stop_timeout: Duration::from_secs(2),
        join_timeout: Duration::from_secs(2),
    }
}

fn every_second(kind: WarmingKind) -> Vec<WarmingRule> {
    vec![WarmingRule::new("every-second", "*/1 * * * * *", kind)]
}

#[tokio::test(flavor = "multi_thread")]
async fn fired_rule_warms_the_cache() {
    let upstream = Arc::new(CountingProvider::new(Duration::from_millis(1)));
    let service = warming_service(upstream.clone());
    let mut scheduler =
        WarmingScheduler::with_config(fast_config(every_second(WarmingKind::Daily)), service)
            .await
            .expect("scheduler created");

    scheduler.start().await.expect("start succeeds");
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    scheduler.stop().await.expect("stop succeeds");

    // Every firing refreshes the playoff teams upstream
    let fired = upstream.calls();
    assert!(fired >= 1, "no warming run fired");
    assert!(!scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(upstream.calls(), fired);
}

#[tokio::test(flavor = "multi_thread")]
async fn double_start_is_rejected() {
    let service = warming_service(Arc::new(CountingProvider::new(Duration::ZERO)));
    let mut scheduler =
        WarmingScheduler::with_config(fast_config(every_second(WarmingKind::Daily)), service)
            .await
            .expect("scheduler created");

    scheduler.start().await.expect("first start");
    let err = scheduler.start().await.expect_err("second start fails");
    assert!(matches!(err, SchedulerError::AlreadyRunning));
    scheduler.stop().await.expect("stop succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_without_start_is_rejected() {
    let service = warming_service(Arc::new(CountingProvider::new(Duration::ZERO)));
    let mut scheduler = WarmingScheduler::with_config(fast_config(Vec::new()), service)
        .await
        .expect("scheduler created");

    let err = scheduler.stop().await.expect_err("not running");
    assert!(matches!(err, SchedulerError::NotRunning));
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_after_stop_succeeds() {
    let service = warming_service(Arc::new(CountingProvider::new(Duration::ZERO)));
    let mut scheduler =
        WarmingScheduler::with_config(fast_config(every_second(WarmingKind::GameDay)), service)
            .await
            .expect("scheduler created");

    scheduler.start().await.expect("start succeeds");
    scheduler.stop().await.expect("stop succeeds");
    assert!(!scheduler.is_running());

    scheduler.start().await.expect("start again");
    assert_eq!(scheduler.registered_rules().len(), 1);
    scheduler.stop().await.expect("stop again");
}

#[tokio::test(flavor = "multi_thread")]
async fn default_rules_register_in_eastern_time() {
    let service = warming_service(Arc::new(CountingProvider::new(Duration::ZERO)));
    let scheduler = WarmingScheduler::with_config(WarmingSchedulerConfig::default(), service)
        .await
        .expect("scheduler created");

    let names: Vec<_> = scheduler.registered_rules().iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["sunday-pregame", "thursday-night", "monday-night", "daily-refresh"]);
    assert_eq!(scheduler.config().timezone, chrono_tz::America::New_York);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_cron_fails_construction() {
    let service = warming_service(Arc::new(CountingProvider::new(Duration::ZERO)));
    let rules = vec![WarmingRule::new("broken", "every sunday at noon", WarmingKind::GameDay)];

    let result = WarmingScheduler::with_config(fast_config(rules), service).await;
    match result {
        Err(SchedulerError::JobRegistrationFailed { rule, .. }) => assert_eq!(rule, "broken"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("malformed cron accepted"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_config_registers_nothing() {
    let service = warming_service(Arc::new(CountingProvider::new(Duration::ZERO)));
    let mut config = fast_config(every_second(WarmingKind::Daily));
    config.enabled = false;

    let scheduler = WarmingScheduler::with_config(config, service).await.expect("created");
    assert!(scheduler.registered_rules().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_monitor_publishes_checks() {
    let tracker = Arc::new(CacheHealthTracker::new(HealthThresholds::default()));
    tracker.record_hit("schedule");
    tracker.record_miss("schedule");
    tracker.record_miss("schedule");

    let mut monitor = HealthMonitor::new(
        Arc::clone(&tracker),
        HealthMonitorConfig {
            check_interval: Duration::from_millis(20),
            report_interval: Duration::from_millis(50),
            join_timeout: Duration::from_secs(2),
        },
    );
    let mut updates = monitor.subscribe();
    assert_eq!(monitor.latest_status(), HealthStatus::NoSamples);

    monitor.start().await.expect("start succeeds");
    tokio::time::timeout(Duration::from_secs(2), updates.changed())
        .await
        .expect("check ran in time")
        .expect("sender alive");

    assert!(monitor.latest_status().is_degraded());

    let err = monitor.start().await.expect_err("already running");
    assert!(matches!(err, SchedulerError::AlreadyRunning));

    monitor.stop().await.expect("stop succeeds");
    assert!(!monitor.is_running());
}
