//! Per-cache hit/miss and latency counters
//!
//! Counters are created on first touch and only cleared by `reset`. Every
//! operation is lock-free apart from the map shard lookup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use huddle_domain::{CacheStatsSnapshot, HealthStatus, HealthThresholds};
use tracing::{info, warn};

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    total_response_ms: AtomicU64,
    response_count: AtomicU64,
}

impl CacheCounters {
    fn snapshot(&self, cache_name: &str) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            cache_name: cache_name.to_string(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            total_response_ms: self.total_response_ms.load(Ordering::Relaxed),
            response_count: self.response_count.load(Ordering::Relaxed),
        }
    }
}

/// Cache health tracker.
#[derive(Debug, Default)]
pub struct CacheHealthTracker {
    counters: DashMap<String, Arc<CacheCounters>>,
    thresholds: HealthThresholds,
}

impl CacheHealthTracker {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self { counters: DashMap::new(), thresholds }
    }

    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds
    }

    fn counters(&self, cache_name: &str) -> Arc<CacheCounters> {
        if let Some(counters) = self.counters.get(cache_name) {
            return Arc::clone(counters.value());
        }
        Arc::clone(self.counters.entry(cache_name.to_string()).or_default().value())
    }

    pub fn record_hit(&self, cache_name: &str) {
        self.counters(cache_name).hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self, cache_name: &str) {
        self.counters(cache_name).misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, cache_name: &str, millis: u64) {
        let counters = self.counters(cache_name);
        counters.total_response_ms.fetch_add(millis, Ordering::Relaxed);
        counters.response_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Hit ratio for one cache, 0.0 without samples.
    pub fn hit_ratio(&self, cache_name: &str) -> f64 {
        self.snapshot(cache_name).map_or(0.0, |snapshot| snapshot.hit_ratio())
    }

    /// Hit ratio across every cache, 0.0 without samples.
    pub fn overall_hit_ratio(&self) -> f64 {
        let (hits, requests) = self.totals();
        if requests == 0 {
            return 0.0;
        }
        hits as f64 / requests as f64
    }

    fn totals(&self) -> (u64, u64) {
        self.counters.iter().fold((0, 0), |(hits, requests), entry| {
            let h = entry.hits.load(Ordering::Relaxed);
            let m = entry.misses.load(Ordering::Relaxed);
            (hits + h, requests + h + m)
        })
    }

    pub fn snapshot(&self, cache_name: &str) -> Option<CacheStatsSnapshot> {
        self.counters.get(cache_name).map(|counters| counters.snapshot(cache_name))
    }

    /// Snapshots for every cache seen so far, sorted by name.
    pub fn all_stats(&self) -> Vec<CacheStatsSnapshot> {
        let mut stats: Vec<_> =
            self.counters.iter().map(|entry| entry.value().snapshot(entry.key())).collect();
        stats.sort_by(|a, b| a.cache_name.cmp(&b.cache_name));
        stats
    }

    /// Compare the overall hit ratio with the alert threshold.
    ///
    /// Degraded checks warn once per cache that is itself under the
    /// threshold.
    pub fn check_health(&self) -> HealthStatus {
        let (_, requests) = self.totals();
        if requests == 0 {
            info!("cache.health_no_samples");
            return HealthStatus::NoSamples;
        }

        let overall = self.overall_hit_ratio();
        let HealthThresholds { alert, target } = self.thresholds;

        if overall < alert {
            let below_alert: Vec<_> = self
                .all_stats()
                .into_iter()
                .filter(|stats| stats.requests() > 0 && stats.hit_ratio() < alert)
                .collect();

            for stats in &below_alert {
                warn!(
                    cache = %stats.cache_name,
                    hit_ratio = stats.hit_ratio(),
                    hits = stats.hits,
                    misses = stats.misses,
                    alert_threshold = alert,
                    "cache.hit_ratio_below_threshold"
                );
            }
            warn!(overall_hit_ratio = overall, alert_threshold = alert, "cache.health_degraded");

            return HealthStatus::Degraded { overall_hit_ratio: overall, alert, below_alert };
        }

        info!(overall_hit_ratio = overall, target, "cache.health_ok");
        HealthStatus::Healthy { overall_hit_ratio: overall, target }
    }

    /// Log and return per-cache statistics.
    pub fn detailed_report(&self) -> Vec<CacheStatsSnapshot> {
        let stats = self.all_stats();

        info!(
            caches = stats.len(),
            overall_hit_ratio = self.overall_hit_ratio(),
            "=== Cache Metrics Report ==="
        );
        for entry in &stats {
            info!(
                cache = %entry.cache_name,
                hits = entry.hits,
                misses = entry.misses,
                hit_ratio = entry.hit_ratio(),
                avg_response_ms = entry.average_response_ms(),
                "cache.report_entry"
            );
        }

        stats
    }

    pub fn reset(&self) {
        self.counters.clear();
        info!("cache.metrics_reset");
    }
}
