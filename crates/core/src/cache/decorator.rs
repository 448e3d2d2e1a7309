//! Cache-aside fetch decorator
//!
//! Wraps a [`SportsDataProvider`] so every call reads the local tier, then
//! the shared tier, and only on a double miss goes upstream under the
//! per-key lock. A value produced upstream is written to both tiers before
//! the lock is released, so waiters find it on their next poll.
//!
//! When the lock cannot help (wait timed out, holder vanished without
//! caching, coordination store down) the caller fetches directly, without
//! caching. This trades duplicate upstream calls for availability; the
//! optional fallback gate bounds how many of those run at once.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use huddle_common::resilience::{Bulkhead, BulkheadConfig, BulkheadError};
use huddle_domain::{
    CachePolicy, DecoratorConfig, HuddleError, KeyArgs, PolicySettings, PolicyTable, Result,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::health::CacheHealthTracker;
use super::lock_manager::LockManager;
use super::ports::CacheTier;
use crate::provider::ports::SportsDataProvider;

/// Caching decorator over an upstream provider.
pub struct CachingDataProvider {
    upstream: Arc<dyn SportsDataProvider>,
    local: Arc<dyn CacheTier>,
    shared: Arc<dyn CacheTier>,
    locks: Arc<LockManager>,
    health: Arc<CacheHealthTracker>,
    policies: Arc<PolicyTable>,
    fallback_gate: Option<Bulkhead>,
    cancel: CancellationToken,
}

impl CachingDataProvider {
    pub fn new(
        upstream: Arc<dyn SportsDataProvider>,
        local: Arc<dyn CacheTier>,
        shared: Arc<dyn CacheTier>,
        locks: Arc<LockManager>,
        health: Arc<CacheHealthTracker>,
        policies: Arc<PolicyTable>,
    ) -> Self {
        Self {
            upstream,
            local,
            shared,
            locks,
            health,
            policies,
            fallback_gate: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Bound concurrent direct fetches made after a lock fallback.
    pub fn with_fallback_gate(mut self, gate: Bulkhead) -> Self {
        self.fallback_gate = Some(gate);
        self
    }

    /// Cancelling `token` ends every in-progress lock wait early.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Apply decorator settings.
    ///
    /// # Errors
    /// Returns `HuddleError::Config` for an invalid fallback gate size.
    pub fn configure(self, config: &DecoratorConfig) -> Result<Self> {
        let Some(max_concurrent) = config.fallback_concurrency else {
            return Ok(self);
        };

        let gate = Bulkhead::new(BulkheadConfig::new(
            max_concurrent,
            Some(config.fallback_acquire_timeout()),
        ))
        .map_err(|err| HuddleError::Config(err.to_string()))?;

        Ok(self.with_fallback_gate(gate))
    }

    pub fn health(&self) -> &Arc<CacheHealthTracker> {
        &self.health
    }

    pub fn policies(&self) -> &Arc<PolicyTable> {
        &self.policies
    }

    /// The raw provider behind the tiers.
    pub fn upstream(&self) -> &Arc<dyn SportsDataProvider> {
        &self.upstream
    }

    pub fn fallback_gate(&self) -> Option<&Bulkhead> {
        self.fallback_gate.as_ref()
    }

    /// Serve `policy`/`args` from cache, fetching upstream at most once per
    /// key across all callers while the lock is healthy.
    ///
    /// # Errors
    /// Upstream errors (`RateLimited`, `UpstreamUnavailable`) propagate
    /// unchanged. Coordination failures never reach the caller.
    pub async fn fetch<T, F, Fut>(&self, policy: CachePolicy, args: &KeyArgs, fetcher: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cache_name = policy.cache_name();
        let key = policy.key(args);
        let settings = self.policies.settings(policy);
        let started = Instant::now();

        if let Some(value) = self.lookup_as::<T>(cache_name, &key, settings).await {
            self.health.record_hit(cache_name);
            self.record_latency(cache_name, started);
            debug!(cache = cache_name, key = %key, "cache.hit");
            return Ok(value);
        }

        self.health.record_miss(cache_name);
        debug!(cache = cache_name, key = %key, "cache.miss");

        let key_ref = key.as_str();
        let fetcher = &fetcher;
        let lock = self.locks.config();

        let exclusive = self
            .locks
            .run_exclusive(
                key_ref,
                lock.lock_ttl,
                lock.wait_timeout,
                move || async move {
                    let value = fetcher().await?;
                    self.store(cache_name, key_ref, &value, settings).await;
                    Ok::<T, HuddleError>(value)
                },
                move || self.lookup_as::<T>(cache_name, key_ref, settings),
                &self.cancel,
            )
            .await;

        let value = match exclusive {
            Ok(Some(value)) => value,
            Ok(None) => {
                info!(cache = cache_name, key = %key, "cache.fallback_direct_fetch");
                self.fetch_direct(fetcher).await?
            }
            Err(err) if err.is_coordination_failure() => {
                warn!(
                    cache = cache_name,
                    key = %key,
                    error = %err,
                    "cache.fallback_direct_fetch_after_store_error"
                );
                self.fetch_direct(fetcher).await?
            }
            Err(err) => return Err(err),
        };

        self.record_latency(cache_name, started);
        Ok(value)
    }

    /// Fetch `policy`/`args` upstream and overwrite both tiers, whatever they
    /// currently hold.
    ///
    /// Used by warming: no tier lookup happens first and nothing is recorded
    /// in the health tracker. The upstream call runs under the per-key lock;
    /// when the lock cannot be had the fetch runs directly and is still
    /// written to both tiers.
    ///
    /// # Errors
    /// Upstream errors propagate unchanged and leave the tiers untouched.
    pub async fn refresh<T, F, Fut>(
        &self,
        policy: CachePolicy,
        args: &KeyArgs,
        fetcher: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cache_name = policy.cache_name();
        let key = policy.key(args);
        let settings = self.policies.settings(policy);

        let key_ref = key.as_str();
        let fetcher = &fetcher;
        let lock = self.locks.config();

        let exclusive = self
            .locks
            .run_exclusive(
                key_ref,
                lock.lock_ttl,
                lock.wait_timeout,
                move || async move {
                    let value = fetcher().await?;
                    self.store(cache_name, key_ref, &value, settings).await;
                    Ok::<T, HuddleError>(value)
                },
                || async { None::<T> },
                &self.cancel,
            )
            .await;

        match exclusive {
            Ok(Some(value)) => {
                debug!(cache = cache_name, key = %key, "cache.refreshed");
                return Ok(value);
            }
            Ok(None) => {
                info!(cache = cache_name, key = %key, "cache.refresh_without_lock");
            }
            Err(err) if err.is_coordination_failure() => {
                warn!(
                    cache = cache_name,
                    key = %key,
                    error = %err,
                    "cache.refresh_without_lock_after_store_error"
                );
            }
            Err(err) => return Err(err),
        }

        let value = self.fetch_direct(fetcher).await?;
        self.store(cache_name, key_ref, &value, settings).await;
        Ok(value)
    }

    async fn fetch_direct<T, F, Fut>(&self, fetcher: &F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(gate) = &self.fallback_gate else {
            return fetcher().await;
        };

        gate.execute(fetcher).await.map_err(|err| match err {
            BulkheadError::Operation(inner) => inner,
            rejected => {
                warn!(error = %rejected, "cache.fallback_gate_rejected");
                HuddleError::UpstreamUnavailable(format!("fallback fetch rejected: {rejected}"))
            }
        })
    }

    /// Local tier, then shared tier with promotion into local.
    async fn lookup(&self, cache_name: &str, key: &str, settings: PolicySettings) -> Option<Value> {
        if let Some(value) = read_tier(self.local.as_ref(), cache_name, key).await {
            return Some(value);
        }

        let value = read_tier(self.shared.as_ref(), cache_name, key).await?;
        if let Err(err) = self.local.put(cache_name, key, value.clone(), settings.local_ttl).await {
            warn!(cache = cache_name, key, error = %err, "cache.promote_failed");
        }
        Some(value)
    }

    async fn lookup_as<T: DeserializeOwned>(
        &self,
        cache_name: &str,
        key: &str,
        settings: PolicySettings,
    ) -> Option<T> {
        let raw = self.lookup(cache_name, key, settings).await?;
        match serde_json::from_value(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(cache = cache_name, key, error = %err, "cache.decode_failed");
                None
            }
        }
    }

    /// Write to both tiers. Failures are logged, never returned.
    async fn store<T: Serialize>(
        &self,
        cache_name: &str,
        key: &str,
        value: &T,
        settings: PolicySettings,
    ) {
        let value = match serde_json::to_value(value) {
            Ok(Value::Null) => {
                debug!(cache = cache_name, key, "cache.skip_null");
                return;
            }
            Ok(value) => value,
            Err(err) => {
                warn!(cache = cache_name, key, error = %err, "cache.encode_failed");
                return;
            }
        };

        if let Err(err) =
            self.shared.put(cache_name, key, value.clone(), settings.shared_ttl).await
        {
            warn!(cache = cache_name, key, tier = self.shared.tier_name(), error = %err, "cache.store_failed");
        }
        if let Err(err) = self.local.put(cache_name, key, value, settings.local_ttl).await {
            warn!(cache = cache_name, key, tier = self.local.tier_name(), error = %err, "cache.store_failed");
        }
    }

    fn record_latency(&self, cache_name: &str, started: Instant) {
        let millis = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.health.record_response_time(cache_name, millis);
    }

    /// Evict one key from both tiers.
    ///
    /// # Errors
    /// Returns the first tier error after attempting both tiers.
    pub async fn invalidate(&self, cache_name: &str, key: &str) -> Result<()> {
        let local = self.local.evict(cache_name, key).await;
        let shared = self.shared.evict(cache_name, key).await;
        info!(cache = cache_name, key, "cache.invalidated");
        local.and(shared)
    }

    /// Drop every entry of `cache_name` from both tiers.
    ///
    /// # Errors
    /// Returns the first tier error after attempting both tiers.
    pub async fn invalidate_all(&self, cache_name: &str) -> Result<()> {
        let local = self.local.clear(cache_name).await;
        let shared = self.shared.clear(cache_name).await;
        info!(cache = cache_name, "cache.cleared");
        local.and(shared)
    }

    /// Clear every configured cache name. Returns the names that failed.
    pub async fn clear_all(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for cache_name in self.policies.cache_names() {
            if let Err(err) = self.invalidate_all(cache_name).await {
                warn!(cache = cache_name, error = %err, "cache.clear_failed");
                failed.push(cache_name.to_string());
            }
        }
        info!(failed = failed.len(), "cache.clear_all_completed");
        failed
    }
}

/// Tier read where errors and cached nulls count as a miss.
async fn read_tier(tier: &dyn CacheTier, cache_name: &str, key: &str) -> Option<Value> {
    match tier.get(cache_name, key).await {
        Ok(Some(Value::Null)) | Ok(None) => None,
        Ok(Some(value)) => Some(value),
        Err(err) => {
            warn!(cache = cache_name, key, tier = tier.tier_name(), error = %err, "cache.read_failed");
            None
        }
    }
}

#[async_trait]
impl SportsDataProvider for CachingDataProvider {
    async fn playoff_teams(&self, season: i32) -> Result<Vec<String>> {
        self.fetch(CachePolicy::PlayoffTeams, &KeyArgs::season(season), || {
            self.upstream.playoff_teams(season)
        })
        .await
    }

    async fn week_schedule(&self, week: u32, season: i32) -> Result<Value> {
        self.fetch(CachePolicy::Schedule, &KeyArgs::week(week, season), || {
            self.upstream.week_schedule(week, season)
        })
        .await
    }

    async fn team_player_stats(&self, team: &str, week: u32, season: i32) -> Result<Value> {
        self.fetch(CachePolicy::TeamStats, &KeyArgs::team_week(team, week, season), || {
            self.upstream.team_player_stats(team, week, season)
        })
        .await
    }

    async fn weekly_stats(&self, week: u32, season: i32) -> Result<Value> {
        self.fetch(CachePolicy::LiveStats, &KeyArgs::week(week, season), || {
            self.upstream.weekly_stats(week, season)
        })
        .await
    }

    async fn player_profile(&self, player_id: &str) -> Result<Value> {
        self.fetch(CachePolicy::PlayerProfile, &KeyArgs::player(player_id), || {
            self.upstream.player_profile(player_id)
        })
        .await
    }

    async fn player_news(&self, player_id: &str) -> Result<Value> {
        self.fetch(CachePolicy::News, &KeyArgs::player(player_id), || {
            self.upstream.player_news(player_id)
        })
        .await
    }

    async fn injury_status(&self, player_id: &str) -> Result<Value> {
        self.fetch(CachePolicy::InjuryReport, &KeyArgs::player(player_id), || {
            self.upstream.injury_status(player_id)
        })
        .await
    }

    async fn team_roster(&self, team: &str, season: i32) -> Result<Value> {
        self.fetch(CachePolicy::TeamRoster, &KeyArgs::team_season(team, season), || {
            self.upstream.team_roster(team, season)
        })
        .await
    }

    async fn search_players(&self, query: &str) -> Result<Value> {
        self.fetch(CachePolicy::Search, &KeyArgs::query(query), || {
            self.upstream.search_players(query)
        })
        .await
    }
}
