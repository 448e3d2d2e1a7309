//! Cache warming service
//!
//! Refreshes data upstream and writes it into both tiers ahead of peak
//! traffic, so the first requests of a game window hit the cache. Refreshes
//! bypass the tier lookup and the hit/miss counters. Only one run is
//! active per service at a time; a second request while one is in flight is
//! skipped, never queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use huddle_common::time::{Clock, SystemClock};
use huddle_domain::{
    CachePolicy, KeyArgs, Result, WarmingConfig, WarmingKind, WarmingOutcome, WarmingReport,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cache::decorator::CachingDataProvider;

/// Resets the in-progress flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
}

/// Cache warming service.
pub struct CacheWarmingService {
    provider: Arc<CachingDataProvider>,
    config: WarmingConfig,
    clock: Arc<dyn Clock>,
    in_progress: AtomicBool,
}

impl CacheWarmingService {
    pub fn new(provider: Arc<CachingDataProvider>, config: WarmingConfig) -> Self {
        Self::with_clock(provider, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        provider: Arc<CachingDataProvider>,
        config: WarmingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { provider, config, clock, in_progress: AtomicBool::new(false) }
    }

    pub fn config(&self) -> &WarmingConfig {
        &self.config
    }

    pub fn is_warming_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// NFL week for today's date in the configured time zone.
    pub fn current_week(&self) -> u32 {
        let today = self.clock.utc_now().with_timezone(&self.config.timezone).date_naive();
        self.config.week_on(today)
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.in_progress))
    }

    /// Run the routine for `kind`.
    pub async fn warm(&self, kind: WarmingKind) -> WarmingOutcome {
        match kind {
            WarmingKind::GameDay => self.warm_game_day().await,
            WarmingKind::Daily => self.warm_daily().await,
        }
    }

    /// Playoff teams, the current week's schedule, then per-team player
    /// stats for every playoff team.
    pub async fn warm_game_day(&self) -> WarmingOutcome {
        let Some(_guard) = self.try_begin() else {
            warn!(kind = %WarmingKind::GameDay, "warming.skipped_already_running");
            return WarmingOutcome::Skipped;
        };

        let started = Instant::now();
        let week = self.current_week();
        let season = self.config.season;
        info!(kind = %WarmingKind::GameDay, week, season, "warming.started");

        let mut tally = Tally::default();
        let teams = self.warm_playoff_teams(&mut tally).await;
        self.warm_week_schedule(week, &mut tally).await;
        match teams {
            Some(teams) => self.warm_team_player_stats(&teams, week, &mut tally).await,
            None => debug!(week, "warming.team_stats_skipped_no_teams"),
        }

        self.finish(WarmingKind::GameDay, Some(week), tally, started)
    }

    /// Playoff teams only.
    pub async fn warm_daily(&self) -> WarmingOutcome {
        let Some(_guard) = self.try_begin() else {
            warn!(kind = %WarmingKind::Daily, "warming.skipped_already_running");
            return WarmingOutcome::Skipped;
        };

        let started = Instant::now();
        info!(kind = %WarmingKind::Daily, season = self.config.season, "warming.started");

        let mut tally = Tally::default();
        self.warm_playoff_teams(&mut tally).await;

        self.finish(WarmingKind::Daily, None, tally, started)
    }

    /// Admin entry point; same skip rule as scheduled runs.
    pub async fn trigger_manual_warming(&self) -> WarmingOutcome {
        info!("warming.manual_trigger");
        self.warm_game_day().await
    }

    /// Clear every cache name in both tiers. Returns the names that failed.
    pub async fn clear_all_caches(&self) -> Vec<String> {
        info!("warming.clear_all_caches");
        self.provider.clear_all().await
    }

    fn finish(
        &self,
        kind: WarmingKind,
        week: Option<u32>,
        tally: Tally,
        started: Instant,
    ) -> WarmingOutcome {
        let report = WarmingReport {
            kind,
            week,
            succeeded: tally.succeeded,
            failed: tally.failed,
            duration: started.elapsed(),
        };

        info!(
            kind = %report.kind,
            week = ?report.week,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.duration.as_millis() as u64,
            "warming.completed"
        );
        WarmingOutcome::Completed(report)
    }

    async fn warm_playoff_teams(&self, tally: &mut Tally) -> Option<Vec<String>> {
        let season = self.config.season;
        let upstream = self.provider.upstream();
        let refreshed = self
            .provider
            .refresh(CachePolicy::PlayoffTeams, &KeyArgs::season(season), || {
                upstream.playoff_teams(season)
            })
            .await;

        match refreshed {
            Ok(teams) => {
                tally.succeeded += 1;
                info!(teams = teams.len(), "warming.playoff_teams_cached");
                Some(teams)
            }
            Err(err) => {
                tally.failed += 1;
                error!(error = %err, "warming.playoff_teams_failed");
                None
            }
        }
    }

    async fn warm_week_schedule(&self, week: u32, tally: &mut Tally) {
        let season = self.config.season;
        let upstream = self.provider.upstream();
        let refreshed: Result<Value> = self
            .provider
            .refresh(CachePolicy::Schedule, &KeyArgs::week(week, season), || {
                upstream.week_schedule(week, season)
            })
            .await;

        match refreshed {
            Ok(_) => {
                tally.succeeded += 1;
                info!(week, "warming.schedule_cached");
            }
            Err(err) => {
                tally.failed += 1;
                error!(week, error = %err, "warming.schedule_failed");
            }
        }
    }

    async fn warm_team_player_stats(&self, teams: &[String], week: u32, tally: &mut Tally) {
        let delay = self.config.inter_call_delay();
        let season = self.config.season;
        let upstream = self.provider.upstream();

        for (index, team) in teams.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            debug!(team = %team, week, "warming.team_stats");
            let refreshed: Result<Value> = self
                .provider
                .refresh(CachePolicy::TeamStats, &KeyArgs::team_week(team, week, season), || {
                    upstream.team_player_stats(team, week, season)
                })
                .await;

            match refreshed {
                Ok(_) => tally.succeeded += 1,
                Err(err) => {
                    tally.failed += 1;
                    error!(team = %team, week, error = %err, "warming.team_stats_failed");
                }
            }
        }

        info!(teams = teams.len(), week, "warming.team_stats_cached");
    }
}
