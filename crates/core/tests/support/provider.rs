//! Scriptable upstream provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use huddle_core::SportsDataProvider;
use huddle_domain::{HuddleError, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Counts every call and answers with deterministic payloads.
#[derive(Default)]
pub struct FakeProvider {
    calls: AtomicUsize,
    latency: Duration,
    teams: Mutex<Vec<String>>,
    failure: Mutex<Option<HuddleError>>,
    failing_teams: Vec<String>,
    log: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            teams: Mutex::new(vec!["KC".into(), "BUF".into(), "DET".into()]),
            ..Default::default()
        }
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_teams(self, teams: &[&str]) -> Self {
        self.set_teams(teams);
        self
    }

    /// Change the playoff picture between calls.
    pub fn set_teams(&self, teams: &[&str]) {
        *self.teams.lock() = teams.iter().map(|t| (*t).to_string()).collect();
    }

    /// `team_player_stats` fails for these teams only.
    pub fn with_failing_teams(mut self, teams: &[&str]) -> Self {
        self.failing_teams = teams.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Every subsequent call fails with `error`.
    pub fn fail_with(&self, error: HuddleError) {
        *self.failure.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Call descriptions in order, e.g. `"week_schedule:5:2024"`.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    async fn answer(&self, call: String, payload: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(call);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        Ok(payload)
    }
}

#[async_trait]
impl SportsDataProvider for FakeProvider {
    async fn playoff_teams(&self, season: i32) -> Result<Vec<String>> {
        let teams = self.teams.lock().clone();
        let value = self.answer(format!("playoff_teams:{season}"), json!(teams)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn week_schedule(&self, week: u32, season: i32) -> Result<Value> {
        self.answer(
            format!("week_schedule:{week}:{season}"),
            json!({ "week": week, "season": season, "games": [{ "home": "KC", "away": "BUF" }] }),
        )
        .await
    }

    async fn team_player_stats(&self, team: &str, week: u32, season: i32) -> Result<Value> {
        let call = format!("team_player_stats:{team}:{week}:{season}");
        if self.failing_teams.iter().any(|t| t == team) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().push(call);
            return Err(HuddleError::UpstreamUnavailable(format!("no stats for {team}")));
        }
        self.answer(call, json!({ "team": team, "week": week, "players": [] })).await
    }

    async fn weekly_stats(&self, week: u32, season: i32) -> Result<Value> {
        self.answer(format!("weekly_stats:{week}:{season}"), json!({ "week": week })).await
    }

    async fn player_profile(&self, player_id: &str) -> Result<Value> {
        self.answer(format!("player_profile:{player_id}"), json!({ "id": player_id })).await
    }

    async fn player_news(&self, player_id: &str) -> Result<Value> {
        self.answer(format!("player_news:{player_id}"), json!(["headline"])).await
    }

    async fn injury_status(&self, player_id: &str) -> Result<Value> {
        self.answer(format!("injury_status:{player_id}"), json!("QUESTIONABLE")).await
    }

    async fn team_roster(&self, team: &str, season: i32) -> Result<Value> {
        self.answer(format!("team_roster:{team}:{season}"), json!({ "team": team })).await
    }

    async fn search_players(&self, query: &str) -> Result<Value> {
        self.answer(format!("search_players:{query}"), json!([{ "name": query }])).await
    }
}
