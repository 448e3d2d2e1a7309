//! Shared helpers for infra integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use huddle_core::SportsDataProvider;
use huddle_domain::{HuddleConfig, Result};
use serde_json::{json, Value};

/// Upstream stand-in that counts calls and answers after a fixed latency.
pub struct CountingProvider {
    calls: AtomicUsize,
    latency: Duration,
}

impl CountingProvider {
    pub fn new(latency: Duration) -> Self {
        Self { calls: AtomicUsize::new(0), latency }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, payload: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Ok(payload)
    }
}

#[async_trait]
impl SportsDataProvider for CountingProvider {
    async fn playoff_teams(&self, _season: i32) -> Result<Vec<String>> {
        let value = self.answer(json!(["KC", "BUF"])).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn week_schedule(&self, week: u32, season: i32) -> Result<Value> {
        self.answer(json!({ "week": week, "season": season, "games": 16 })).await
    }

    async fn team_player_stats(&self, team: &str, week: u32, _season: i32) -> Result<Value> {
        self.answer(json!({ "team": team, "week": week })).await
    }

    async fn weekly_stats(&self, week: u32, _season: i32) -> Result<Value> {
        self.answer(json!({ "week": week, "live": true })).await
    }

    async fn player_profile(&self, player_id: &str) -> Result<Value> {
        self.answer(json!({ "id": player_id })).await
    }

    async fn player_news(&self, player_id: &str) -> Result<Value> {
        self.answer(json!({ "id": player_id, "news": [] })).await
    }

    async fn injury_status(&self, player_id: &str) -> Result<Value> {
        self.answer(json!({ "id": player_id, "status": "active" })).await
    }

    async fn team_roster(&self, team: &str, _season: i32) -> Result<Value> {
        self.answer(json!({ "team": team, "players": [] })).await
    }

    async fn search_players(&self, query: &str) -> Result<Value> {
        self.answer(json!({ "query": query, "results": [] })).await
    }
}

/// Defaults with short lock waits, no warming rules and no inter-call delay.
pub fn test_config() -> HuddleConfig {
    let mut config = HuddleConfig::default();
    config.lock.wait_timeout_secs = 2;
    config.lock.poll_interval_ms = 5;
    config.warming.rules.clear();
    config.warming.inter_call_delay_ms = 0;
    config.warming.week_override = Some(5);
    config
}
