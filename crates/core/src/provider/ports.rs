//! Port interface for the rate-limited upstream data source
//!
//! Payloads other than team lists are opaque JSON. Implementations report
//! throttling as `HuddleError::RateLimited` and any other upstream failure
//! as `HuddleError::UpstreamUnavailable`.

use async_trait::async_trait;
use huddle_domain::Result;
use serde_json::Value;

/// Key-addressable sports-data fetches.
#[async_trait]
pub trait SportsDataProvider: Send + Sync {
    /// Team abbreviations in the playoffs for `season`.
    async fn playoff_teams(&self, season: i32) -> Result<Vec<String>>;

    async fn week_schedule(&self, week: u32, season: i32) -> Result<Value>;

    async fn team_player_stats(&self, team: &str, week: u32, season: i32) -> Result<Value>;

    async fn weekly_stats(&self, week: u32, season: i32) -> Result<Value>;

    async fn player_profile(&self, player_id: &str) -> Result<Value>;

    async fn player_news(&self, player_id: &str) -> Result<Value>;

    async fn injury_status(&self, player_id: &str) -> Result<Value>;

    async fn team_roster(&self, team: &str, season: i32) -> Result<Value>;

    async fn search_players(&self, query: &str) -> Result<Value>;
}
