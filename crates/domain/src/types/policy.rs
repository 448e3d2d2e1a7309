//! Cache policy table
//!
//! Maps each logical data type to its cache name, per-tier TTLs, local
//! capacity and key template. The table is built once at start-up from the
//! built-in defaults plus configuration overrides and is read-only after.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PolicyOverride;
use crate::constants::CACHE_KEY_SEPARATOR;
use crate::errors::{HuddleError, Result};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Logical data types served through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Stats for games in progress
    LiveStats,
    /// Stats for completed games
    FinalStats,
    PlayerProfile,
    /// Per-team player stats for a week
    TeamStats,
    Schedule,
    /// Schedule while games of that week are live
    ScheduleLive,
    PlayoffTeams,
    TeamRoster,
    News,
    InjuryReport,
    Search,
    /// Data that never changes once published
    Permanent,
}

impl CachePolicy {
    /// Every policy, in declaration order.
    pub const ALL: [CachePolicy; 12] = [
        CachePolicy::LiveStats,
        CachePolicy::FinalStats,
        CachePolicy::PlayerProfile,
        CachePolicy::TeamStats,
        CachePolicy::Schedule,
        CachePolicy::ScheduleLive,
        CachePolicy::PlayoffTeams,
        CachePolicy::TeamRoster,
        CachePolicy::News,
        CachePolicy::InjuryReport,
        CachePolicy::Search,
        CachePolicy::Permanent,
    ];

    /// Name of the cache region backing this policy in both tiers.
    pub fn cache_name(self) -> &'static str {
        match self {
            Self::LiveStats => "live-stats",
            Self::FinalStats => "final-stats",
            Self::PlayerProfile => "player-profiles",
            Self::TeamStats => "team-stats",
            Self::Schedule => "schedule",
            Self::ScheduleLive => "schedule-live",
            Self::PlayoffTeams => "playoff-teams",
            Self::TeamRoster => "team-rosters",
            Self::News => "player-news",
            Self::InjuryReport => "injury-reports",
            Self::Search => "player-search",
            Self::Permanent => "permanent",
        }
    }

    /// Look a policy up by its cache name.
    pub fn from_cache_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|policy| policy.cache_name() == name)
    }

    /// Built-in TTLs and capacity.
    pub fn default_settings(self) -> PolicySettings {
        let (local, shared, max) = match self {
            Self::LiveStats => (30, 30, 100),
            Self::FinalStats => (HOUR, 7 * DAY, 200),
            Self::PlayerProfile => (15 * MINUTE, HOUR, 5000),
            Self::TeamStats => (30, 30, 100),
            Self::Schedule => (10 * MINUTE, HOUR, 50),
            Self::ScheduleLive => (30, MINUTE, 50),
            Self::PlayoffTeams => (HOUR, DAY, 20),
            Self::TeamRoster => (30 * MINUTE, 6 * HOUR, 100),
            Self::News => (2 * MINUTE, 5 * MINUTE, 500),
            Self::InjuryReport => (2 * MINUTE, 5 * MINUTE, 200),
            Self::Search => (5 * MINUTE, 30 * MINUTE, 1000),
            Self::Permanent => (DAY, 30 * DAY, 1000),
        };

        PolicySettings {
            local_ttl: Duration::from_secs(local),
            shared_ttl: Duration::from_secs(shared),
            local_max_entries: max,
        }
    }

    /// Render the full cache key, e.g. `schedule:week=5,season=2024`.
    pub fn key(self, args: &KeyArgs) -> String {
        format!("{}{}{}", self.cache_name(), CACHE_KEY_SEPARATOR, args)
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_name())
    }
}

/// Arguments a key template is rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyArgs {
    Season { season: i32 },
    Week { week: u32, season: i32 },
    TeamWeek { team: String, week: u32, season: i32 },
    TeamSeason { team: String, season: i32 },
    Player { player_id: String },
    Query { query: String },
    /// Pre-rendered key suffix
    Raw(String),
}

impl KeyArgs {
    pub fn season(season: i32) -> Self {
        Self::Season { season }
    }

    pub fn week(week: u32, season: i32) -> Self {
        Self::Week { week, season }
    }

    pub fn team_week(team: impl Into<String>, week: u32, season: i32) -> Self {
        Self::TeamWeek { team: team.into(), week, season }
    }

    pub fn team_season(team: impl Into<String>, season: i32) -> Self {
        Self::TeamSeason { team: team.into(), season }
    }

    pub fn player(player_id: impl Into<String>) -> Self {
        Self::Player { player_id: player_id.into() }
    }

    /// Search queries are normalised so `"Mahomes "` and `"mahomes"` share
    /// an entry.
    pub fn query(query: impl AsRef<str>) -> Self {
        Self::Query { query: query.as_ref().trim().to_lowercase() }
    }
}

impl fmt::Display for KeyArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Season { season } => write!(f, "season={season}"),
            Self::Week { week, season } => write!(f, "week={week},season={season}"),
            Self::TeamWeek { team, week, season } => {
                write!(f, "team={team},week={week},season={season}")
            }
            Self::TeamSeason { team, season } => write!(f, "team={team},season={season}"),
            Self::Player { player_id } => write!(f, "player={player_id}"),
            Self::Query { query } => write!(f, "query={query}"),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

/// Resolved TTLs and capacity for one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicySettings {
    /// TTL in the per-process tier
    pub local_ttl: Duration,
    /// TTL in the cross-process tier
    pub shared_ttl: Duration,
    /// Maximum entries held by the per-process tier for this cache name
    pub local_max_entries: u64,
}

/// Immutable policy table consulted by the decorator, the local tier and
/// the warming service.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    settings: HashMap<CachePolicy, PolicySettings>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        let settings =
            CachePolicy::ALL.into_iter().map(|policy| (policy, policy.default_settings())).collect();
        Self { settings }
    }
}

impl PolicyTable {
    /// Build the table from defaults, applying overrides keyed by cache name.
    ///
    /// # Errors
    /// Returns `HuddleError::Config` for an unknown cache name or a zero TTL.
    pub fn from_overrides(overrides: &HashMap<String, PolicyOverride>) -> Result<Self> {
        let mut table = Self::default();

        for (name, override_) in overrides {
            let policy = CachePolicy::from_cache_name(name).ok_or_else(|| {
                HuddleError::Config(format!("Unknown cache name in policy overrides: {name}"))
            })?;

            let entry = table
                .settings
                .get_mut(&policy)
                .ok_or_else(|| HuddleError::Internal(format!("policy {policy} missing")))?;

            if let Some(secs) = override_.local_ttl_secs {
                entry.local_ttl = non_zero_ttl(name, "local_ttl_secs", secs)?;
            }
            if let Some(secs) = override_.shared_ttl_secs {
                entry.shared_ttl = non_zero_ttl(name, "shared_ttl_secs", secs)?;
            }
            if let Some(max) = override_.local_max_entries {
                entry.local_max_entries = max;
            }
        }

        Ok(table)
    }

    /// Settings for a policy.
    pub fn settings(&self, policy: CachePolicy) -> PolicySettings {
        self.settings.get(&policy).copied().unwrap_or_else(|| policy.default_settings())
    }

    /// Settings for a cache name, if it belongs to a known policy.
    pub fn settings_for_name(&self, cache_name: &str) -> Option<PolicySettings> {
        CachePolicy::from_cache_name(cache_name).map(|policy| self.settings(policy))
    }

    /// Every configured cache name.
    pub fn cache_names(&self) -> Vec<&'static str> {
        CachePolicy::ALL.into_iter().map(CachePolicy::cache_name).collect()
    }
}

fn non_zero_ttl(name: &str, field: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(HuddleError::Config(format!("{name}.{field} must be greater than zero")));
    }
    Ok(Duration::from_secs(secs))
}
