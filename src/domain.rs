//! Domain models: challenge configs, daily goals, active attempts, and archived outcomes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Goal id the check-in operation writes to. Configs that want a daily
/// check-in include a goal with this id and target 1.
pub const CHECK_IN_GOAL_ID: &str = "check_in";

/// A single measurable daily target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailyGoal {
  pub id: String,
  pub description: String,
  /// Threshold in seconds or counts. A target of 1 expresses a boolean goal.
  pub target: u64,
}

/// Static descriptor of a stakeable multi-day challenge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChallengeConfig {
  pub id: String,
  pub title: String,
  pub duration_days: u32,
  pub entry_fee: u64,
  pub reward: u64,
  pub daily_goals: Vec<DailyGoal>,
  /// Display strings shown on the selection page; not machine-enforced
  /// beyond what the lifecycle controller implements.
  #[serde(default)] pub rules: Vec<String>,
  /// Succeeding at a challenge of at least this many days grants the elite
  /// badge. Zero disables it.
  #[serde(default)] pub elite_badge_days: u32,
  /// Locked configs appear in the catalog but cannot be started yet.
  #[serde(default)] pub locked: bool,
}

/// Lifecycle state of an attempt. Terminal states are immutable; the record
/// moves to the user's history on resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
  Active,
  Succeeded,
  Failed,
}

/// Progress for one day: goal id -> accumulated value. Values only merge
/// upward, never overwrite downward.
pub type DayProgress = BTreeMap<String, u64>;

/// A user's single in-flight challenge attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveChallenge {
  pub attempt_id: String,
  pub config_id: String,
  pub started_at: DateTime<Utc>,
  /// Local timezone offset captured at start. Day boundaries are local midnights.
  pub utc_offset_minutes: i32,
  /// 1-based index of the day currently being played. Never exceeds duration.
  pub current_day: u32,
  pub daily_progress: BTreeMap<u32, DayProgress>,
  pub status: ChallengeStatus,
}

impl ActiveChallenge {
  pub fn progress_for_day(&self, day: u32) -> DayProgress {
    self.daily_progress.get(&day).cloned().unwrap_or_default()
  }
}

/// Archived attempt, carrying the terminal status the attempt ended in.
/// History entries drive cooldown enforcement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedChallenge {
  pub attempt_id: String,
  pub config_id: String,
  pub status: ChallengeStatus,
  pub resolved_at: DateTime<Utc>,
  pub days_completed: u32,
}

/// Everything the store keeps per user: credit balance, the single optional
/// active attempt, archived attempts, and cosmetic badges.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UserRecord {
  pub balance: u64,
  pub active: Option<ActiveChallenge>,
  pub history: Vec<ResolvedChallenge>,
  pub badges: Vec<String>,
}
