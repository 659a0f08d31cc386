//! Loading the challenge catalog (configs + tracker settings) from TOML.
//!
//! See `CatalogConfig` and `TrackerSettings` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{ChallengeConfig, DailyGoal};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CatalogConfig {
  #[serde(default)]
  pub settings: TrackerSettings,
  #[serde(default)]
  pub challenges: Vec<ChallengeCfg>,
}

/// Challenge entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ChallengeCfg {
  pub id: String,
  pub title: String,
  pub duration_days: u32,
  #[serde(default)] pub entry_fee: u64,
  #[serde(default)] pub reward: u64,
  #[serde(default)] pub daily_goals: Vec<DailyGoalCfg>,
  #[serde(default)] pub rules: Vec<String>,
  #[serde(default)] pub elite_badge_days: u32,
  #[serde(default)] pub locked: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DailyGoalCfg {
  pub id: String,
  pub description: String,
  pub target: u64,
}

impl ChallengeCfg {
  pub fn into_domain(self) -> ChallengeConfig {
    ChallengeConfig {
      id: self.id,
      title: self.title,
      duration_days: self.duration_days,
      entry_fee: self.entry_fee,
      reward: self.reward,
      daily_goals: self
        .daily_goals
        .into_iter()
        .map(|g| DailyGoal { id: g.id, description: g.description, target: g.target })
        .collect(),
      rules: self.rules,
      elite_badge_days: self.elite_badge_days,
      locked: self.locked,
    }
  }
}

/// Tunables for the lifecycle controller. You can override them in TOML.
#[derive(Clone, Debug, Deserialize)]
pub struct TrackerSettings {
  /// Days before the same config may be restarted after a terminal resolution.
  #[serde(default = "default_cooldown_days")]
  pub cooldown_days: i64,
  /// Bounded retries on versioned-commit conflicts before surfacing the error.
  #[serde(default = "default_commit_retries")]
  pub max_commit_retries: u32,
  /// Credit grant for first-seen users.
  #[serde(default = "default_starting_balance")]
  pub starting_balance: u64,
}

fn default_cooldown_days() -> i64 { 30 }
fn default_commit_retries() -> u32 { 4 }
fn default_starting_balance() -> u64 { 500 }

impl Default for TrackerSettings {
  fn default() -> Self {
    Self {
      cooldown_days: default_cooldown_days(),
      max_commit_retries: default_commit_retries(),
      starting_balance: default_starting_balance(),
    }
  }
}

/// Attempt to load `CatalogConfig` from CHALLENGE_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_catalog_from_env() -> Option<CatalogConfig> {
  let path = std::env::var("CHALLENGE_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<CatalogConfig>(&s) {
      Ok(cfg) => {
        info!(target: "focusquest_backend", %path, "Loaded challenge catalog (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "focusquest_backend", %path, error = %e, "Failed to parse TOML catalog");
        None
      }
    },
    Err(e) => {
      error!(target: "focusquest_backend", %path, error = %e, "Failed to read TOML catalog file");
      None
    }
  }
}
