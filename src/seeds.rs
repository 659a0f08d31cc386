//! Built-in challenge configs. The catalog stays useful even without an
//! external TOML file.

use crate::domain::{ChallengeConfig, DailyGoal, CHECK_IN_GOAL_ID};

fn goal(id: &str, description: &str, target: u64) -> DailyGoal {
  DailyGoal { id: id.into(), description: description.into(), target }
}

/// Minimal set of built-in challenges. TOML catalog entries with the same id
/// take precedence over these.
pub fn seed_catalog() -> Vec<ChallengeConfig> {
  vec![
    ChallengeConfig {
      id: "starter-3".into(),
      title: "3-Day Warm-Up".into(),
      duration_days: 3,
      entry_fee: 20,
      reward: 60,
      daily_goals: vec![
        goal("study_seconds", "Study for 2 hours", 7200),
        goal(CHECK_IN_GOAL_ID, "Check in before midnight", 1),
      ],
      rules: vec![
        "Stake 20 credits to enter.".into(),
        "Meet every daily goal to keep your streak alive.".into(),
        "Miss a day and the stake is forfeited.".into(),
      ],
      elite_badge_days: 0,
      locked: false,
    },
    ChallengeConfig {
      id: "focus-7".into(),
      title: "7-Day Deep Focus".into(),
      duration_days: 7,
      entry_fee: 50,
      reward: 300,
      daily_goals: vec![
        goal("study_seconds", "Study for 5 hours", 18000),
        goal("focus_sessions", "Complete 4 focus sessions", 4),
        goal("tasks_done", "Complete all daily tasks", 1),
        goal(CHECK_IN_GOAL_ID, "Check in before midnight", 1),
      ],
      rules: vec![
        "Stake 50 credits to enter.".into(),
        "All four goals must be met every day.".into(),
        "Finish all 7 days to earn the stake back plus 300 credits.".into(),
        "A failed attempt puts this challenge on cooldown.".into(),
      ],
      elite_badge_days: 7,
      locked: false,
    },
    ChallengeConfig {
      id: "marathon-30".into(),
      title: "30-Day Marathon".into(),
      duration_days: 30,
      entry_fee: 200,
      reward: 1500,
      daily_goals: vec![
        goal("study_seconds", "Study for 4 hours", 14400),
        goal("tasks_done", "Complete all daily tasks", 1),
        goal(CHECK_IN_GOAL_ID, "Check in before midnight", 1),
      ],
      rules: vec![
        "Stake 200 credits to enter.".into(),
        "30 consecutive passing days required.".into(),
      ],
      elite_badge_days: 30,
      locked: true,
    },
  ]
}
