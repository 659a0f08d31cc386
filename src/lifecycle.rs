//! Challenge lifecycle controller shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Starting a challenge (stake debit, cooldown and lock checks)
//!   - Recording goal progress and check-ins (monotonic merge, current day only)
//!   - Daily rollover (evaluate, advance, resolve success/failure)
//!
//! Every transition is a versioned read-modify-write against the store, so a
//! credit movement and its status change always land together or not at all.
//! Commit conflicts are retried a bounded number of times.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::clock;
use crate::domain::{ActiveChallenge, ChallengeStatus, ResolvedChallenge, UserRecord, CHECK_IN_GOAL_ID};
use crate::error::{ChallengeError, StoreError};
use crate::evaluator;
use crate::state::AppState;

/// Result of one progress/check-in command.
#[derive(Clone, Debug, Serialize)]
pub struct ProgressUpdate {
  pub day: u32,
  pub goal_id: String,
  /// Accumulated value after the monotonic merge.
  pub value: u64,
  pub met: bool,
}

/// What a rollover attempt did. `NotDue` is what makes the operation
/// idempotent per day: re-running after a processed day is a no-op.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum RolloverOutcome {
  NotDue { current_day: u32 },
  DayPassed { day: u32, next_day: u32 },
  Succeeded { credited: u64, badge: Option<String> },
  Failed { day: u32, goals_missed: Vec<String> },
}

/// Read-only snapshot of a user's record. First-seen users get a fresh
/// record with the signup grant, without committing anything.
#[instrument(level = "debug", skip(state), fields(%user_id))]
pub async fn overview(state: &AppState, user_id: &str) -> Result<UserRecord, ChallengeError> {
  let (_, existing) = state.store.fetch(user_id).await?;
  Ok(existing.unwrap_or_else(|| state.new_user_record()))
}

/// Stake the entry fee and activate a config for the user.
#[instrument(level = "info", skip(state), fields(%user_id, %config_id))]
pub async fn start_challenge(
  state: &AppState,
  user_id: &str,
  config_id: &str,
  utc_offset_minutes: i32,
  now: DateTime<Utc>,
) -> Result<ActiveChallenge, ChallengeError> {
  let config = state
    .config(config_id)
    .ok_or_else(|| ChallengeError::ChallengeNotFound(config_id.to_string()))?
    .clone();
  if config.locked {
    return Err(ChallengeError::ChallengeLocked(config_id.to_string()));
  }

  let cooldown = Duration::days(state.settings.cooldown_days);
  let started = with_user_record(state, user_id, |record| {
    if record.active.is_some() {
      return Err(ChallengeError::ChallengeAlreadyActive);
    }
    let last_resolution = record
      .history
      .iter()
      .filter(|r| r.config_id == config.id)
      .map(|r| r.resolved_at)
      .max();
    if let Some(resolved_at) = last_resolution {
      let until = resolved_at + cooldown;
      if now < until {
        return Err(ChallengeError::ChallengeOnCooldown { until });
      }
    }
    if record.balance < config.entry_fee {
      return Err(ChallengeError::InsufficientCredits {
        needed: config.entry_fee,
        balance: record.balance,
      });
    }

    record.balance -= config.entry_fee;
    let attempt = ActiveChallenge {
      attempt_id: Uuid::new_v4().to_string(),
      config_id: config.id.clone(),
      started_at: now,
      utc_offset_minutes,
      current_day: 1,
      daily_progress: BTreeMap::new(),
      status: ChallengeStatus::Active,
    };
    record.active = Some(attempt.clone());
    Ok(attempt)
  })
  .await?;

  info!(
    target: "challenge",
    %user_id,
    config_id = %config.id,
    attempt_id = %started.attempt_id,
    fee = config.entry_fee,
    "Challenge started"
  );
  Ok(started)
}

/// Record goal progress for the current day. Values merge monotonically:
/// concurrent updates can only raise the accumulated value, so "last write
/// wins" races cannot lose study time.
#[instrument(level = "info", skip(state), fields(%user_id, %goal_id))]
pub async fn record_progress(
  state: &AppState,
  user_id: &str,
  goal_id: &str,
  value: u64,
  now: DateTime<Utc>,
) -> Result<ProgressUpdate, ChallengeError> {
  let update = with_user_record(state, user_id, |record| {
    let Some(active) = record.active.as_mut() else {
      return Err(ChallengeError::NoActiveChallenge);
    };
    let config = state
      .config(&active.config_id)
      .ok_or_else(|| ChallengeError::ChallengeNotFound(active.config_id.clone()))?;
    let Some(goal_def) = config.daily_goals.iter().find(|g| g.id == goal_id) else {
      return Err(ChallengeError::ProgressNotApplicable(format!(
        "goal '{}' is not part of '{}'",
        goal_id, config.id
      )));
    };

    // Server-side day validation: progress only counts while the current
    // day's local date is still today. Late events wait for the rollover.
    let elapsed = clock::elapsed_local_days(active.started_at, now, active.utc_offset_minutes);
    if elapsed != i64::from(active.current_day) - 1 {
      return Err(ChallengeError::ProgressNotApplicable(
        "progress is only accepted for the current local day; run the daily rollover first".into(),
      ));
    }

    let day = active.current_day;
    let entry = active
      .daily_progress
      .entry(day)
      .or_default()
      .entry(goal_id.to_string())
      .or_insert(0);
    *entry = (*entry).max(value);
    let value_now = *entry;
    Ok(ProgressUpdate {
      day,
      goal_id: goal_id.to_string(),
      value: value_now,
      met: value_now >= goal_def.target,
    })
  })
  .await?;

  debug!(
    target: "challenge",
    %user_id,
    day = update.day,
    goal_id = %update.goal_id,
    value = update.value,
    met = update.met,
    "Progress recorded"
  );
  Ok(update)
}

/// Record the daily check-in. Met iff the server-side timestamp still falls
/// before local midnight of the current day; the shared day validation in
/// `record_progress` enforces exactly that.
#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn check_in(state: &AppState, user_id: &str, now: DateTime<Utc>) -> Result<ProgressUpdate, ChallengeError> {
  record_progress(state, user_id, CHECK_IN_GOAL_ID, 1, now).await
}

/// Evaluate every day already closed by local midnight and advance or
/// resolve the attempt. Idempotent per day: a second run on the same
/// calendar day returns `NotDue` and changes nothing.
#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn daily_rollover(state: &AppState, user_id: &str, now: DateTime<Utc>) -> Result<RolloverOutcome, ChallengeError> {
  let outcome = with_user_record(state, user_id, |record| {
    let Some(active) = record.active.clone() else {
      return Err(ChallengeError::NoActiveChallenge);
    };
    let config = state
      .config(&active.config_id)
      .ok_or_else(|| ChallengeError::ChallengeNotFound(active.config_id.clone()))?
      .clone();

    let mut attempt = active;
    let mut last_passed: Option<u32> = None;
    // Catch-up loop: a user who skipped rollovers may have several closed
    // days pending. Any day with unmet goals resolves the attempt.
    loop {
      if !clock::day_is_over(attempt.started_at, now, attempt.utc_offset_minutes, attempt.current_day) {
        let current_day = attempt.current_day;
        record.active = Some(attempt);
        return Ok(match last_passed {
          Some(day) => RolloverOutcome::DayPassed { day, next_day: current_day },
          None => RolloverOutcome::NotDue { current_day },
        });
      }

      let day = attempt.current_day;
      let progress = attempt.progress_for_day(day);
      if !evaluator::day_passed(&config, &progress) {
        let goals_missed = evaluator::goals_missed(&config, &progress);
        attempt.status = ChallengeStatus::Failed;
        record.history.push(ResolvedChallenge {
          attempt_id: attempt.attempt_id.clone(),
          config_id: attempt.config_id.clone(),
          status: attempt.status,
          resolved_at: now,
          days_completed: day - 1,
        });
        // Stake forfeited: no credit movement on failure.
        record.active = None;
        return Ok(RolloverOutcome::Failed { day, goals_missed });
      }

      if day == config.duration_days {
        let credited = config.entry_fee.saturating_add(config.reward);
        record.balance = record.balance.saturating_add(credited);
        let badge = (config.elite_badge_days > 0 && config.duration_days >= config.elite_badge_days)
          .then(|| format!("elite-{}", config.id));
        if let Some(b) = &badge {
          if !record.badges.contains(b) {
            record.badges.push(b.clone());
          }
        }
        attempt.status = ChallengeStatus::Succeeded;
        record.history.push(ResolvedChallenge {
          attempt_id: attempt.attempt_id.clone(),
          config_id: attempt.config_id.clone(),
          status: attempt.status,
          resolved_at: now,
          days_completed: day,
        });
        record.active = None;
        return Ok(RolloverOutcome::Succeeded { credited, badge });
      }

      last_passed = Some(day);
      attempt.current_day = day + 1;
    }
  })
  .await?;

  match &outcome {
    RolloverOutcome::NotDue { current_day } => {
      debug!(target: "challenge", %user_id, current_day, "Rollover not due")
    }
    RolloverOutcome::DayPassed { day, next_day } => {
      info!(target: "challenge", %user_id, day, next_day, "Day passed")
    }
    RolloverOutcome::Succeeded { credited, badge } => {
      info!(target: "challenge", %user_id, credited, badge = badge.as_deref().unwrap_or(""), "Challenge succeeded")
    }
    RolloverOutcome::Failed { day, goals_missed } => {
      info!(target: "challenge", %user_id, day, missed = goals_missed.len(), "Challenge failed")
    }
  }
  Ok(outcome)
}

/// Fetch-apply-commit with bounded retries on version conflicts. The closure
/// must be a pure function of the record; it may run more than once.
async fn with_user_record<F, T>(state: &AppState, user_id: &str, mut apply: F) -> Result<T, ChallengeError>
where
  F: FnMut(&mut UserRecord) -> Result<T, ChallengeError>,
{
  let max_retries = state.settings.max_commit_retries;
  let mut attempt = 0;
  loop {
    let (version, existing) = state.store.fetch(user_id).await?;
    let mut record = existing.unwrap_or_else(|| state.new_user_record());
    let out = apply(&mut record)?;
    match state.store.commit(user_id, version, record).await {
      Ok(()) => return Ok(out),
      Err(StoreError::Conflict) if attempt < max_retries => {
        attempt += 1;
        warn!(target: "challenge", %user_id, attempt, "Commit conflict; retrying transition");
      }
      Err(e) => return Err(e.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  use async_trait::async_trait;
  use chrono::TimeZone;

  use crate::store::{ChallengeStore, MemoryStore};

  const USER: &str = "u-1";
  const FOCUS7: &str = "focus-7";

  fn state() -> AppState {
    AppState::new()
  }

  fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().expect("valid time")
  }

  fn days(n: i64) -> DateTime<Utc> {
    t0() + Duration::days(n)
  }

  /// Meet all four focus-7 goals during day `day` (1-based).
  async fn pass_day(state: &AppState, day: u32) {
    let at = days(i64::from(day) - 1);
    record_progress(state, USER, "study_seconds", 18000, at).await.expect("study");
    record_progress(state, USER, "focus_sessions", 4, at).await.expect("focus");
    record_progress(state, USER, "tasks_done", 1, at).await.expect("tasks");
    check_in(state, USER, at).await.expect("check in");
  }

  #[tokio::test]
  async fn start_debits_fee_and_blocks_second_start() {
    let state = state();
    let attempt = start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect("start");
    assert_eq!(attempt.current_day, 1);
    assert_eq!(attempt.status, ChallengeStatus::Active);

    let record = overview(&state, USER).await.expect("overview");
    assert_eq!(record.balance, 450);
    assert!(record.active.is_some());

    let err = start_challenge(&state, USER, "starter-3", 0, t0()).await.expect_err("second start");
    assert!(matches!(err, ChallengeError::ChallengeAlreadyActive));
  }

  #[tokio::test]
  async fn locked_and_unknown_configs_are_rejected() {
    let state = state();
    let err = start_challenge(&state, USER, "marathon-30", 0, t0()).await.expect_err("locked");
    assert!(matches!(err, ChallengeError::ChallengeLocked(_)));

    let err = start_challenge(&state, USER, "no-such-config", 0, t0()).await.expect_err("unknown");
    assert!(matches!(err, ChallengeError::ChallengeNotFound(_)));
  }

  #[tokio::test]
  async fn insufficient_credits_blocks_start() {
    let mut state = state();
    state.settings.starting_balance = 10;
    let err = start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect_err("poor");
    assert!(matches!(err, ChallengeError::InsufficientCredits { needed: 50, balance: 10 }));
  }

  #[tokio::test]
  async fn full_run_credits_fee_plus_reward_and_grants_badge() {
    let state = state();
    start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect("start");

    for day in 1..=7u32 {
      pass_day(&state, day).await;
      let outcome = daily_rollover(&state, USER, days(i64::from(day))).await.expect("rollover");
      if day < 7 {
        assert_eq!(outcome, RolloverOutcome::DayPassed { day, next_day: day + 1 });
      } else {
        assert_eq!(
          outcome,
          RolloverOutcome::Succeeded { credited: 350, badge: Some("elite-focus-7".into()) }
        );
      }
    }

    let record = overview(&state, USER).await.expect("overview");
    assert_eq!(record.balance, 800); // 500 - 50 + 350
    assert!(record.active.is_none());
    assert_eq!(record.badges, vec!["elite-focus-7".to_string()]);
    assert_eq!(record.history.len(), 1);
    assert_eq!(record.history[0].status, ChallengeStatus::Succeeded);
    assert_eq!(record.history[0].days_completed, 7);
  }

  #[tokio::test]
  async fn failing_a_day_forfeits_the_stake() {
    let state = state();
    start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect("start");
    pass_day(&state, 1).await;
    assert_eq!(
      daily_rollover(&state, USER, days(1)).await.expect("day 1"),
      RolloverOutcome::DayPassed { day: 1, next_day: 2 }
    );
    pass_day(&state, 2).await;
    assert_eq!(
      daily_rollover(&state, USER, days(2)).await.expect("day 2"),
      RolloverOutcome::DayPassed { day: 2, next_day: 3 }
    );

    // Day 3: one second short of the study target, check-in only.
    record_progress(&state, USER, "study_seconds", 17999, days(2)).await.expect("study");
    check_in(&state, USER, days(2)).await.expect("check in");
    let outcome = daily_rollover(&state, USER, days(3)).await.expect("day 3");
    match outcome {
      RolloverOutcome::Failed { day, goals_missed } => {
        assert_eq!(day, 3);
        assert!(goals_missed.contains(&"study_seconds".to_string()));
        assert!(goals_missed.contains(&"focus_sessions".to_string()));
      }
      other => panic!("expected failure, got {other:?}"),
    }

    let record = overview(&state, USER).await.expect("overview");
    assert_eq!(record.balance, 450); // stake gone, nothing credited
    assert!(record.active.is_none());
    assert_eq!(record.history[0].status, ChallengeStatus::Failed);
    assert_eq!(record.history[0].days_completed, 2);

    // No further rollover possible on a resolved attempt.
    let err = daily_rollover(&state, USER, days(4)).await.expect_err("resolved");
    assert!(matches!(err, ChallengeError::NoActiveChallenge));
  }

  #[tokio::test]
  async fn archived_attempts_carry_their_terminal_status() {
    let state = state();
    start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect("start");
    // No progress: day 1 resolves as failed.
    daily_rollover(&state, USER, days(1)).await.expect("rollover");

    let record = overview(&state, USER).await.expect("overview");
    let archived = &record.history[0];
    assert_eq!(archived.status, ChallengeStatus::Failed);
    let json = serde_json::to_value(archived).expect("serialize");
    assert_eq!(json["status"], "failed");
  }

  #[tokio::test]
  async fn rollover_is_idempotent_per_day() {
    let state = state();
    start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect("start");
    pass_day(&state, 1).await;

    let first = daily_rollover(&state, USER, days(1)).await.expect("first");
    assert_eq!(first, RolloverOutcome::DayPassed { day: 1, next_day: 2 });

    let before = overview(&state, USER).await.expect("overview");
    let second = daily_rollover(&state, USER, days(1)).await.expect("second");
    assert_eq!(second, RolloverOutcome::NotDue { current_day: 2 });
    let after = overview(&state, USER).await.expect("overview");

    assert_eq!(before.balance, after.balance);
    let active_before = before.active.expect("active");
    let active_after = after.active.expect("active");
    assert_eq!(active_before.current_day, active_after.current_day);
    assert_eq!(active_before.status, active_after.status);
  }

  #[tokio::test]
  async fn skipped_days_fail_on_catch_up() {
    let state = state();
    start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect("start");
    // No progress at all; rollover two days later resolves day 1 as failed.
    let outcome = daily_rollover(&state, USER, days(2)).await.expect("rollover");
    assert!(matches!(outcome, RolloverOutcome::Failed { day: 1, .. }));
  }

  #[tokio::test]
  async fn progress_merges_monotonically_and_rejects_stale_days() {
    let state = state();
    start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect("start");

    let up = record_progress(&state, USER, "study_seconds", 18000, t0()).await.expect("high");
    assert!(up.met);
    // A lower concurrent update must not shrink the accumulated value.
    let up = record_progress(&state, USER, "study_seconds", 200, t0()).await.expect("low");
    assert_eq!(up.value, 18000);
    assert!(up.met);

    // Goal outside the config.
    let err = record_progress(&state, USER, "push_ups", 10, t0()).await.expect_err("bad goal");
    assert!(matches!(err, ChallengeError::ProgressNotApplicable(_)));

    // After local midnight the day is closed for progress.
    let err = record_progress(&state, USER, "tasks_done", 1, days(1)).await.expect_err("late");
    assert!(matches!(err, ChallengeError::ProgressNotApplicable(_)));
  }

  #[tokio::test]
  async fn cooldown_blocks_immediate_restart() {
    let state = state();
    start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect("start");
    let outcome = daily_rollover(&state, USER, days(1)).await.expect("rollover");
    assert!(matches!(outcome, RolloverOutcome::Failed { .. }));

    let err = start_challenge(&state, USER, FOCUS7, 0, days(1)).await.expect_err("cooldown");
    match err {
      ChallengeError::ChallengeOnCooldown { until } => assert_eq!(until, days(31)),
      other => panic!("expected cooldown, got {other:?}"),
    }

    // A different config is not on cooldown.
    start_challenge(&state, USER, "starter-3", 0, days(1)).await.expect("other config");
    daily_rollover(&state, USER, days(2)).await.expect("fail it");

    // And once the window has elapsed the original config is startable again.
    start_challenge(&state, USER, FOCUS7, 0, days(35)).await.expect("after cooldown");
  }

  /// Store wrapper that fails the first N commits with a version conflict.
  struct FlakyStore {
    inner: MemoryStore,
    fail_remaining: AtomicU32,
  }

  #[async_trait]
  impl ChallengeStore for FlakyStore {
    async fn fetch(&self, user_id: &str) -> Result<(u64, Option<UserRecord>), StoreError> {
      self.inner.fetch(user_id).await
    }

    async fn commit(&self, user_id: &str, expected_version: u64, record: UserRecord) -> Result<(), StoreError> {
      if self.fail_remaining.load(Ordering::SeqCst) > 0 {
        self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
        return Err(StoreError::Conflict);
      }
      self.inner.commit(user_id, expected_version, record).await
    }
  }

  #[tokio::test]
  async fn commit_conflicts_are_retried_within_bounds() {
    let state = AppState::with_store(Arc::new(FlakyStore {
      inner: MemoryStore::new(),
      fail_remaining: AtomicU32::new(3),
    }));
    start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect("start despite conflicts");
    assert_eq!(overview(&state, USER).await.expect("overview").balance, 450);
  }

  #[tokio::test]
  async fn persistent_conflicts_surface_after_bounded_retries() {
    let state = AppState::with_store(Arc::new(FlakyStore {
      inner: MemoryStore::new(),
      fail_remaining: AtomicU32::new(100),
    }));
    let err = start_challenge(&state, USER, FOCUS7, 0, t0()).await.expect_err("gives up");
    assert!(matches!(err, ChallengeError::ConcurrentModification));
  }
}
