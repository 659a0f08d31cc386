//! Error kinds surfaced by the lifecycle controller and the store boundary.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures at the store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
  /// Versioned commit lost the race against another writer.
  #[error("user record was modified concurrently")]
  Conflict,
  /// The backing store could not be reached. Transient; no local buffering.
  #[error("store unavailable: {0}")]
  Unavailable(String),
}

/// User-facing failures of challenge operations. Every variant maps to a
/// stable `kind` string sent alongside the human-readable message.
#[derive(Debug, Error)]
pub enum ChallengeError {
  #[error("insufficient credits: balance {balance}, entry fee {needed}")]
  InsufficientCredits { needed: u64, balance: u64 },
  #[error("a challenge is already active for this user")]
  ChallengeAlreadyActive,
  #[error("challenge is on cooldown until {until}")]
  ChallengeOnCooldown { until: DateTime<Utc> },
  #[error("unknown challenge config: {0}")]
  ChallengeNotFound(String),
  #[error("challenge '{0}' is locked and not yet playable")]
  ChallengeLocked(String),
  #[error("no active challenge for this user")]
  NoActiveChallenge,
  #[error("progress rejected: {0}")]
  ProgressNotApplicable(String),
  #[error("too many concurrent modifications; please retry")]
  ConcurrentModification,
  #[error("store unavailable: {0}")]
  StoreUnavailable(String),
}

impl ChallengeError {
  pub fn kind(&self) -> &'static str {
    match self {
      ChallengeError::InsufficientCredits { .. } => "insufficient_credits",
      ChallengeError::ChallengeAlreadyActive => "challenge_already_active",
      ChallengeError::ChallengeOnCooldown { .. } => "challenge_on_cooldown",
      ChallengeError::ChallengeNotFound(_) => "challenge_not_found",
      ChallengeError::ChallengeLocked(_) => "challenge_locked",
      ChallengeError::NoActiveChallenge => "no_active_challenge",
      ChallengeError::ProgressNotApplicable(_) => "progress_not_applicable",
      ChallengeError::ConcurrentModification => "concurrent_modification",
      ChallengeError::StoreUnavailable(_) => "store_unavailable",
    }
  }
}

impl From<StoreError> for ChallengeError {
  fn from(e: StoreError) -> Self {
    match e {
      StoreError::Conflict => ChallengeError::ConcurrentModification,
      StoreError::Unavailable(msg) => ChallengeError::StoreUnavailable(msg),
    }
  }
}
