//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ActiveChallenge, ChallengeConfig, ChallengeStatus, DayProgress, ResolvedChallenge, UserRecord,
};
use crate::error::ChallengeError;
use crate::lifecycle::{ProgressUpdate, RolloverOutcome};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Catalog,
    Overview {
        #[serde(rename = "userId")]
        user_id: String,
    },
    StartChallenge {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "configId")]
        config_id: String,
        #[serde(rename = "utcOffsetMinutes", default)]
        utc_offset_minutes: i32,
    },
    RecordProgress {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "goalId")]
        goal_id: String,
        value: u64,
    },
    CheckIn {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Rollover {
        #[serde(rename = "userId")]
        user_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Catalog {
        challenges: Vec<ConfigOut>,
    },
    Overview {
        overview: OverviewOut,
    },
    Started {
        challenge: ActiveOut,
    },
    Progress {
        update: ProgressUpdate,
    },
    Rollover {
        outcome: RolloverOutcome,
    },
    Error {
        kind: String,
        message: String,
    },
}

/// DTO used by both WS and HTTP for catalog delivery.
#[derive(Debug, Serialize)]
pub struct ConfigOut {
    pub id: String,
    pub title: String,
    #[serde(rename = "durationDays")]
    pub duration_days: u32,
    #[serde(rename = "entryFee")]
    pub entry_fee: u64,
    pub reward: u64,
    #[serde(rename = "dailyGoals")]
    pub daily_goals: Vec<GoalOut>,
    pub rules: Vec<String>,
    #[serde(rename = "eliteBadgeDays")]
    pub elite_badge_days: u32,
    pub locked: bool,
}

#[derive(Debug, Serialize)]
pub struct GoalOut {
    pub id: String,
    pub description: String,
    pub target: u64,
}

/// Active attempt as shown to the client, including today's progress map.
#[derive(Debug, Serialize)]
pub struct ActiveOut {
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
    #[serde(rename = "configId")]
    pub config_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "currentDay")]
    pub current_day: u32,
    pub status: ChallengeStatus,
    #[serde(rename = "todayProgress")]
    pub today_progress: DayProgress,
}

#[derive(Debug, Serialize)]
pub struct HistoryOut {
    #[serde(rename = "configId")]
    pub config_id: String,
    pub status: ChallengeStatus,
    #[serde(rename = "resolvedAt")]
    pub resolved_at: DateTime<Utc>,
    #[serde(rename = "daysCompleted")]
    pub days_completed: u32,
}

/// Balance, active attempt, badges and history in one payload.
#[derive(Debug, Serialize)]
pub struct OverviewOut {
    pub balance: u64,
    pub active: Option<ActiveOut>,
    pub badges: Vec<String>,
    pub history: Vec<HistoryOut>,
}

pub fn to_config_out(c: &ChallengeConfig) -> ConfigOut {
    ConfigOut {
        id: c.id.clone(),
        title: c.title.clone(),
        duration_days: c.duration_days,
        entry_fee: c.entry_fee,
        reward: c.reward,
        daily_goals: c
            .daily_goals
            .iter()
            .map(|g| GoalOut { id: g.id.clone(), description: g.description.clone(), target: g.target })
            .collect(),
        rules: c.rules.clone(),
        elite_badge_days: c.elite_badge_days,
        locked: c.locked,
    }
}

pub fn to_active_out(a: &ActiveChallenge) -> ActiveOut {
    ActiveOut {
        attempt_id: a.attempt_id.clone(),
        config_id: a.config_id.clone(),
        started_at: a.started_at,
        current_day: a.current_day,
        status: a.status,
        today_progress: a.progress_for_day(a.current_day),
    }
}

fn to_history_out(r: &ResolvedChallenge) -> HistoryOut {
    HistoryOut {
        config_id: r.config_id.clone(),
        status: r.status,
        resolved_at: r.resolved_at,
        days_completed: r.days_completed,
    }
}

pub fn to_overview_out(record: &UserRecord) -> OverviewOut {
    OverviewOut {
        balance: record.balance,
        active: record.active.as_ref().map(to_active_out),
        badges: record.badges.clone(),
        history: record.history.iter().map(to_history_out).collect(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StartIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "configId")]
    pub config_id: String,
    #[serde(rename = "utcOffsetMinutes", default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize)]
pub struct ProgressIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "goalId")]
    pub goal_id: String,
    pub value: u64,
}

#[derive(Debug, Deserialize)]
pub struct UserIn {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Serialize)]
pub struct CatalogOut {
    pub challenges: Vec<ConfigOut>,
}

#[derive(Serialize)]
pub struct RolloverOut {
    pub outcome: RolloverOutcome,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

/// Structured failure payload: stable kind + human message.
#[derive(Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl IntoResponse for ChallengeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChallengeError::ChallengeNotFound(_) => StatusCode::NOT_FOUND,
            ChallengeError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::CONFLICT,
        };
        let body = ErrorBody { kind: self.kind().to_string(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}
