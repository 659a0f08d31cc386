//! HTTP endpoint handlers. These are thin wrappers that forward to the
//! lifecycle controller. Each handler is instrumented and logs parameters
//! and basic result info; errors map to structured `{ kind, message }` bodies.

use std::sync::Arc;

use axum::{extract::{Query, State}, response::IntoResponse, Json};
use chrono::Utc;
use tracing::{info, instrument};

use crate::error::ChallengeError;
use crate::lifecycle;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let challenges: Vec<ConfigOut> = state.catalog_sorted().iter().map(to_config_out).collect();
  Json(CatalogOut { challenges })
}

#[instrument(level = "info", skip(state), fields(%q.user_id))]
pub async fn http_get_overview(
  State(state): State<Arc<AppState>>,
  Query(q): Query<OverviewQuery>,
) -> Result<Json<OverviewOut>, ChallengeError> {
  let record = lifecycle::overview(&state, &q.user_id).await?;
  Ok(Json(to_overview_out(&record)))
}

#[instrument(level = "info", skip(state, body), fields(%body.user_id, %body.config_id))]
pub async fn http_post_start(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartIn>,
) -> Result<Json<ActiveOut>, ChallengeError> {
  let attempt =
    lifecycle::start_challenge(&state, &body.user_id, &body.config_id, body.utc_offset_minutes, Utc::now()).await?;
  info!(target: "challenge", user_id = %body.user_id, config_id = %body.config_id, "HTTP challenge started");
  Ok(Json(to_active_out(&attempt)))
}

#[instrument(level = "info", skip(state, body), fields(%body.user_id, %body.goal_id, value = body.value))]
pub async fn http_post_progress(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ProgressIn>,
) -> Result<Json<lifecycle::ProgressUpdate>, ChallengeError> {
  let update = lifecycle::record_progress(&state, &body.user_id, &body.goal_id, body.value, Utc::now()).await?;
  Ok(Json(update))
}

#[instrument(level = "info", skip(state, body), fields(%body.user_id))]
pub async fn http_post_check_in(
  State(state): State<Arc<AppState>>,
  Json(body): Json<UserIn>,
) -> Result<Json<lifecycle::ProgressUpdate>, ChallengeError> {
  let update = lifecycle::check_in(&state, &body.user_id, Utc::now()).await?;
  Ok(Json(update))
}

#[instrument(level = "info", skip(state, body), fields(%body.user_id))]
pub async fn http_post_rollover(
  State(state): State<Arc<AppState>>,
  Json(body): Json<UserIn>,
) -> Result<Json<RolloverOut>, ChallengeError> {
  let outcome = lifecycle::daily_rollover(&state, &body.user_id, Utc::now()).await?;
  info!(target: "challenge", user_id = %body.user_id, ?outcome, "HTTP rollover processed");
  Ok(Json(RolloverOut { outcome }))
}
