//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to the lifecycle controller. We reply with a single JSON message
//! per request.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use chrono::Utc;
use tracing::{debug, error, info, instrument};

use crate::error::ChallengeError;
use crate::lifecycle;
use crate::protocol::{
  to_active_out, to_config_out, to_overview_out, ClientWsMessage, ServerWsMessage,
};
use crate::state::AppState;
use crate::util::trunc_for_log;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "focusquest_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "focusquest_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "focusquest_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => {
            debug!(target: "focusquest_backend", raw = %trunc_for_log(&txt, 200), "WS payload rejected");
            ServerWsMessage::Error { kind: "invalid_json".into(), message: format!("Invalid JSON: {}", e) }
          }
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "kind": "serialization", "message": format!("Serialization error: {}", e) })
            .to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "focusquest_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
      }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "focusquest_backend", "WebSocket disconnected");
}

fn error_reply(e: ChallengeError) -> ServerWsMessage {
  ServerWsMessage::Error { kind: e.kind().to_string(), message: e.to_string() }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Catalog => {
      let challenges = state.catalog_sorted().iter().map(to_config_out).collect();
      ServerWsMessage::Catalog { challenges }
    }

    ClientWsMessage::Overview { user_id } => match lifecycle::overview(state, &user_id).await {
      Ok(record) => ServerWsMessage::Overview { overview: to_overview_out(&record) },
      Err(e) => error_reply(e),
    },

    ClientWsMessage::StartChallenge { user_id, config_id, utc_offset_minutes } => {
      match lifecycle::start_challenge(state, &user_id, &config_id, utc_offset_minutes, Utc::now()).await {
        Ok(attempt) => {
          tracing::info!(target: "challenge", %user_id, %config_id, "WS challenge started");
          ServerWsMessage::Started { challenge: to_active_out(&attempt) }
        }
        Err(e) => error_reply(e),
      }
    }

    ClientWsMessage::RecordProgress { user_id, goal_id, value } => {
      match lifecycle::record_progress(state, &user_id, &goal_id, value, Utc::now()).await {
        Ok(update) => ServerWsMessage::Progress { update },
        Err(e) => error_reply(e),
      }
    }

    ClientWsMessage::CheckIn { user_id } => match lifecycle::check_in(state, &user_id, Utc::now()).await {
      Ok(update) => ServerWsMessage::Progress { update },
      Err(e) => error_reply(e),
    },

    ClientWsMessage::Rollover { user_id } => match lifecycle::daily_rollover(state, &user_id, Utc::now()).await {
      Ok(outcome) => {
        tracing::info!(target: "challenge", %user_id, ?outcome, "WS rollover processed");
        ServerWsMessage::Rollover { outcome }
      }
      Err(e) => error_reply(e),
    },
  }
}
