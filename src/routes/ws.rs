//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. Most requests get a single JSON reply;
//! `submit_code` gets the Judging placeholder first and the outcome later.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{info, error, instrument, debug};

use crate::domain::SubmissionResult;
use crate::error::{AppError, AppResult};
use crate::protocol::{ClientWsMessage, ServerWsMessage, SubmitOut};
use crate::logic;
use crate::state::{Actor, AppState};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
  #[serde(default)]
  pub token: String,
}

#[instrument(level = "info", skip(state, ws, q))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  Query(q): Query<WsQuery>,
) -> Result<impl IntoResponse, AppError> {
  let actor = state.authenticate(&q.token).await?;
  info!(target: "codejudge_backend", user_id = %actor.user.id, "WebSocket upgrade requested");
  Ok(ws.on_upgrade(move |socket| handle_ws(socket, state, actor)))
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "code": "INTERNAL_ERROR", "message": format!("Serialization error: {}", e) }).to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => true,
    Err(e) => {
      error!(target: "codejudge_backend", error = %e, "WS send error");
      false
    }
  }
}

fn error_msg(e: &AppError) -> ServerWsMessage {
  ServerWsMessage::Error { code: e.error_code().into(), message: e.to_string() }
}

#[instrument(level = "info", skip(socket, state, actor), fields(user_id = %actor.user.id))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, actor: Actor) {
  info!(target: "codejudge_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let incoming = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(m) => m,
          Err(e) => {
            let reply = ServerWsMessage::Error { code: "VALIDATION_ERROR".into(), message: format!("Invalid JSON: {}", e) };
            if !send(&mut socket, &reply).await { break; }
            continue;
          }
        };
        debug!(target: "codejudge_backend", kind = incoming.kind(), "WS received");

        let (reply, judging) = match handle_client_ws(incoming, &state, &actor).await {
          Ok(r) => r,
          Err(e) => (error_msg(&e), None),
        };
        if !send(&mut socket, &reply).await { break; }

        // Submissions reply twice: the placeholder above, then the outcome.
        if let Some(handle) = judging {
          let reply = match logic::await_submission(&state, &actor, handle).await {
            Ok(out) => ServerWsMessage::Result { result: out.result, submission_id: out.submission_id },
            Err(e) => error_msg(&e),
          };
          if !send(&mut socket, &reply).await { break; }
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "codejudge_backend", "WebSocket disconnected");
}

/// First reply to a client message, plus the judging task when the message
/// started a submission.
async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &Arc<AppState>,
  actor: &Actor,
) -> AppResult<(ServerWsMessage, Option<JoinHandle<SubmitOut>>)> {
  match msg {
    ClientWsMessage::Ping => Ok((ServerWsMessage::Pong, None)),

    ClientWsMessage::SelectProblem { problem_id } => {
      let problem = logic::select_problem(state, actor, &problem_id).await?;
      info!(target: "codejudge_backend", id = %problem.id, "WS problem selected");
      Ok((ServerWsMessage::Problem { problem }, None))
    }

    ClientWsMessage::ChangeLanguage { language } => {
      let s = logic::change_language(state, actor, language).await?;
      Ok((ServerWsMessage::Editor { language: s.language, code: s.code }, None))
    }

    ClientWsMessage::SetCode { code } => {
      let s = logic::set_code(state, actor, code).await?;
      Ok((ServerWsMessage::Editor { language: s.language, code: s.code }, None))
    }

    ClientWsMessage::SubmitCode { code } => {
      let handle = logic::begin_submission(state, actor, code).await?;
      let placeholder = ServerWsMessage::Result { result: SubmissionResult::judging(), submission_id: None };
      Ok((placeholder, Some(handle)))
    }
  }
}
