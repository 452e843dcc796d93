//! CodeJudge · Educational Coding Judge Backend
//!
//! - Axum HTTP + WebSocket API
//! - Judging and problem generation delegated to an LLM (Gemini or OpenAI-compatible)
//! - Registry persisted to a JSON key-value file
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   DATA_PATH            : store file (default "./data/judge.json"; "memory" keeps state in RAM)
//!   JUDGE_CONFIG_PATH    : path to TOML config (prompts + optional problem bank)
//!   JUDGE_PROVIDER       : "gemini" or "openai" to force a provider
//!   GEMINI_API_KEY       : enables Gemini (API_KEY is accepted as well)
//!   GEMINI_BASE_URL      : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_FAST_MODEL    : model for problem generation
//!   GEMINI_STRONG_MODEL  : model for judging
//!   OPENAI_API_KEY       : enables the OpenAI-compatible judge
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL    : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL  : default "gpt-4o"
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod auth;
mod config;
mod domain;
mod editor;
mod error;
mod judge;
mod logic;
mod protocol;
mod routes;
mod seeds;
mod state;
mod store;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Load the registry (seeding on first run) and pick the judge provider.
  let state = Arc::new(AppState::from_env()?);

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "codejudge_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
