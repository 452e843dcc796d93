//! The external judging collaborator.
//!
//! Problem generation and code evaluation are delegated to a generative model.
//! `Judge` is the seam: the network clients (`gemini`, `openai`) implement it,
//! and tests swap in a scripted double. Every call is a single best-effort
//! request: no retry, no backoff, no timeout. Any failure is returned as a
//! `JudgeError`; the caller decides how to surface it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Prompts;
use crate::domain::{Difficulty, Language, Problem, ProblemDraft, SubmissionResult};

pub mod gemini;
pub mod openai;
pub mod parse;
pub mod prompt;

#[cfg(test)]
pub mod scripted;

pub use gemini::GeminiJudge;
pub use openai::OpenAiJudge;

#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
  #[error("no judge model is configured")]
  Unavailable,
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("judge HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("judge returned an empty response")]
  EmptyResponse,
  #[error("JSON parse error: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("response violates schema: {0}")]
  Schema(String),
  #[error("judge call aborted: {0}")]
  Aborted(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
  pub topic: String,
  #[serde(default)]
  pub difficulty: Difficulty,
}

#[async_trait]
pub trait Judge: Send + Sync {
  /// Short label for logs, e.g. `gemini:gemini-2.5-pro`.
  fn describe(&self) -> String;

  async fn generate_problem(
    &self,
    prompts: &Prompts,
    req: &GenerationRequest,
  ) -> Result<ProblemDraft, JudgeError>;

  async fn judge(
    &self,
    prompts: &Prompts,
    problem: &Problem,
    code: &str,
    language: Language,
  ) -> Result<SubmissionResult, JudgeError>;
}

/// Pick a provider from the environment.
///
/// JUDGE_PROVIDER=gemini|openai forces one; otherwise Gemini wins when its key
/// is present, then OpenAI. Returns None when no key is configured.
pub fn from_env() -> Option<Arc<dyn Judge>> {
  let forced = std::env::var("JUDGE_PROVIDER").ok().map(|s| s.to_ascii_lowercase());
  let judge: Option<Arc<dyn Judge>> = match forced.as_deref() {
    Some("gemini") => GeminiJudge::from_env().map(|j| Arc::new(j) as Arc<dyn Judge>),
    Some("openai") => OpenAiJudge::from_env().map(|j| Arc::new(j) as Arc<dyn Judge>),
    _ => GeminiJudge::from_env()
      .map(|j| Arc::new(j) as Arc<dyn Judge>)
      .or_else(|| OpenAiJudge::from_env().map(|j| Arc::new(j) as Arc<dyn Judge>)),
  };
  match &judge {
    Some(j) => info!(target: "judge", judge = %j.describe(), "Judge model enabled."),
    None => info!(target: "judge", "No judge model configured (set GEMINI_API_KEY or OPENAI_API_KEY). Submissions will fail with a runtime error."),
  }
  judge
}

/// Try to extract a clean error message from a provider error body.
/// Both Gemini and OpenAI wrap it as `{"error": {"message": ...}}`.
pub(crate) fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
