//! Minimal OpenAI-compatible client for our use-cases.
//!
//! We only call chat.completions and request a strict JSON object.
//! Calls are instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key or the submitted code.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Language, Problem, ProblemDraft, SubmissionResult};
use crate::judge::{extract_api_error, parse, prompt, GenerationRequest, Judge, JudgeError};
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct OpenAiJudge {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

impl OpenAiJudge {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder().build().ok()?;
    Some(Self { client, api_key, base_url, fast_model, strong_model })
  }

  /// JSON-object chat completion. Returns the raw message content.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<String, JudgeError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: ResponseFormat { r#type: "json_object".into() },
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "codejudge-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or(body);
      return Err(JudgeError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(target: "judge", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();
    if text.trim().is_empty() {
      return Err(JudgeError::EmptyResponse);
    }
    debug!(target: "judge", reply = %trunc_for_log(&text, 300), "Model reply");
    Ok(text)
  }
}

#[async_trait]
impl Judge for OpenAiJudge {
  fn describe(&self) -> String {
    format!("openai:{}/{}", self.fast_model, self.strong_model)
  }

  #[instrument(level = "info", skip(self, prompts, req), fields(difficulty = %req.difficulty.as_str(), topic_len = req.topic.len(), model = %self.fast_model))]
  async fn generate_problem(&self, prompts: &Prompts, req: &GenerationRequest) -> Result<ProblemDraft, JudgeError> {
    let (system, user) = prompt::generation_messages(prompts, req);
    let start = Instant::now();
    let result = self
      .chat_json(&self.fast_model, &system, &user, 0.9)
      .await
      .and_then(|text| parse::parse_problem_draft(&text));
    let elapsed = start.elapsed();

    match &result {
      Ok(d) => info!(target: "judge", ?elapsed, cases = d.test_cases.len(), "Problem generated"),
      Err(e) => error!(target: "judge", ?elapsed, error = %e, "Problem generation failed"),
    }
    result
  }

  #[instrument(level = "info", skip(self, prompts, problem, code), fields(problem_id = %problem.id, language = %language.display_name(), code_len = code.len(), model = %self.strong_model))]
  async fn judge(
    &self,
    prompts: &Prompts,
    problem: &Problem,
    code: &str,
    language: Language,
  ) -> Result<SubmissionResult, JudgeError> {
    let (system, user) = prompt::judging_messages(prompts, problem, code, language);
    let start = Instant::now();
    let result = self
      .chat_json(&self.strong_model, &system, &user, 0.2)
      .await
      .and_then(|text| parse::parse_judgement(&text, problem));
    let elapsed = start.elapsed();

    match &result {
      Ok(r) => info!(target: "judge", ?elapsed, verdict = %r.verdict, "Submission judged"),
      Err(e) => error!(target: "judge", ?elapsed, error = %e, "Judging call failed"),
    }
    result
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  response_format: ResponseFormat,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}
