//! Google Generative Language (Gemini) client.
//!
//! We only call `models/{model}:generateContent` with `responseMimeType:
//! application/json` and a `responseSchema`, then hand the text to `parse`.
//! Calls log model names, latency and token usage (never prompts or code).

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Language, Problem, ProblemDraft, SubmissionResult};
use crate::judge::{extract_api_error, parse, prompt, GenerationRequest, Judge, JudgeError};
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct GeminiJudge {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  /// Used for problem generation.
  pub fast_model: String,
  /// Used for judging.
  pub strong_model: String,
}

impl GeminiJudge {
  /// Construct the client if GEMINI_API_KEY (or API_KEY) is set; otherwise None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY")
      .or_else(|_| std::env::var("API_KEY"))
      .ok()
      .filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
    let fast_model =
      std::env::var("GEMINI_FAST_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into());
    let strong_model =
      std::env::var("GEMINI_STRONG_MODEL").unwrap_or_else(|_| "gemini-2.5-pro".into());

    let client = reqwest::Client::builder().build().ok()?;
    Some(Self { client, api_key, base_url, fast_model, strong_model })
  }

  /// JSON-mode generateContent. Returns the concatenated candidate text.
  #[instrument(level = "info", skip(self, system, user, schema), fields(model = %model))]
  async fn generate_json(
    &self,
    model: &str,
    system: &str,
    user: &str,
    schema: Value,
    temperature: f32,
  ) -> Result<String, JudgeError> {
    let url = format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), model);
    let req = GenerateContentRequest {
      system_instruction: Content { role: None, parts: vec![Part { text: system.into() }] },
      contents: vec![Content { role: Some("user".into()), parts: vec![Part { text: user.into() }] }],
      generation_config: GenerationConfig {
        response_mime_type: "application/json".into(),
        response_schema: schema,
        temperature,
      },
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "codejudge-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or(body);
      return Err(JudgeError::Http { status: status.as_u16(), message });
    }

    let body: GenerateContentResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(target: "judge", prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    let text: String = body.candidates.first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
      .unwrap_or_default();

    if text.trim().is_empty() {
      return Err(JudgeError::EmptyResponse);
    }
    debug!(target: "judge", reply = %trunc_for_log(&text, 300), "Model reply");
    Ok(text)
  }
}

#[async_trait]
impl Judge for GeminiJudge {
  fn describe(&self) -> String {
    format!("gemini:{}/{}", self.fast_model, self.strong_model)
  }

  #[instrument(level = "info", skip(self, prompts, req), fields(difficulty = %req.difficulty.as_str(), topic_len = req.topic.len(), model = %self.fast_model))]
  async fn generate_problem(&self, prompts: &Prompts, req: &GenerationRequest) -> Result<ProblemDraft, JudgeError> {
    let (system, user) = prompt::generation_messages(prompts, req);
    let start = Instant::now();
    let result = self
      .generate_json(&self.fast_model, &system, &user, prompt::generation_schema(), 0.9)
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
      .generate_json(&self.strong_model, &system, &user, prompt::judging_schema(), 0.2)
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

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  system_instruction: Content,
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part { text: String }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  response_mime_type: String,
  response_schema: Value,
  temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
  #[serde(default)] content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)] parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
  #[serde(default)] text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}
