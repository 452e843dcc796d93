//! Deterministic judge double for tests: replays queued outcomes in order.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Prompts;
use crate::domain::{Language, Problem, ProblemDraft, SubmissionResult};
use crate::judge::{GenerationRequest, Judge, JudgeError};

/// One queued reply: raw model text (run through the real parser), a
/// transport-level failure, or a client that panics mid-call.
pub enum Scripted {
  Text(String),
  Fail(JudgeError),
  Panic,
}

#[derive(Default)]
pub struct ScriptedJudge {
  replies: Mutex<VecDeque<Scripted>>,
  delay: Option<Duration>,
  calls: Mutex<usize>,
}

impl ScriptedJudge {
  pub fn new() -> Self {
    Self::default()
  }

  /// Hold every call for `delay` so tests can observe in-flight state.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn reply(self, text: impl Into<String>) -> Self {
    self.push(Scripted::Text(text.into()))
  }

  pub fn fail(self, err: JudgeError) -> Self {
    self.push(Scripted::Fail(err))
  }

  pub fn panic(self) -> Self {
    self.push(Scripted::Panic)
  }

  fn push(self, s: Scripted) -> Self {
    self.replies.lock().unwrap().push_back(s);
    self
  }

  pub fn calls(&self) -> usize {
    *self.calls.lock().unwrap()
  }

  async fn next(&self) -> Result<String, JudgeError> {
    *self.calls.lock().unwrap() += 1;
    let next = self.replies.lock().unwrap().pop_front();
    if let Some(d) = self.delay {
      tokio::time::sleep(d).await;
    }
    match next {
      Some(Scripted::Text(t)) => Ok(t),
      Some(Scripted::Fail(e)) => Err(e),
      Some(Scripted::Panic) => panic!("scripted judge client panicked"),
      None => Err(JudgeError::EmptyResponse),
    }
  }
}

#[async_trait]
impl Judge for ScriptedJudge {
  fn describe(&self) -> String {
    "scripted".into()
  }

  async fn generate_problem(&self, _prompts: &Prompts, _req: &GenerationRequest) -> Result<ProblemDraft, JudgeError> {
    let text = self.next().await?;
    crate::judge::parse::parse_problem_draft(&text)
  }

  async fn judge(
    &self,
    _prompts: &Prompts,
    problem: &Problem,
    _code: &str,
    _language: Language,
  ) -> Result<SubmissionResult, JudgeError> {
    let text = self.next().await?;
    crate::judge::parse::parse_judgement(&text, problem)
  }
}
