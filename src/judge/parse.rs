//! Response parsing for the judge model.
//!
//! Rules: the body must be a JSON object matching the schema; anything else
//! is a hard failure. `details` of `"null"` (or blank) means absent. Accepted
//! never carries details. Hidden test data is never passed through.

use serde::Deserialize;
use tracing::debug;

use crate::domain::{Difficulty, DraftTestCase, Problem, ProblemDraft, SubmissionResult, Verdict};
use crate::judge::JudgeError;

pub const HIDDEN_CASE_MESSAGE: &str = "Failed on a hidden test case.";

/// Hidden strings shorter than this are too generic to redact on sight.
const MIN_REDACT_LEN: usize = 4;

#[derive(Deserialize)]
struct RawJudgement {
  verdict: Verdict,
  explanation: String,
  #[serde(default)]
  details: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDraft {
  title: String,
  description: String,
  difficulty: Difficulty,
  #[serde(default)] input_format: Option<String>,
  #[serde(default)] output_format: Option<String>,
  #[serde(default)] constraints: Vec<String>,
  test_cases: Vec<RawCase>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCase {
  input: String,
  output: String,
  is_public: bool,
}

/// `"null"` and blank strings mean "no details".
pub fn normalize_details(details: Option<String>) -> Option<String> {
  details.and_then(|d| {
    let t = d.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("null") {
      None
    } else {
      Some(d)
    }
  })
}

pub fn parse_judgement(text: &str, problem: &Problem) -> Result<SubmissionResult, JudgeError> {
  let text = text.trim();
  if text.is_empty() {
    return Err(JudgeError::EmptyResponse);
  }
  let raw: RawJudgement = serde_json::from_str(text)?;

  if !raw.verdict.is_final() {
    return Err(JudgeError::Schema(format!("verdict '{}' is not a final verdict", raw.verdict)));
  }
  let explanation = raw.explanation.trim().to_string();
  if raw.verdict != Verdict::Accepted && explanation.is_empty() {
    return Err(JudgeError::Schema(format!("verdict '{}' without an explanation", raw.verdict)));
  }

  let details = match raw.verdict {
    Verdict::Accepted => {
      if raw.details.as_deref().is_some_and(|d| !d.trim().is_empty()) {
        debug!(target: "judge", "Dropping details on Accepted verdict");
      }
      None
    }
    _ => normalize_details(raw.details).map(|d| redact_hidden(d, problem)),
  };

  Ok(SubmissionResult { verdict: raw.verdict, explanation, details })
}

/// Replace details that quote a hidden test case. Strings that are also
/// visible to the submitter (statement, samples, public cases) are exempt.
pub fn redact_hidden(details: String, problem: &Problem) -> String {
  let visible = |needle: &str| {
    problem.description.contains(needle)
      || problem.samples.iter().any(|s| s.input.contains(needle) || s.output.contains(needle))
      || problem.public_test_cases().any(|tc| tc.input.contains(needle) || tc.output.contains(needle))
  };
  let leaks = problem.hidden_test_cases().any(|tc| {
    [tc.input.trim(), tc.output.trim()]
      .into_iter()
      .any(|s| s.chars().count() >= MIN_REDACT_LEN && details.contains(s) && !visible(s))
  });
  if leaks {
    debug!(target: "judge", "Redacted hidden test case data from details");
    HIDDEN_CASE_MESSAGE.to_string()
  } else {
    details
  }
}

/// Parse a generated problem. The draft must have a title, a description and
/// at least one public test case (the worked example).
pub fn parse_problem_draft(text: &str) -> Result<ProblemDraft, JudgeError> {
  let text = text.trim();
  if text.is_empty() {
    return Err(JudgeError::EmptyResponse);
  }
  let raw: RawDraft = serde_json::from_str(text)?;

  if raw.title.trim().is_empty() {
    return Err(JudgeError::Schema("empty title".into()));
  }
  if raw.description.trim().is_empty() {
    return Err(JudgeError::Schema("empty description".into()));
  }
  if !raw.test_cases.iter().any(|tc| tc.is_public) {
    return Err(JudgeError::Schema("no public test case".into()));
  }

  Ok(ProblemDraft {
    title: raw.title.trim().to_string(),
    description: raw.description,
    difficulty: Some(raw.difficulty),
    input_format: raw.input_format.unwrap_or_default(),
    output_format: raw.output_format.unwrap_or_default(),
    constraints: raw.constraints,
    samples: vec![],
    test_cases: raw
      .test_cases
      .into_iter()
      .map(|tc| DraftTestCase { input: tc.input, output: tc.output, is_public: tc.is_public })
      .collect(),
  })
}
