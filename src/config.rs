//! Loading judge configuration (prompts + optional problem bank) from TOML.
//!
//! See `JudgeConfig` and `Prompts` for expected schema.

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Difficulty, Problem, ProblemOrigin, Sample, TestCase};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct JudgeConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub problems: Vec<ProblemCfg>,
}

/// Problem entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ProblemCfg {
  #[serde(default)] pub id: Option<String>,
  pub title: String,
  pub description: String,
  #[serde(default)] pub difficulty: Option<Difficulty>,
  #[serde(default)] pub input_format: String,
  #[serde(default)] pub output_format: String,
  #[serde(default)] pub constraints: Vec<String>,
  #[serde(default)] pub samples: Vec<Sample>,
  #[serde(default)] pub test_cases: Vec<TestCaseCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TestCaseCfg {
  pub input: String,
  pub output: String,
  #[serde(default)] pub public: bool,
}

impl ProblemCfg {
  /// Bank entries need a title and a description; anything else is skipped.
  pub fn into_problem(self) -> Option<Problem> {
    if self.title.trim().is_empty() || self.description.trim().is_empty() {
      return None;
    }
    Some(Problem {
      id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
      title: self.title,
      description: self.description,
      input_format: self.input_format,
      output_format: self.output_format,
      constraints: self.constraints,
      samples: self.samples,
      difficulty: self.difficulty,
      test_cases: self
        .test_cases
        .into_iter()
        .map(|t| TestCase {
          id: Uuid::new_v4().to_string(),
          input: t.input,
          output: t.output,
          is_public: t.public,
        })
        .collect(),
      origin: ProblemOrigin::Config,
      created_at: Utc::now(),
    })
  }
}

/// Prompts sent to the judge model. Override them in TOML to tune wording.
///
/// Generation placeholders: `{topic}`, `{difficulty}`.
/// Judging placeholders: `{title}`, `{description}`, `{input_format}`,
/// `{output_format}`, `{constraints}`, `{samples}`, `{test_cases}`,
/// `{language}`, `{fence_tag}`, `{code}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generation_system: String,
  pub generation_user_template: String,
  pub judging_system: String,
  pub judging_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: "You write programming problems for a competitive programming platform. Respond ONLY with strict JSON.".into(),
      generation_user_template: "Create one new, self-contained informatics problem about '{topic}' at difficulty '{difficulty}'.\n\
Return JSON with fields: title (string), description (markdown string that embeds at least one worked example), \
difficulty (\"Easy\" | \"Medium\" | \"Hard\"), inputFormat (string), outputFormat (string), constraints (array of strings), \
testCases (array of {\"input\": string, \"output\": string, \"isPublic\": boolean}).\n\
Include 5 to 10 test cases. At least one test case must be public and must match the example in the description; \
the rest should be hidden and cover edge cases.".into(),
      judging_system: "You are an expert Online Judge for an informatics competition. You evaluate code by analysis, not execution. Respond ONLY with strict JSON.".into(),
      judging_user_template: "**Problem**\nTitle: {title}\nDescription:\n{description}\nInput Format: {input_format}\nOutput Format: {output_format}\nConstraints:\n{constraints}\nSamples:\n{samples}\n\n\
**Test cases**\n{test_cases}\n\n\
**Submission**\nLanguage: {language}\n```{fence_tag}\n{code}\n```\n\n\
Decide whether the code solves the problem for every test case within a typical 1-2 second limit.\n\
Return JSON {\"verdict\": one of \"Accepted\" | \"Wrong Answer\" | \"Time Limit Exceeded\" | \"Compilation Error\" | \"Runtime Error\", \
\"explanation\": one sentence, \"details\": string or null}.\n\
details must be null when the verdict is Accepted. Otherwise give the failing input/output or the error. \
NEVER reveal the input or expected output of a [hidden] test case: write \"Failed on a hidden test case.\" instead.".into(),
    }
  }
}

/// Attempt to load `JudgeConfig` from JUDGE_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_judge_config_from_env() -> Option<JudgeConfig> {
  let path = std::env::var("JUDGE_CONFIG_PATH").ok()?;
  load_judge_config(&path)
}

pub fn load_judge_config(path: &str) -> Option<JudgeConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<JudgeConfig>(&s) {
      Ok(cfg) => {
        info!(target: "codejudge_backend", %path, problems = cfg.problems.len(), "Loaded judge config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "codejudge_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "codejudge_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Problems from the TOML bank, minus invalid entries.
pub fn bank_problems(cfg: &JudgeConfig) -> Vec<Problem> {
  let mut out = Vec::new();
  for pc in cfg.problems.iter().cloned() {
    let title = pc.title.clone();
    match pc.into_problem() {
      Some(p) => out.push(p),
      None => warn!(target: "codejudge_backend", %title, "Skipping bank problem: missing title or description."),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_bank_and_partial_prompt_overrides() {
    let src = r#"
[prompts]
judging_system = "Be terse."

[[problems]]
title = "Echo"
description = "Print the input."
difficulty = "Easy"
test_cases = [
  { input = "a", output = "a", public = true },
  { input = "b", output = "b" },
]

[[problems]]
title = ""
description = "no title"
"#;
    let cfg: JudgeConfig = toml::from_str(src).unwrap();
    assert_eq!(cfg.prompts.judging_system, "Be terse.");
    assert_eq!(cfg.prompts.generation_system, Prompts::default().generation_system);

    let problems = bank_problems(&cfg);
    assert_eq!(problems.len(), 1);
    let echo = &problems[0];
    assert_eq!(echo.origin, ProblemOrigin::Config);
    assert_eq!(echo.difficulty, Some(Difficulty::Easy));
    assert_eq!(echo.public_test_cases().count(), 1);
    assert_eq!(echo.hidden_test_cases().count(), 1);
  }

  #[test]
  fn missing_file_yields_none() {
    assert!(load_judge_config("/definitely/not/here.toml").is_none());
  }
}
