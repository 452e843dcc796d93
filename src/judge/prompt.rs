//! Prompt and response-schema building for the judge model.

use serde_json::{json, Value};

use crate::config::Prompts;
use crate::domain::{Language, Problem};
use crate::judge::GenerationRequest;
use crate::util::fill_template;

/// (system, user) messages for a problem-generation call.
pub fn generation_messages(prompts: &Prompts, req: &GenerationRequest) -> (String, String) {
  let pairs = [("topic", req.topic.trim()), ("difficulty", req.difficulty.as_str())];
  (
    fill_template(&prompts.generation_system, &pairs),
    fill_template(&prompts.generation_user_template, &pairs),
  )
}

/// (system, user) messages for a judging call. Every test case is listed and
/// tagged `[public]` or `[hidden]`; the code goes in a fenced block.
pub fn judging_messages(
  prompts: &Prompts,
  problem: &Problem,
  code: &str,
  language: Language,
) -> (String, String) {
  let constraints = if problem.constraints.is_empty() {
    "(none)".to_string()
  } else {
    problem.constraints.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n")
  };
  let samples = format_samples(problem);
  let test_cases = format_test_cases(problem);
  let pairs = [
    ("title", problem.title.as_str()),
    ("description", problem.description.as_str()),
    ("input_format", problem.input_format.as_str()),
    ("output_format", problem.output_format.as_str()),
    ("constraints", constraints.as_str()),
    ("samples", samples.as_str()),
    ("test_cases", test_cases.as_str()),
    ("language", language.display_name()),
    ("fence_tag", language.fence_tag()),
    ("code", code),
  ];
  (
    fill_template(&prompts.judging_system, &pairs),
    fill_template(&prompts.judging_user_template, &pairs),
  )
}

fn format_samples(problem: &Problem) -> String {
  if problem.samples.is_empty() {
    return "(see public test cases)".into();
  }
  problem
    .samples
    .iter()
    .map(|s| format!("Input:\n{}\nOutput:\n{}", s.input, s.output))
    .collect::<Vec<_>>()
    .join("\n\n")
}

fn format_test_cases(problem: &Problem) -> String {
  if problem.test_cases.is_empty() {
    return "(no test cases provided; judge against the statement)".into();
  }
  problem
    .test_cases
    .iter()
    .enumerate()
    .map(|(i, tc)| {
      let tag = if tc.is_public { "public" } else { "hidden" };
      format!("#{} [{}]\nInput:\n{}\nExpected Output:\n{}", i + 1, tag, tc.input, tc.output)
    })
    .collect::<Vec<_>>()
    .join("\n\n")
}

/// Gemini `responseSchema` for generation. OpenAI-compatible endpoints only
/// get `json_object` mode, so there the shape lives in the prompt.
pub fn generation_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "title": { "type": "STRING" },
      "description": { "type": "STRING", "description": "Markdown statement with an embedded example." },
      "difficulty": { "type": "STRING", "enum": ["Easy", "Medium", "Hard"] },
      "inputFormat": { "type": "STRING" },
      "outputFormat": { "type": "STRING" },
      "constraints": { "type": "ARRAY", "items": { "type": "STRING" } },
      "testCases": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "input": { "type": "STRING" },
            "output": { "type": "STRING" },
            "isPublic": { "type": "BOOLEAN" }
          },
          "required": ["input", "output", "isPublic"]
        }
      }
    },
    "required": ["title", "description", "difficulty", "testCases"]
  })
}

pub fn judging_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "verdict": {
        "type": "STRING",
        "enum": ["Accepted", "Wrong Answer", "Time Limit Exceeded", "Compilation Error", "Runtime Error"]
      },
      "explanation": { "type": "STRING", "description": "One-sentence summary of the verdict." },
      "details": { "type": "STRING", "description": "Failing case or error text; null when accepted.", "nullable": true }
    },
    "required": ["verdict", "explanation"]
  })
}
