//! Domain models: verdicts, languages, problems, submissions, users and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a submission. The first five are produced by the judge;
/// `Pending` and `Judging` only exist while a call is in flight.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Verdict {
  Accepted,
  #[serde(rename = "Wrong Answer", alias = "WrongAnswer")]
  WrongAnswer,
  #[serde(rename = "Time Limit Exceeded", alias = "TimeLimitExceeded")]
  TimeLimitExceeded,
  #[serde(rename = "Compilation Error", alias = "CompilationError")]
  CompilationError,
  #[serde(rename = "Runtime Error", alias = "RuntimeError")]
  RuntimeError,
  Pending,
  Judging,
}

impl Verdict {
  /// Verdicts the judge is allowed to return.
  pub const FINAL: [Verdict; 5] = [
    Verdict::Accepted,
    Verdict::WrongAnswer,
    Verdict::TimeLimitExceeded,
    Verdict::CompilationError,
    Verdict::RuntimeError,
  ];

  pub fn is_final(self) -> bool {
    Self::FINAL.contains(&self)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Verdict::Accepted => "Accepted",
      Verdict::WrongAnswer => "Wrong Answer",
      Verdict::TimeLimitExceeded => "Time Limit Exceeded",
      Verdict::CompilationError => "Compilation Error",
      Verdict::RuntimeError => "Runtime Error",
      Verdict::Pending => "Pending",
      Verdict::Judging => "Judging",
    }
  }
}

impl std::fmt::Display for Verdict {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Difficulty {
  #[default]
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    }
  }
}

/// Languages the editor offers. The judge never runs code, so this list is
/// only about prompts and starter snippets.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Language {
  #[default]
  Python,
  JavaScript,
  TypeScript,
  Java,
  #[serde(rename = "C++", alias = "Cpp")]
  Cpp,
  Go,
  Rust,
}

impl Language {
  pub const ALL: [Language; 7] = [
    Language::Python,
    Language::JavaScript,
    Language::TypeScript,
    Language::Java,
    Language::Cpp,
    Language::Go,
    Language::Rust,
  ];

  pub fn display_name(self) -> &'static str {
    match self {
      Language::Python => "Python",
      Language::JavaScript => "JavaScript",
      Language::TypeScript => "TypeScript",
      Language::Java => "Java",
      Language::Cpp => "C++",
      Language::Go => "Go",
      Language::Rust => "Rust",
    }
  }

  /// Tag used on the fenced code block sent to the judge.
  pub fn fence_tag(self) -> &'static str {
    match self {
      Language::Python => "python",
      Language::JavaScript => "javascript",
      Language::TypeScript => "typescript",
      Language::Java => "java",
      Language::Cpp => "cpp",
      Language::Go => "go",
      Language::Rust => "rust",
    }
  }

  pub fn default_snippet(self) -> &'static str {
    crate::seeds::default_snippet(self)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
  pub id: String,
  pub input: String,
  pub output: String,
  #[serde(default)]
  pub is_public: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sample {
  pub input: String,
  pub output: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

/// Where did a problem come from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProblemOrigin {
  Seed,      // built into the binary
  Config,    // TOML problem bank
  Manual,    // created by a teacher/admin
  Generated, // drafted by the judge model and saved
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
  pub id: String,
  pub title: String,
  /// Markdown.
  pub description: String,
  #[serde(default)] pub input_format: String,
  #[serde(default)] pub output_format: String,
  #[serde(default)] pub constraints: Vec<String>,
  #[serde(default)] pub samples: Vec<Sample>,
  #[serde(default)] pub difficulty: Option<Difficulty>,
  #[serde(default)] pub test_cases: Vec<TestCase>,
  pub origin: ProblemOrigin,
  pub created_at: DateTime<Utc>,
}

impl Problem {
  pub fn public_test_cases(&self) -> impl Iterator<Item = &TestCase> {
    self.test_cases.iter().filter(|tc| tc.is_public)
  }

  pub fn hidden_test_cases(&self) -> impl Iterator<Item = &TestCase> {
    self.test_cases.iter().filter(|tc| !tc.is_public)
  }

  /// Samples as shown to a submitter: explicit samples first, then every
  /// public test case. Hidden cases never appear here.
  pub fn visible_samples(&self) -> Vec<Sample> {
    let mut out = self.samples.clone();
    out.extend(self.public_test_cases().map(|tc| Sample {
      input: tc.input.clone(),
      output: tc.output.clone(),
      explanation: None,
    }));
    out
  }
}

/// A problem that has not been stored yet: the output of the generation call
/// and the body of a create-problem command.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDraft {
  pub title: String,
  pub description: String,
  #[serde(default)] pub difficulty: Option<Difficulty>,
  #[serde(default)] pub input_format: String,
  #[serde(default)] pub output_format: String,
  #[serde(default)] pub constraints: Vec<String>,
  #[serde(default)] pub samples: Vec<Sample>,
  #[serde(default)] pub test_cases: Vec<DraftTestCase>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DraftTestCase {
  pub input: String,
  pub output: String,
  #[serde(default)]
  pub is_public: bool,
}

impl DraftTestCase {
  pub fn into_test_case(self) -> TestCase {
    TestCase {
      id: uuid::Uuid::new_v4().to_string(),
      input: self.input,
      output: self.output,
      is_public: self.is_public,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionResult {
  pub verdict: Verdict,
  pub explanation: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
}

impl SubmissionResult {
  /// Placeholder shown while the judge call is outstanding.
  pub fn judging() -> Self {
    Self {
      verdict: Verdict::Judging,
      explanation: "Your submission is being evaluated...".into(),
      details: None,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
  pub id: String,
  pub user_id: String,
  pub problem_id: String,
  pub problem_title: String,
  pub code: String,
  pub language: Language,
  pub timestamp: DateTime<Utc>,
  pub result: SubmissionResult,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Student,
  Teacher,
  Admin,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
  Submit,
  CreateProblem,
  GenerateProblem,
  ManageTestCases,
  DeleteProblem,
  ViewAllSubmissions,
  ViewHiddenTestCases,
  ManageUsers,
}

const STUDENT_CAPS: &[Capability] = &[Capability::Submit];

const TEACHER_CAPS: &[Capability] = &[
  Capability::Submit,
  Capability::CreateProblem,
  Capability::GenerateProblem,
  Capability::ManageTestCases,
  Capability::DeleteProblem,
  Capability::ViewAllSubmissions,
  Capability::ViewHiddenTestCases,
];

const ADMIN_CAPS: &[Capability] = &[
  Capability::Submit,
  Capability::CreateProblem,
  Capability::GenerateProblem,
  Capability::ManageTestCases,
  Capability::DeleteProblem,
  Capability::ViewAllSubmissions,
  Capability::ViewHiddenTestCases,
  Capability::ManageUsers,
];

impl Role {
  pub fn capabilities(self) -> &'static [Capability] {
    match self {
      Role::Student => STUDENT_CAPS,
      Role::Teacher => TEACHER_CAPS,
      Role::Admin => ADMIN_CAPS,
    }
  }

  pub fn can(self, cap: Capability) -> bool {
    self.capabilities().contains(&cap)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub username: String,
  /// Argon2 PHC string.
  pub password_hash: String,
  pub role: Role,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn verdict_wire_names_accept_both_spellings() {
    let v: Verdict = serde_json::from_str("\"Wrong Answer\"").unwrap();
    assert_eq!(v, Verdict::WrongAnswer);
    let v: Verdict = serde_json::from_str("\"TimeLimitExceeded\"").unwrap();
    assert_eq!(v, Verdict::TimeLimitExceeded);
    assert_eq!(serde_json::to_string(&Verdict::RuntimeError).unwrap(), "\"Runtime Error\"");
    assert!(serde_json::from_str::<Verdict>("\"Partially Correct\"").is_err());
  }

  #[test]
  fn transient_verdicts_are_not_final() {
    assert!(Verdict::FINAL.iter().all(|v| v.is_final()));
    assert!(!Verdict::Pending.is_final());
    assert!(!Verdict::Judging.is_final());
  }

  #[test]
  fn role_capabilities_are_tiered() {
    assert!(Role::Student.can(Capability::Submit));
    assert!(!Role::Student.can(Capability::CreateProblem));
    assert!(Role::Teacher.can(Capability::GenerateProblem));
    assert!(!Role::Teacher.can(Capability::ManageUsers));
    for cap in Role::Teacher.capabilities() {
      assert!(Role::Admin.can(*cap));
    }
    assert!(Role::Admin.can(Capability::ManageUsers));
  }

  #[test]
  fn visible_samples_skip_hidden_cases() {
    let p = Problem {
      id: "p1".into(),
      title: "Sum".into(),
      description: "Add two numbers".into(),
      input_format: String::new(),
      output_format: String::new(),
      constraints: vec![],
      samples: vec![],
      difficulty: Some(Difficulty::Easy),
      test_cases: vec![
        TestCase { id: "t1".into(), input: "1 2".into(), output: "3".into(), is_public: true },
        TestCase { id: "t2".into(), input: "10 20".into(), output: "30".into(), is_public: false },
      ],
      origin: ProblemOrigin::Generated,
      created_at: Utc::now(),
    };
    let samples = p.visible_samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].input, "1 2");
  }

  #[test]
  fn cpp_uses_display_name_on_the_wire() {
    assert_eq!(serde_json::to_string(&Language::Cpp).unwrap(), "\"C++\"");
    assert_eq!(serde_json::from_str::<Language>("\"Cpp\"").unwrap(), Language::Cpp);
  }
}
