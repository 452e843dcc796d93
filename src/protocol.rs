//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Capability, Difficulty, DraftTestCase, Language, Problem, ProblemDraft, ProblemOrigin, Role,
    Sample, SubmissionResult, TestCase, User,
};
use crate::state::Session;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    SelectProblem {
        #[serde(rename = "problemId")]
        problem_id: String,
    },
    ChangeLanguage {
        language: Language,
    },
    SetCode {
        code: String,
    },
    SubmitCode {
        #[serde(default)]
        code: Option<String>,
    },
}

impl ClientWsMessage {
    /// Message tag for logs; payloads may carry source code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::SelectProblem { .. } => "select_problem",
            Self::ChangeLanguage { .. } => "change_language",
            Self::SetCode { .. } => "set_code",
            Self::SubmitCode { .. } => "submit_code",
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Problem {
        problem: ProblemOut,
    },
    Editor {
        language: Language,
        code: String,
    },
    /// Sent twice per submission: the Judging placeholder, then the outcome.
    Result {
        result: SubmissionResult,
        #[serde(rename = "submissionId", skip_serializing_if = "Option::is_none")]
        submission_id: Option<String>,
    },
    Error {
        code: String,
        message: String,
    },
}

// --- Accounts ---

#[derive(Debug, Deserialize)]
pub struct LoginIn {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub type RegisterIn = LoginIn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordIn {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOut {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserOut {
    fn from(u: &User) -> Self {
        Self { id: u.id.clone(), username: u.username.clone(), role: u.role, created_at: u.created_at }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthOut {
    pub token: String,
    pub user: UserOut,
    pub capabilities: Vec<Capability>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub selected_problem: Option<String>,
    pub language: Language,
    pub code: String,
    pub pending: bool,
    pub last_result: Option<SubmissionResult>,
}

impl From<&Session> for SessionOut {
    fn from(s: &Session) -> Self {
        Self {
            selected_problem: s.selected_problem.clone(),
            language: s.editor.language,
            code: s.editor.code.clone(),
            pending: s.pending,
            last_result: s.last_result.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeOut {
    pub user: UserOut,
    pub capabilities: Vec<Capability>,
    pub session: SessionOut,
}

#[derive(Debug, Deserialize)]
pub struct RoleIn {
    pub role: Role,
}

// --- Problems ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSummaryOut {
    pub id: String,
    pub title: String,
    pub difficulty: Option<Difficulty>,
    pub origin: ProblemOrigin,
}

impl From<&Problem> for ProblemSummaryOut {
    fn from(p: &Problem) -> Self {
        Self { id: p.id.clone(), title: p.title.clone(), difficulty: p.difficulty, origin: p.origin }
    }
}

/// Problem as shown to a caller. `samples` never contains hidden cases;
/// `test_cases` is only filled for callers allowed to see them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemOut {
    pub id: String,
    pub title: String,
    pub description: String,
    pub input_format: String,
    pub output_format: String,
    pub constraints: Vec<String>,
    pub samples: Vec<Sample>,
    pub difficulty: Option<Difficulty>,
    pub origin: ProblemOrigin,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<Vec<TestCase>>,
}

pub fn to_problem_out(p: &Problem, with_test_cases: bool) -> ProblemOut {
    ProblemOut {
        id: p.id.clone(),
        title: p.title.clone(),
        description: p.description.clone(),
        input_format: p.input_format.clone(),
        output_format: p.output_format.clone(),
        constraints: p.constraints.clone(),
        samples: p.visible_samples(),
        difficulty: p.difficulty,
        origin: p.origin,
        created_at: p.created_at,
        test_cases: with_test_cases.then(|| p.test_cases.clone()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProblemIn {
    #[serde(flatten)]
    pub draft: ProblemDraft,
    /// Saving a previewed generation result.
    #[serde(default)]
    pub generated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCasesIn {
    pub test_cases: Vec<DraftTestCase>,
}

// --- Session ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectProblemIn {
    pub problem_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageIn {
    pub language: Language,
}

#[derive(Debug, Deserialize)]
pub struct CodeIn {
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitIn {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOut {
    pub result: SubmissionResult,
    /// Absent when the judge call failed and nothing was recorded.
    pub submission_id: Option<String>,
}

// --- Misc ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageOut {
    pub language: Language,
    pub name: &'static str,
    pub fence_tag: &'static str,
    pub snippet: &'static str,
}

impl From<Language> for LanguageOut {
    fn from(l: Language) -> Self {
        Self { language: l, name: l.display_name(), fence_tag: l.fence_tag(), snippet: l.default_snippet() }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
