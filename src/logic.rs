//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Account commands (login, register, logout, password change)
//!   - Problem catalogue commands (view, create, generate, test cases, delete)
//!   - Per-session editor commands and the submit/judge cycle
//!   - Submission history and user administration
//!
//! Every command takes the authenticated `Actor` (except login/register) and
//! checks capabilities before touching the registry.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
  generate_session_token, hash_password, require_credentials, validate_new_password,
  validate_username, verify_password,
};
use crate::domain::{
  Capability, DraftTestCase, Language, Problem, ProblemDraft, ProblemOrigin, Role, Submission,
  SubmissionResult, User, Verdict,
};
use crate::error::{AppError, AppResult};
use crate::judge::{GenerationRequest, JudgeError};
use crate::protocol::*;
use crate::state::{Actor, AppState, Registry, Session, StateKey};

pub const JUDGE_FAILURE_EXPLANATION: &str = "The judge could not evaluate this submission.";

fn caps_of(role: Role) -> Vec<Capability> {
  role.capabilities().to_vec()
}

fn open_session(reg: &mut Registry, user: &User) -> String {
  let token = generate_session_token();
  reg.sessions.insert(token.clone(), Session::new(user.id.clone()));
  token
}

// --- Accounts ---

#[instrument(level = "info", skip(state, body), fields(username = %body.username))]
pub async fn login(state: &AppState, body: LoginIn) -> AppResult<AuthOut> {
  require_credentials(&body.username, &body.password)?;
  let username = body.username.trim();

  let mut reg = state.write().await;
  let user = reg.user_by_name(username).cloned().ok_or(AppError::InvalidCredentials)?;
  if !verify_password(&body.password, &user.password_hash) {
    warn!(target: "codejudge_backend", %username, "Login rejected");
    return Err(AppError::InvalidCredentials);
  }

  let token = open_session(&mut reg, &user);
  state.persist(&reg, &[StateKey::Sessions])?;
  info!(target: "codejudge_backend", user_id = %user.id, "Login");
  Ok(AuthOut { token, capabilities: caps_of(user.role), user: UserOut::from(&user) })
}

#[instrument(level = "info", skip(state, body), fields(username = %body.username))]
pub async fn register(state: &AppState, body: RegisterIn) -> AppResult<AuthOut> {
  require_credentials(&body.username, &body.password)?;
  let username = body.username.trim().to_string();
  validate_username(&username)?;
  let password_hash = hash_password(&body.password)?;

  let mut reg = state.write().await;
  if reg.user_by_name(&username).is_some() {
    return Err(AppError::AlreadyExists(format!("username '{username}'")));
  }
  let user = User {
    id: format!("user_{}", Uuid::new_v4().simple()),
    username,
    password_hash,
    role: Role::Student,
    created_at: Utc::now(),
  };
  reg.users.push(user.clone());
  let token = open_session(&mut reg, &user);
  state.persist(&reg, &[StateKey::Users, StateKey::Sessions])?;

  info!(target: "codejudge_backend", user_id = %user.id, "Registered");
  Ok(AuthOut { token, capabilities: caps_of(user.role), user: UserOut::from(&user) })
}

#[instrument(level = "info", skip_all, fields(user_id = %actor.user.id))]
pub async fn logout(state: &AppState, actor: &Actor) -> AppResult<()> {
  let mut reg = state.write().await;
  if reg.sessions.remove(&actor.token).is_some() {
    state.persist(&reg, &[StateKey::Sessions])?;
  }
  Ok(())
}

pub async fn me(state: &AppState, actor: &Actor) -> AppResult<MeOut> {
  let reg = state.read().await;
  let session = reg.sessions.get(&actor.token).ok_or(AppError::Unauthorized)?;
  Ok(MeOut {
    user: UserOut::from(&actor.user),
    capabilities: caps_of(actor.user.role),
    session: SessionOut::from(session),
  })
}

#[instrument(level = "info", skip_all, fields(user_id = %actor.user.id))]
pub async fn change_password(state: &AppState, actor: &Actor, body: ChangePasswordIn) -> AppResult<()> {
  if body.current_password.is_empty() || body.new_password.is_empty() || body.confirm_password.is_empty() {
    return Err(AppError::validation("All password fields are required"));
  }
  if !verify_password(&body.current_password, &actor.user.password_hash) {
    return Err(AppError::validation("Current password is incorrect"));
  }
  validate_new_password(&body.new_password, &body.confirm_password)?;
  let password_hash = hash_password(&body.new_password)?;

  let mut reg = state.write().await;
  let user = reg.users.iter_mut().find(|u| u.id == actor.user.id).ok_or(AppError::Unauthorized)?;
  user.password_hash = password_hash;
  state.persist(&reg, &[StateKey::Users])?;
  info!(target: "codejudge_backend", "Password changed");
  Ok(())
}

// --- Problems ---

pub async fn list_problems(state: &AppState) -> Vec<ProblemSummaryOut> {
  state.read().await.problems.iter().map(ProblemSummaryOut::from).collect()
}

pub async fn get_problem(state: &AppState, actor: &Actor, id: &str) -> AppResult<ProblemOut> {
  let reg = state.read().await;
  let p = reg.problem(id).ok_or_else(|| AppError::NotFound(format!("problem {id}")))?;
  Ok(to_problem_out(p, actor.can(Capability::ViewHiddenTestCases)))
}

fn validate_test_cases(cases: &[DraftTestCase]) -> AppResult<()> {
  if cases.iter().any(|c| c.output.trim().is_empty()) {
    return Err(AppError::validation("Every test case needs an expected output"));
  }
  Ok(())
}

#[instrument(level = "info", skip(state, actor, body), fields(user_id = %actor.user.id, title = %body.draft.title, generated = body.generated))]
pub async fn create_problem(state: &AppState, actor: &Actor, body: CreateProblemIn) -> AppResult<ProblemOut> {
  actor.require(Capability::CreateProblem)?;
  let CreateProblemIn { draft, generated } = body;
  if draft.title.trim().is_empty() || draft.description.trim().is_empty() {
    return Err(AppError::validation("Title and description are required"));
  }
  validate_test_cases(&draft.test_cases)?;

  let origin = if generated && actor.can(Capability::GenerateProblem) {
    ProblemOrigin::Generated
  } else {
    ProblemOrigin::Manual
  };
  let problem = draft_into_problem(draft, origin);

  let mut reg = state.write().await;
  reg.problems.push(problem.clone());
  state.persist(&reg, &[StateKey::Problems])?;
  info!(target: "codejudge_backend", id = %problem.id, ?origin, cases = problem.test_cases.len(), "Problem created");
  Ok(to_problem_out(&problem, actor.can(Capability::ViewHiddenTestCases)))
}

fn draft_into_problem(draft: ProblemDraft, origin: ProblemOrigin) -> Problem {
  Problem {
    id: format!("p_{}", Uuid::new_v4().simple()),
    title: draft.title.trim().to_string(),
    description: draft.description,
    input_format: draft.input_format,
    output_format: draft.output_format,
    constraints: draft.constraints,
    samples: draft.samples,
    difficulty: draft.difficulty,
    test_cases: draft.test_cases.into_iter().map(DraftTestCase::into_test_case).collect(),
    origin,
    created_at: Utc::now(),
  }
}

/// Ask the judge model for a draft. Nothing is stored; the caller saves the
/// preview through `create_problem`.
#[instrument(level = "info", skip(state, actor, req), fields(user_id = %actor.user.id, difficulty = %req.difficulty.as_str()))]
pub async fn generate_problem(state: &AppState, actor: &Actor, req: GenerationRequest) -> AppResult<ProblemDraft> {
  actor.require(Capability::GenerateProblem)?;
  if req.topic.trim().is_empty() {
    return Err(AppError::validation("Topic must not be empty"));
  }
  let judge = state.judge.clone().ok_or(JudgeError::Unavailable)?;
  let draft = judge.generate_problem(&state.prompts, &req).await?;
  info!(target: "codejudge_backend", title = %draft.title, cases = draft.test_cases.len(), "Draft generated");
  Ok(draft)
}

#[instrument(level = "info", skip(state, actor, cases), fields(user_id = %actor.user.id, %id, cases = cases.len()))]
pub async fn replace_test_cases(
  state: &AppState,
  actor: &Actor,
  id: &str,
  cases: Vec<DraftTestCase>,
) -> AppResult<ProblemOut> {
  actor.require(Capability::ManageTestCases)?;
  validate_test_cases(&cases)?;

  let mut reg = state.write().await;
  if reg.problem(id).is_none() {
    return Err(AppError::NotFound(format!("problem {id}")));
  }
  if reg.submissions.iter().any(|s| s.problem_id == id) {
    return Err(AppError::Conflict("problem has already been judged against".into()));
  }
  let p = reg.problems.iter_mut().find(|p| p.id == id).ok_or_else(|| AppError::NotFound(format!("problem {id}")))?;
  p.test_cases = cases.into_iter().map(DraftTestCase::into_test_case).collect();
  let out = to_problem_out(p, true);
  state.persist(&reg, &[StateKey::Problems])?;
  Ok(out)
}

#[instrument(level = "info", skip(state, actor), fields(user_id = %actor.user.id))]
pub async fn delete_problem(state: &AppState, actor: &Actor, id: &str) -> AppResult<()> {
  actor.require(Capability::DeleteProblem)?;

  let mut reg = state.write().await;
  let before = reg.problems.len();
  reg.problems.retain(|p| p.id != id);
  if reg.problems.len() == before {
    return Err(AppError::NotFound(format!("problem {id}")));
  }
  reg.submissions.retain(|s| s.problem_id != id);
  for s in reg.sessions.values_mut() {
    if s.selected_problem.as_deref() == Some(id) {
      s.selected_problem = None;
      s.last_result = None;
    }
  }
  state.persist(&reg, &[StateKey::Problems, StateKey::Submissions, StateKey::Sessions])?;
  info!(target: "codejudge_backend", %id, "Problem deleted");
  Ok(())
}

// --- Session editor ---

#[instrument(level = "info", skip(state, actor), fields(user_id = %actor.user.id))]
pub async fn select_problem(state: &AppState, actor: &Actor, problem_id: &str) -> AppResult<ProblemOut> {
  let mut reg = state.write().await;
  let out = reg
    .problem(problem_id)
    .map(|p| to_problem_out(p, actor.can(Capability::ViewHiddenTestCases)))
    .ok_or_else(|| AppError::NotFound(format!("problem {problem_id}")))?;
  let session = reg.session_mut(&actor.token)?;
  session.selected_problem = Some(problem_id.to_string());
  // A result in flight still lands; only the stale one is cleared.
  if !session.pending {
    session.last_result = None;
  }
  state.persist(&reg, &[StateKey::Sessions])?;
  Ok(out)
}

#[instrument(level = "debug", skip(state, actor), fields(user_id = %actor.user.id, language = %language.display_name()))]
pub async fn change_language(state: &AppState, actor: &Actor, language: Language) -> AppResult<SessionOut> {
  let mut reg = state.write().await;
  let session = reg.session_mut(&actor.token)?;
  let replaced = session.editor.change_language(language);
  debug!(target: "codejudge_backend", replaced, "Language changed");
  let out = SessionOut::from(&*session);
  state.persist(&reg, &[StateKey::Sessions])?;
  Ok(out)
}

#[instrument(level = "debug", skip(state, actor, code), fields(user_id = %actor.user.id, code_len = code.len()))]
pub async fn set_code(state: &AppState, actor: &Actor, code: String) -> AppResult<SessionOut> {
  let mut reg = state.write().await;
  let session = reg.session_mut(&actor.token)?;
  session.editor.set_code(code);
  let out = SessionOut::from(&*session);
  state.persist(&reg, &[StateKey::Sessions])?;
  Ok(out)
}

pub async fn current_result(state: &AppState, actor: &Actor) -> AppResult<SessionOut> {
  let reg = state.read().await;
  reg.sessions.get(&actor.token).map(SessionOut::from).ok_or(AppError::Unauthorized)
}

// --- Submit / judge ---

/// Start judging the session's current code.
///
/// Under the write lock this checks the preconditions, marks the session busy
/// and installs the Judging placeholder. The judge call itself runs in a
/// spawned task that finishes even if the caller goes away. Await the handle
/// for the outcome.
#[instrument(level = "info", skip(state, actor, code), fields(user_id = %actor.user.id))]
pub async fn begin_submission(
  state: &Arc<AppState>,
  actor: &Actor,
  code: Option<String>,
) -> AppResult<JoinHandle<SubmitOut>> {
  actor.require(Capability::Submit)?;

  let mut reg = state.write().await;
  let (problem_id, code, language) = {
    let session = reg.session_mut(&actor.token)?;
    if session.pending {
      return Err(AppError::Conflict("a submission is already being judged".into()));
    }
    if let Some(code) = code {
      session.editor.set_code(code);
    }
    let problem_id = session
      .selected_problem
      .clone()
      .ok_or_else(|| AppError::validation("Select a problem before submitting"))?;
    if session.editor.code.trim().is_empty() {
      return Err(AppError::validation("Code must not be empty"));
    }
    (problem_id, session.editor.code.clone(), session.editor.language)
  };
  let problem = reg
    .problem(&problem_id)
    .cloned()
    .ok_or_else(|| AppError::NotFound(format!("problem {problem_id}")))?;

  let session = reg.session_mut(&actor.token)?;
  session.pending = true;
  session.last_result = Some(SubmissionResult::judging());
  state.persist(&reg, &[StateKey::Sessions])?;
  drop(reg);

  info!(target: "judge", problem_id = %problem.id, language = %language.display_name(), code_len = code.len(), "Submission queued");
  let state = Arc::clone(state);
  let token = actor.token.clone();
  let user_id = actor.user.id.clone();
  Ok(tokio::spawn(async move { finish_submission(state, token, user_id, problem, code, language).await }))
}

async fn finish_submission(
  state: Arc<AppState>,
  token: String,
  user_id: String,
  problem: Problem,
  code: String,
  language: Language,
) -> SubmitOut {
  // Own task for the model call: a panicking client must not skip the
  // busy-flag release below.
  let outcome = match state.judge.clone() {
    Some(judge) => {
      let prompts = state.prompts.clone();
      let (p, c) = (problem.clone(), code.clone());
      match tokio::spawn(async move { judge.judge(&prompts, &p, &c, language).await }).await {
        Ok(r) => r,
        Err(e) => Err(JudgeError::Aborted(e.to_string())),
      }
    }
    None => Err(JudgeError::Unavailable),
  };

  let mut reg = state.write().await;
  let (result, submission_id) = match outcome {
    Ok(result) => {
      if reg.problem(&problem.id).is_some() && reg.user(&user_id).is_some() {
        let submission = Submission {
          id: format!("sub_{}", Uuid::new_v4().simple()),
          user_id,
          problem_id: problem.id.clone(),
          problem_title: problem.title.clone(),
          code,
          language,
          timestamp: Utc::now(),
          result: result.clone(),
        };
        let id = submission.id.clone();
        reg.submissions.push(submission);
        if let Err(e) = state.persist(&reg, &[StateKey::Submissions]) {
          error!(target: "store", error = %e, "Submission kept in memory only");
        }
        info!(target: "judge", problem_id = %problem.id, verdict = %result.verdict, submission_id = %id, "Submission recorded");
        (result, Some(id))
      } else {
        warn!(target: "judge", problem_id = %problem.id, %user_id, "Problem or user deleted while judging; result not recorded");
        (result, None)
      }
    }
    Err(e) => {
      error!(target: "judge", problem_id = %problem.id, error = %e, "Judging failed");
      (judge_failure(&e), None)
    }
  };

  if let Some(session) = reg.sessions.get_mut(&token) {
    session.pending = false;
    session.last_result = Some(result.clone());
  }
  SubmitOut { result, submission_id }
}

/// What the submitter sees when the judge call itself failed.
pub fn judge_failure(e: &JudgeError) -> SubmissionResult {
  SubmissionResult {
    verdict: Verdict::RuntimeError,
    explanation: JUDGE_FAILURE_EXPLANATION.into(),
    details: Some(e.to_string()),
  }
}

/// Wait for a judging task. The task releases the busy flag itself, even when
/// the judge client panics; this only handles the task being cancelled.
pub async fn await_submission(state: &AppState, actor: &Actor, handle: JoinHandle<SubmitOut>) -> AppResult<SubmitOut> {
  match handle.await {
    Ok(out) => Ok(out),
    Err(e) => {
      error!(target: "judge", error = %e, "Judging task aborted");
      let mut reg = state.write().await;
      if let Some(session) = reg.sessions.get_mut(&actor.token) {
        session.pending = false;
        session.last_result = None;
      }
      Err(AppError::Internal(format!("judging task aborted: {e}")))
    }
  }
}

pub async fn submit_code(state: &Arc<AppState>, actor: &Actor, code: Option<String>) -> AppResult<SubmitOut> {
  let handle = begin_submission(state, actor, code).await?;
  await_submission(state, actor, handle).await
}

// --- History ---

/// Newest first. Callers without `ViewAllSubmissions` see only their own.
pub async fn list_submissions(state: &AppState, actor: &Actor) -> Vec<Submission> {
  let all = actor.can(Capability::ViewAllSubmissions);
  let reg = state.read().await;
  let mut out: Vec<Submission> = reg
    .submissions
    .iter()
    .filter(|s| all || s.user_id == actor.user.id)
    .cloned()
    .collect();
  out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
  out
}

pub async fn get_submission(state: &AppState, actor: &Actor, id: &str) -> AppResult<Submission> {
  let reg = state.read().await;
  reg
    .submissions
    .iter()
    .find(|s| s.id == id && (s.user_id == actor.user.id || actor.can(Capability::ViewAllSubmissions)))
    .cloned()
    .ok_or_else(|| AppError::NotFound(format!("submission {id}")))
}

// --- Users ---

pub async fn list_users(state: &AppState, actor: &Actor) -> AppResult<Vec<UserOut>> {
  actor.require(Capability::ManageUsers)?;
  Ok(state.read().await.users.iter().map(UserOut::from).collect())
}

#[instrument(level = "info", skip(state, actor), fields(admin_id = %actor.user.id))]
pub async fn update_user_role(state: &AppState, actor: &Actor, id: &str, role: Role) -> AppResult<UserOut> {
  actor.require(Capability::ManageUsers)?;
  if id == actor.user.id {
    return Err(AppError::Forbidden("cannot change your own role".into()));
  }
  let mut reg = state.write().await;
  let user = reg.users.iter_mut().find(|u| u.id == id).ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
  user.role = role;
  let out = UserOut::from(&*user);
  state.persist(&reg, &[StateKey::Users])?;
  info!(target: "codejudge_backend", user_id = %id, ?role, "Role updated");
  Ok(out)
}

#[instrument(level = "info", skip(state, actor), fields(admin_id = %actor.user.id))]
pub async fn delete_user(state: &AppState, actor: &Actor, id: &str) -> AppResult<()> {
  actor.require(Capability::ManageUsers)?;
  if id == actor.user.id {
    return Err(AppError::Forbidden("cannot delete yourself".into()));
  }
  let mut reg = state.write().await;
  let before = reg.users.len();
  reg.users.retain(|u| u.id != id);
  if reg.users.len() == before {
    return Err(AppError::NotFound(format!("user {id}")));
  }
  reg.sessions.retain(|_, s| s.user_id != id);
  reg.submissions.retain(|s| s.user_id != id);
  state.persist(&reg, &[StateKey::Users, StateKey::Sessions, StateKey::Submissions])?;
  info!(target: "codejudge_backend", user_id = %id, "User deleted");
  Ok(())
}

pub fn languages() -> Vec<LanguageOut> {
  Language::ALL.iter().copied().map(LanguageOut::from).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  use crate::judge::scripted::ScriptedJudge;
  use crate::seeds::{SEED_ADMIN_PASSWORD, SEED_ADMIN_USERNAME};
  use crate::state::tests::{test_state, test_state_with};

  const ACCEPTED: &str = r#"{"verdict":"Accepted","explanation":"All tests pass.","details":"null"}"#;

  async fn admin(state: &AppState) -> Actor {
    let out = login(state, LoginIn { username: SEED_ADMIN_USERNAME.into(), password: SEED_ADMIN_PASSWORD.into() })
      .await
      .unwrap();
    state.authenticate(&out.token).await.unwrap()
  }

  async fn student(state: &AppState, name: &str) -> Actor {
    let out = register(state, LoginIn { username: name.into(), password: "pw".into() }).await.unwrap();
    state.authenticate(&out.token).await.unwrap()
  }

  #[tokio::test]
  async fn login_rejects_empty_and_wrong_credentials() {
    let state = test_state(ScriptedJudge::new());
    let e = login(&state, LoginIn { username: "".into(), password: "x".into() }).await.unwrap_err();
    assert!(matches!(e, AppError::Validation(_)));
    let e = login(&state, LoginIn { username: "admin".into(), password: "nope".into() }).await.unwrap_err();
    assert!(matches!(e, AppError::InvalidCredentials));
    assert!(state.read().await.sessions.is_empty());
  }

  #[tokio::test]
  async fn register_validates_and_rejects_duplicates() {
    let state = test_state(ScriptedJudge::new());
    let e = register(&state, LoginIn { username: "ab".into(), password: "pw".into() }).await.unwrap_err();
    assert_eq!(e.to_string(), "Username must be at least 3 characters");
    assert_eq!(state.read().await.users.len(), 1);

    let bob = student(&state, "bob").await;
    assert_eq!(bob.user.role, Role::Student);
    let e = register(&state, LoginIn { username: "bob".into(), password: "pw".into() }).await.unwrap_err();
    assert!(matches!(e, AppError::AlreadyExists(_)));
  }

  #[tokio::test]
  async fn change_password_checks_current_and_confirmation() {
    let state = test_state(ScriptedJudge::new());
    let a = admin(&state).await;
    let body = |cur: &str, new: &str, conf: &str| ChangePasswordIn {
      current_password: cur.into(),
      new_password: new.into(),
      confirm_password: conf.into(),
    };
    assert!(change_password(&state, &a, body("wrong", "abcd", "abcd")).await.is_err());
    assert!(change_password(&state, &a, body("password", "abcd", "abce")).await.is_err());
    assert!(change_password(&state, &a, body("password", "abc", "abc")).await.is_err());
    change_password(&state, &a, body("password", "abcd", "abcd")).await.unwrap();

    assert!(login(&state, LoginIn { username: "admin".into(), password: "password".into() }).await.is_err());
    assert!(login(&state, LoginIn { username: "admin".into(), password: "abcd".into() }).await.is_ok());
  }

  #[tokio::test]
  async fn accepted_submission_is_recorded() {
    let judge = ScriptedJudge::new().reply(ACCEPTED);
    let state = test_state(judge);
    let s = student(&state, "alice").await;
    select_problem(&state, &s, "p_sum").await.unwrap();

    let out = submit_code(&state, &s, Some("print(sum(map(int, input().split())))".into())).await.unwrap();
    assert_eq!(out.result.verdict, Verdict::Accepted);
    assert!(out.result.details.is_none());

    let history = list_submissions(&state, &s).await;
    assert_eq!(history.len(), 1);
    assert_eq!(Some(history[0].id.clone()), out.submission_id);
    assert_eq!(history[0].problem_title, "Sum of Two Numbers");

    let session = current_result(&state, &s).await.unwrap();
    assert!(!session.pending);
    assert_eq!(session.last_result.unwrap().verdict, Verdict::Accepted);
  }

  #[tokio::test]
  async fn judge_failure_becomes_runtime_error_without_history() {
    let judge = ScriptedJudge::new().reply("this is not json");
    let state = test_state(judge);
    let s = student(&state, "alice").await;
    select_problem(&state, &s, "p_sum").await.unwrap();

    let out = submit_code(&state, &s, Some("x = 1".into())).await.unwrap();
    assert_eq!(out.result.verdict, Verdict::RuntimeError);
    assert_eq!(out.result.explanation, JUDGE_FAILURE_EXPLANATION);
    assert!(out.submission_id.is_none());
    assert!(list_submissions(&state, &s).await.is_empty());
    assert!(!current_result(&state, &s).await.unwrap().pending);
  }

  #[tokio::test]
  async fn no_judge_configured_is_a_runtime_error() {
    let store: Arc<dyn crate::store::KvStore> = Arc::new(crate::store::MemoryStore::new());
    let state = Arc::new(AppState::load(store, None, Default::default(), vec![]).unwrap());
    let s = student(&state, "alice").await;
    select_problem(&state, &s, "p_sum").await.unwrap();
    let out = submit_code(&state, &s, Some("x = 1".into())).await.unwrap();
    assert_eq!(out.result.verdict, Verdict::RuntimeError);
  }

  #[tokio::test]
  async fn second_submit_while_pending_is_rejected() {
    let judge = ScriptedJudge::new().with_delay(Duration::from_millis(200)).reply(ACCEPTED);
    let state = test_state(judge);
    let s = student(&state, "alice").await;
    select_problem(&state, &s, "p_sum").await.unwrap();

    let handle = begin_submission(&state, &s, Some("x = 1".into())).await.unwrap();
    let view = current_result(&state, &s).await.unwrap();
    assert!(view.pending);
    assert_eq!(view.last_result.unwrap().verdict, Verdict::Judging);

    let e = begin_submission(&state, &s, None).await.unwrap_err();
    assert!(matches!(e, AppError::Conflict(_)));

    let out = await_submission(&state, &s, handle).await.unwrap();
    assert_eq!(out.result.verdict, Verdict::Accepted);
    assert_eq!(list_submissions(&state, &s).await.len(), 1);
  }

  #[tokio::test]
  async fn submit_requires_selection_and_code() {
    let judge = Arc::new(ScriptedJudge::new());
    let state = test_state_with(judge.clone());
    let s = student(&state, "alice").await;
    assert!(matches!(submit_code(&state, &s, None).await, Err(AppError::Validation(_))));
    select_problem(&state, &s, "p_sum").await.unwrap();
    assert!(matches!(submit_code(&state, &s, Some("  ".into())).await, Err(AppError::Validation(_))));
    assert_eq!(judge.calls(), 0);
  }

  #[tokio::test]
  async fn rejected_resubmit_does_not_reach_the_judge() {
    let judge = Arc::new(ScriptedJudge::new().with_delay(Duration::from_millis(100)).reply(ACCEPTED));
    let state = test_state_with(judge.clone());
    let s = student(&state, "alice").await;
    select_problem(&state, &s, "p_sum").await.unwrap();

    let handle = begin_submission(&state, &s, Some("x = 1".into())).await.unwrap();
    assert!(begin_submission(&state, &s, Some("x = 2".into())).await.is_err());
    await_submission(&state, &s, handle).await.unwrap();
    assert_eq!(judge.calls(), 1);
  }

  #[tokio::test]
  async fn user_deleted_while_judging_leaves_no_history() {
    let judge = ScriptedJudge::new().with_delay(Duration::from_millis(200)).reply(ACCEPTED);
    let state = test_state(judge);
    let a = admin(&state).await;
    let s = student(&state, "alice").await;
    select_problem(&state, &s, "p_sum").await.unwrap();

    let handle = begin_submission(&state, &s, Some("x = 1".into())).await.unwrap();
    delete_user(&state, &a, &s.user.id).await.unwrap();

    let out = handle.await.unwrap();
    assert_eq!(out.result.verdict, Verdict::Accepted);
    assert!(out.submission_id.is_none());
    assert!(state.read().await.submissions.is_empty());
  }

  #[tokio::test]
  async fn panicking_judge_clears_busy_flag_after_disconnect() {
    let state = test_state(ScriptedJudge::new().with_delay(Duration::from_millis(50)).panic());
    let s = student(&state, "alice").await;
    select_problem(&state, &s, "p_sum").await.unwrap();

    // Nobody awaits the handle, as when the client has gone away.
    drop(begin_submission(&state, &s, Some("x = 1".into())).await.unwrap());

    let mut view = current_result(&state, &s).await.unwrap();
    for _ in 0..100 {
      if !view.pending {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
      view = current_result(&state, &s).await.unwrap();
    }
    assert!(!view.pending);
    let result = view.last_result.unwrap();
    assert_eq!(result.verdict, Verdict::RuntimeError);
    assert_eq!(result.explanation, JUDGE_FAILURE_EXPLANATION);
    assert!(list_submissions(&state, &s).await.is_empty());
  }

  #[tokio::test]
  async fn language_switch_keeps_custom_code() {
    let state = test_state(ScriptedJudge::new());
    let s = student(&state, "alice").await;
    let view = change_language(&state, &s, Language::Rust).await.unwrap();
    assert_eq!(view.code, Language::Rust.default_snippet());
    set_code(&state, &s, "fn main() { println!(\"3\"); }".into()).await.unwrap();
    let view = change_language(&state, &s, Language::Go).await.unwrap();
    assert_eq!(view.language, Language::Go);
    assert_eq!(view.code, "fn main() { println!(\"3\"); }");
  }

  #[tokio::test]
  async fn test_cases_are_frozen_once_judged() {
    let judge = ScriptedJudge::new().reply(ACCEPTED);
    let state = test_state(judge);
    let a = admin(&state).await;
    let cases = vec![DraftTestCase { input: "2 2".into(), output: "4".into(), is_public: true }];

    let out = replace_test_cases(&state, &a, "p_sum", cases.clone()).await.unwrap();
    assert_eq!(out.test_cases.unwrap().len(), 1);

    let bad = vec![DraftTestCase { input: "1".into(), output: " ".into(), is_public: false }];
    assert!(matches!(replace_test_cases(&state, &a, "p_sum", bad).await, Err(AppError::Validation(_))));

    select_problem(&state, &a, "p_sum").await.unwrap();
    submit_code(&state, &a, Some("print(4)".into())).await.unwrap();
    let e = replace_test_cases(&state, &a, "p_sum", cases).await.unwrap_err();
    assert!(matches!(e, AppError::Conflict(_)));
  }

  #[tokio::test]
  async fn deleting_a_problem_clears_selections_and_history() {
    let judge = ScriptedJudge::new().reply(ACCEPTED);
    let state = test_state(judge);
    let a = admin(&state).await;
    let s = student(&state, "alice").await;
    select_problem(&state, &s, "p_sum").await.unwrap();
    submit_code(&state, &s, Some("x".into())).await.unwrap();

    assert!(matches!(delete_problem(&state, &s, "p_sum").await, Err(AppError::Forbidden(_))));
    delete_problem(&state, &a, "p_sum").await.unwrap();

    let view = current_result(&state, &s).await.unwrap();
    assert!(view.selected_problem.is_none());
    assert!(view.last_result.is_none());
    assert!(list_submissions(&state, &a).await.is_empty());
    assert!(matches!(get_problem(&state, &a, "p_sum").await, Err(AppError::NotFound(_))));
  }

  #[tokio::test]
  async fn generated_draft_saved_shows_only_public_cases() {
    let draft = r#"{"title":"Double","description":"Print 2n.","difficulty":"Easy","testCases":[
      {"input":"2","output":"4","isPublic":true},{"input":"21","output":"42","isPublic":false}]}"#;
    let state = test_state(ScriptedJudge::new().reply(draft));
    let a = admin(&state).await;
    let s = student(&state, "alice").await;

    let req = GenerationRequest { topic: "doubling".into(), difficulty: Default::default() };
    assert!(matches!(generate_problem(&state, &s, req.clone()).await, Err(AppError::Forbidden(_))));
    let preview = generate_problem(&state, &a, req).await.unwrap();
    let before = list_problems(&state).await.len();
    assert_eq!(before, 2);

    let saved = create_problem(&state, &a, CreateProblemIn { draft: preview, generated: true }).await.unwrap();
    assert_eq!(saved.origin, ProblemOrigin::Generated);

    let seen = get_problem(&state, &s, &saved.id).await.unwrap();
    assert_eq!(seen.samples.len(), 1);
    assert_eq!(seen.samples[0].input, "2");
    assert!(seen.test_cases.is_none());
  }

  #[tokio::test]
  async fn generation_failure_surfaces_as_judge_error() {
    let state = test_state(ScriptedJudge::new().fail(JudgeError::EmptyResponse));
    let a = admin(&state).await;
    let req = GenerationRequest { topic: "graphs".into(), difficulty: Default::default() };
    let e = generate_problem(&state, &a, req).await.unwrap_err();
    assert_eq!(e.status_code(), axum::http::StatusCode::BAD_GATEWAY);

    let req = GenerationRequest { topic: "  ".into(), difficulty: Default::default() };
    assert!(matches!(generate_problem(&state, &a, req).await, Err(AppError::Validation(_))));
  }

  #[tokio::test]
  async fn submissions_are_private_without_view_all() {
    let state = test_state(ScriptedJudge::new().reply(ACCEPTED));
    let alice = student(&state, "alice").await;
    let bob = student(&state, "bob").await;
    select_problem(&state, &alice, "p_sum").await.unwrap();
    let out = submit_code(&state, &alice, Some("x".into())).await.unwrap();
    let id = out.submission_id.unwrap();

    assert!(list_submissions(&state, &bob).await.is_empty());
    assert!(matches!(get_submission(&state, &bob, &id).await, Err(AppError::NotFound(_))));
    assert!(get_submission(&state, &alice, &id).await.is_ok());
    let a = admin(&state).await;
    assert_eq!(list_submissions(&state, &a).await.len(), 1);
  }

  #[tokio::test]
  async fn user_admin_guards_self_and_cascades() {
    let state = test_state(ScriptedJudge::new().reply(ACCEPTED));
    let a = admin(&state).await;
    let s = student(&state, "alice").await;
    select_problem(&state, &s, "p_sum").await.unwrap();
    submit_code(&state, &s, Some("x".into())).await.unwrap();

    assert!(matches!(delete_user(&state, &a, &a.user.id).await, Err(AppError::Forbidden(_))));
    assert!(matches!(update_user_role(&state, &a, &a.user.id, Role::Student).await, Err(AppError::Forbidden(_))));
    assert!(matches!(list_users(&state, &s).await, Err(AppError::Forbidden(_))));

    let promoted = update_user_role(&state, &a, &s.user.id, Role::Teacher).await.unwrap();
    assert_eq!(promoted.role, Role::Teacher);

    delete_user(&state, &a, &s.user.id).await.unwrap();
    assert!(state.authenticate(&s.token).await.is_err());
    assert!(list_submissions(&state, &a).await.is_empty());
    assert_eq!(list_users(&state, &a).await.unwrap().len(), 1);
  }
}
