//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; errors render through `AppError`.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::domain::Submission;
use crate::error::AppResult;
use crate::judge::GenerationRequest;
use crate::protocol::*;
use crate::state::AppState;
use crate::logic;
use super::extract::Auth;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

pub async fn http_languages() -> impl IntoResponse { Json(logic::languages()) }

// --- Accounts ---

pub async fn http_login(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LoginIn>,
) -> AppResult<Json<AuthOut>> {
  logic::login(&state, body).await.map(Json)
}

pub async fn http_register(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RegisterIn>,
) -> AppResult<(StatusCode, Json<AuthOut>)> {
  let out = logic::register(&state, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

pub async fn http_logout(State(state): State<Arc<AppState>>, Auth(actor): Auth) -> AppResult<StatusCode> {
  logic::logout(&state, &actor).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn http_me(State(state): State<Arc<AppState>>, Auth(actor): Auth) -> AppResult<Json<MeOut>> {
  logic::me(&state, &actor).await.map(Json)
}

pub async fn http_change_password(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Json(body): Json<ChangePasswordIn>,
) -> AppResult<StatusCode> {
  logic::change_password(&state, &actor, body).await?;
  Ok(StatusCode::NO_CONTENT)
}

// --- Problems ---

pub async fn http_list_problems(State(state): State<Arc<AppState>>, Auth(_actor): Auth) -> impl IntoResponse {
  Json(logic::list_problems(&state).await)
}

pub async fn http_get_problem(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Path(id): Path<String>,
) -> AppResult<Json<ProblemOut>> {
  logic::get_problem(&state, &actor, &id).await.map(Json)
}

pub async fn http_create_problem(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Json(body): Json<CreateProblemIn>,
) -> AppResult<(StatusCode, Json<ProblemOut>)> {
  let out = logic::create_problem(&state, &actor, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, actor, body), fields(topic_len = body.topic.len()))]
pub async fn http_generate_problem(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Json(body): Json<GenerationRequest>,
) -> AppResult<Json<crate::domain::ProblemDraft>> {
  let draft = logic::generate_problem(&state, &actor, body).await?;
  info!(target: "codejudge_backend", title = %draft.title, "HTTP draft served");
  Ok(Json(draft))
}

pub async fn http_replace_test_cases(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Path(id): Path<String>,
  Json(body): Json<TestCasesIn>,
) -> AppResult<Json<ProblemOut>> {
  logic::replace_test_cases(&state, &actor, &id, body.test_cases).await.map(Json)
}

pub async fn http_delete_problem(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Path(id): Path<String>,
) -> AppResult<StatusCode> {
  logic::delete_problem(&state, &actor, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// --- Session ---

pub async fn http_select_problem(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Json(body): Json<SelectProblemIn>,
) -> AppResult<Json<ProblemOut>> {
  logic::select_problem(&state, &actor, &body.problem_id).await.map(Json)
}

pub async fn http_change_language(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Json(body): Json<LanguageIn>,
) -> AppResult<Json<SessionOut>> {
  logic::change_language(&state, &actor, body.language).await.map(Json)
}

pub async fn http_set_code(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Json(body): Json<CodeIn>,
) -> AppResult<Json<SessionOut>> {
  logic::set_code(&state, &actor, body.code).await.map(Json)
}

#[instrument(level = "info", skip(state, actor, body), fields(user_id = %actor.user.id))]
pub async fn http_submit(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  body: Option<Json<SubmitIn>>,
) -> AppResult<Json<SubmitOut>> {
  let code = body.and_then(|Json(b)| b.code);
  let out = logic::submit_code(&state, &actor, code).await?;
  info!(target: "judge", verdict = %out.result.verdict, recorded = out.submission_id.is_some(), "HTTP submission judged");
  Ok(Json(out))
}

pub async fn http_current_result(State(state): State<Arc<AppState>>, Auth(actor): Auth) -> AppResult<Json<SessionOut>> {
  logic::current_result(&state, &actor).await.map(Json)
}

// --- History ---

pub async fn http_list_submissions(State(state): State<Arc<AppState>>, Auth(actor): Auth) -> Json<Vec<Submission>> {
  Json(logic::list_submissions(&state, &actor).await)
}

pub async fn http_get_submission(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Path(id): Path<String>,
) -> AppResult<Json<Submission>> {
  logic::get_submission(&state, &actor, &id).await.map(Json)
}

// --- Users ---

pub async fn http_list_users(State(state): State<Arc<AppState>>, Auth(actor): Auth) -> AppResult<Json<Vec<UserOut>>> {
  logic::list_users(&state, &actor).await.map(Json)
}

pub async fn http_update_user_role(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Path(id): Path<String>,
  Json(body): Json<RoleIn>,
) -> AppResult<Json<UserOut>> {
  logic::update_user_role(&state, &actor, &id, body.role).await.map(Json)
}

pub async fn http_delete_user(
  State(state): State<Arc<AppState>>,
  Auth(actor): Auth,
  Path(id): Path<String>,
) -> AppResult<StatusCode> {
  logic::delete_user(&state, &actor, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}
