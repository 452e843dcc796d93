//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod extract;
pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws?token=...`
/// - JSON API under `/api/v1/...` (bearer token auth)
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(http::http_health))
        .route("/languages", get(http::http_languages))
        // Accounts
        .route("/auth/login", post(http::http_login))
        .route("/auth/register", post(http::http_register))
        .route("/auth/logout", post(http::http_logout))
        .route("/me", get(http::http_me))
        .route("/me/password", post(http::http_change_password))
        // Problems
        .route("/problems", get(http::http_list_problems).post(http::http_create_problem))
        .route("/problems/generate", post(http::http_generate_problem))
        .route("/problems/:id", get(http::http_get_problem).delete(http::http_delete_problem))
        .route("/problems/:id/test-cases", put(http::http_replace_test_cases))
        // Session
        .route("/session/problem", post(http::http_select_problem))
        .route("/session/language", post(http::http_change_language))
        .route("/session/code", put(http::http_set_code))
        .route("/session/submit", post(http::http_submit))
        .route("/session/result", get(http::http_current_result))
        // History
        .route("/submissions", get(http::http_list_submissions))
        .route("/submissions/:id", get(http::http_get_submission))
        // Users
        .route("/users", get(http::http_list_users))
        .route("/users/:id/role", put(http::http_update_user_role))
        .route("/users/:id", delete(http::http_delete_user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::judge::scripted::ScriptedJudge;
    use crate::state::tests::test_state;

    async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, v)
    }

    async fn login(app: &Router, user: &str, pass: &str) -> String {
        let (s, v) = call(app, Method::POST, "/api/v1/auth/login", None, Some(json!({"username": user, "password": pass}))).await;
        assert_eq!(s, StatusCode::OK, "{v}");
        v["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_router(test_state(ScriptedJudge::new()));
        let (s, v) = call(&app, Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v, json!({"ok": true}));
    }

    #[tokio::test]
    async fn admin_login_exposes_admin_capabilities() {
        let app = build_router(test_state(ScriptedJudge::new()));
        let (s, v) = call(&app, Method::POST, "/api/v1/auth/login", None, Some(json!({"username": "admin", "password": "password"}))).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["user"]["role"], "admin");
        let caps = v["capabilities"].as_array().unwrap();
        assert!(caps.contains(&json!("manage_users")));

        let token = v["token"].as_str().unwrap();
        let (s, v) = call(&app, Method::GET, "/api/v1/users", Some(token), None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v.as_array().unwrap().len(), 1);

        let (s, _) = call(&app, Method::POST, "/api/v1/auth/logout", Some(token), None).await;
        assert_eq!(s, StatusCode::NO_CONTENT);
        let (s, v) = call(&app, Method::GET, "/api/v1/me", Some(token), None).await;
        assert_eq!(s, StatusCode::UNAUTHORIZED);
        assert_eq!(v["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn short_username_is_rejected_without_creating_a_user() {
        let state = test_state(ScriptedJudge::new());
        let app = build_router(state.clone());
        let (s, v) = call(&app, Method::POST, "/api/v1/auth/register", None, Some(json!({"username": "ab", "password": "x"}))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"]["message"], "Username must be at least 3 characters");
        assert_eq!(state.read().await.users.len(), 1);
    }

    #[tokio::test]
    async fn student_cannot_reach_teacher_routes() {
        let app = build_router(test_state(ScriptedJudge::new()));
        let (s, v) = call(&app, Method::POST, "/api/v1/auth/register", None, Some(json!({"username": "alice", "password": "pw"}))).await;
        assert_eq!(s, StatusCode::CREATED);
        let token = v["token"].as_str().unwrap();

        let (s, _) = call(&app, Method::POST, "/api/v1/problems/generate", Some(token), Some(json!({"topic": "dp"}))).await;
        assert_eq!(s, StatusCode::FORBIDDEN);
        let (s, _) = call(&app, Method::DELETE, "/api/v1/problems/p_sum", Some(token), None).await;
        assert_eq!(s, StatusCode::FORBIDDEN);

        let (s, v) = call(&app, Method::GET, "/api/v1/problems/p_sum", Some(token), None).await;
        assert_eq!(s, StatusCode::OK);
        assert!(v.get("testCases").is_none());
        assert_eq!(v["samples"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submit_while_pending_conflicts_and_malformed_reply_is_not_recorded() {
        let judge = ScriptedJudge::new()
            .with_delay(std::time::Duration::from_millis(500))
            .reply("{\"verdict\": \"Maybe\"}");
        let app = build_router(test_state(judge));
        let token = login(&app, "admin", "password").await;

        let (s, _) = call(&app, Method::POST, "/api/v1/session/problem", Some(&token), Some(json!({"problemId": "p_sum"}))).await;
        assert_eq!(s, StatusCode::OK);

        let first = {
            let app = app.clone();
            let token = token.clone();
            tokio::spawn(async move {
                call(&app, Method::POST, "/api/v1/session/submit", Some(&token), Some(json!({"code": "print(3)"}))).await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let (s, v) = call(&app, Method::GET, "/api/v1/session/result", Some(&token), None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["pending"], true);
        assert_eq!(v["lastResult"]["verdict"], "Judging");

        let (s, v) = call(&app, Method::POST, "/api/v1/session/submit", Some(&token), None).await;
        assert_eq!(s, StatusCode::CONFLICT);
        assert_eq!(v["error"]["code"], "CONFLICT");

        let (s, v) = first.await.unwrap();
        assert_eq!(s, StatusCode::OK);
        assert_eq!(v["result"]["verdict"], "Runtime Error");
        assert!(v["submissionId"].is_null());

        let (_, v) = call(&app, Method::GET, "/api/v1/submissions", Some(&token), None).await;
        assert!(v.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_selected_problem_clears_selection() {
        let app = build_router(test_state(ScriptedJudge::new()));
        let token = login(&app, "admin", "password").await;
        call(&app, Method::POST, "/api/v1/session/problem", Some(&token), Some(json!({"problemId": "p_reverse"}))).await;

        let (s, _) = call(&app, Method::DELETE, "/api/v1/problems/p_reverse", Some(&token), None).await;
        assert_eq!(s, StatusCode::NO_CONTENT);
        let (_, v) = call(&app, Method::GET, "/api/v1/me", Some(&token), None).await;
        assert!(v["session"]["selectedProblem"].is_null());
        let (s, _) = call(&app, Method::GET, "/api/v1/problems/p_reverse", Some(&token), None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_cannot_delete_self() {
        let app = build_router(test_state(ScriptedJudge::new()));
        let token = login(&app, "admin", "password").await;
        let (s, v) = call(&app, Method::DELETE, "/api/v1/users/user_admin", Some(&token), None).await;
        assert_eq!(s, StatusCode::FORBIDDEN);
        assert_eq!(v["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn generated_problem_round_trip_shows_public_cases_only() {
        let draft = json!({
            "title": "Max of list",
            "description": "Print the largest number.\n\nExample: `3 1 2` -> `3`",
            "difficulty": "Medium",
            "testCases": [
                {"input": "3 1 2", "output": "3", "isPublic": true},
                {"input": "-1 -7", "output": "-1", "isPublic": false}
            ]
        });
        let app = build_router(test_state(ScriptedJudge::new().reply(draft.to_string())));
        let admin = login(&app, "admin", "password").await;

        let (s, preview) = call(&app, Method::POST, "/api/v1/problems/generate", Some(&admin), Some(json!({"topic": "arrays", "difficulty": "Medium"}))).await;
        assert_eq!(s, StatusCode::OK, "{preview}");

        let mut body = preview.clone();
        body["generated"] = json!(true);
        let (s, saved) = call(&app, Method::POST, "/api/v1/problems", Some(&admin), Some(body)).await;
        assert_eq!(s, StatusCode::CREATED, "{saved}");
        assert_eq!(saved["origin"], "generated");
        let id = saved["id"].as_str().unwrap().to_string();

        let (_, v) = call(&app, Method::POST, "/api/v1/auth/register", None, Some(json!({"username": "stu", "password": "pw"}))).await;
        let student = v["token"].as_str().unwrap().to_string();
        let (s, v) = call(&app, Method::GET, &format!("/api/v1/problems/{id}"), Some(&student), None).await;
        assert_eq!(s, StatusCode::OK);
        let samples = v["samples"].as_array().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0]["input"], "3 1 2");
        assert!(v.get("testCases").is_none());
    }

    #[tokio::test]
    async fn generation_without_judge_is_bad_gateway() {
        let store: Arc<dyn crate::store::KvStore> = Arc::new(crate::store::MemoryStore::new());
        let state = Arc::new(AppState::load(store, None, Default::default(), vec![]).unwrap());
        let app = build_router(state);
        let token = login(&app, "admin", "password").await;
        let (s, v) = call(&app, Method::POST, "/api/v1/problems/generate", Some(&token), Some(json!({"topic": "strings"}))).await;
        assert_eq!(s, StatusCode::BAD_GATEWAY);
        assert_eq!(v["error"]["code"], "JUDGE_ERROR");
    }
}
