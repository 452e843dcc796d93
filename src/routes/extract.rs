//! Bearer-token extractor: resolves `Authorization: Bearer <token>` to an `Actor`.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum::http::header::AUTHORIZATION;

use crate::error::AppError;
use crate::state::{Actor, AppState};

pub struct Auth(pub Actor);

pub fn bearer_token(parts: &Parts) -> Option<&str> {
  parts
    .headers
    .get(AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Auth {
  type Rejection = AppError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
    state.authenticate(token).await.map(Auth)
  }
}
