//! Application error type and its HTTP rendering.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use tracing::error;

use crate::judge::JudgeError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
  /// Form-level problems (empty fields, mismatched passwords, bad usernames).
  #[error("{0}")]
  Validation(String),

  #[error("Invalid username or password")]
  InvalidCredentials,

  #[error("Unauthorized")]
  Unauthorized,

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Already exists: {0}")]
  AlreadyExists(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Judge error: {0}")]
  Judge(#[from] JudgeError),

  #[error("Storage error: {0}")]
  Storage(#[from] StoreError),

  #[error("Internal error: {0}")]
  Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: ErrorDetails,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
  pub code: &'static str,
  pub message: String,
}

impl AppError {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }

  pub fn error_code(&self) -> &'static str {
    match self {
      Self::Validation(_) => "VALIDATION_ERROR",
      Self::InvalidCredentials => "INVALID_CREDENTIALS",
      Self::Unauthorized => "UNAUTHORIZED",
      Self::Forbidden(_) => "FORBIDDEN",
      Self::NotFound(_) => "NOT_FOUND",
      Self::AlreadyExists(_) => "ALREADY_EXISTS",
      Self::Conflict(_) => "CONFLICT",
      Self::Judge(_) => "JUDGE_ERROR",
      Self::Storage(_) => "STORAGE_ERROR",
      Self::Internal(_) => "INTERNAL_ERROR",
    }
  }

  pub fn status_code(&self) -> StatusCode {
    match self {
      Self::Validation(_) => StatusCode::BAD_REQUEST,
      Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
      Self::Forbidden(_) => StatusCode::FORBIDDEN,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::AlreadyExists(_) | Self::Conflict(_) => StatusCode::CONFLICT,
      Self::Judge(_) => StatusCode::BAD_GATEWAY,
      Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status_code();

    // Storage and internal failures stay in the logs.
    let message = match &self {
      AppError::Storage(e) => {
        error!(target: "store", error = %e, "Storage error");
        "A storage error occurred".to_string()
      }
      AppError::Internal(e) => {
        error!(target: "codejudge_backend", error = %e, "Internal error");
        "An internal error occurred".to_string()
      }
      _ => self.to_string(),
    };

    let body = ErrorResponse {
      error: ErrorDetails { code: self.error_code(), message },
    };
    (status, Json(body)).into_response()
  }
}
