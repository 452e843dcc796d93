//! Credentials, session tokens and form validation for the account commands.

use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use rand::Rng;

use crate::error::{AppError, AppResult};

pub const SESSION_TOKEN_LEN: usize = 48;
pub const MIN_NEW_PASSWORD_LEN: usize = 4;

pub fn hash_password(password: &str) -> AppResult<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
  match PasswordHash::new(hash) {
    Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
    Err(_) => false,
  }
}

/// Opaque bearer token for a login session.
pub fn generate_session_token() -> String {
  const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
  let mut rng = rand::thread_rng();
  (0..SESSION_TOKEN_LEN)
    .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
    .collect()
}

pub fn require_credentials(username: &str, password: &str) -> AppResult<()> {
  if username.trim().is_empty() || password.is_empty() {
    return Err(AppError::validation("Username and password must not be empty"));
  }
  Ok(())
}

pub fn validate_username(username: &str) -> AppResult<()> {
  let len = username.chars().count();
  if len < 3 {
    return Err(AppError::validation("Username must be at least 3 characters"));
  }
  if len > 32 {
    return Err(AppError::validation("Username must be at most 32 characters"));
  }
  if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
    return Err(AppError::validation(
      "Username can only contain letters, numbers, underscores, and hyphens",
    ));
  }
  if !username.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
    return Err(AppError::validation("Username must start with a letter"));
  }
  Ok(())
}

pub fn validate_new_password(new_password: &str, confirm: &str) -> AppResult<()> {
  if new_password != confirm {
    return Err(AppError::validation("New passwords do not match"));
  }
  if new_password.chars().count() < MIN_NEW_PASSWORD_LEN {
    return Err(AppError::validation(format!(
      "New password must be at least {MIN_NEW_PASSWORD_LEN} characters"
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hash_and_verify() {
    let hash = hash_password("password").unwrap();
    assert!(verify_password("password", &hash));
    assert!(!verify_password("Password", &hash));
    assert!(!verify_password("password", "not-a-phc-string"));
  }

  #[test]
  fn test_session_tokens() {
    let a = generate_session_token();
    let b = generate_session_token();
    assert_eq!(a.len(), SESSION_TOKEN_LEN);
    assert_ne!(a, b);
  }

  #[test]
  fn test_validate_username() {
    assert!(validate_username("alice").is_ok());
    assert!(validate_username("bob_2-x").is_ok());
    assert!(validate_username("ab").is_err());
    assert!(validate_username("1abc").is_err());
    assert!(validate_username("user name").is_err());
    assert!(validate_username(&"a".repeat(33)).is_err());
  }

  #[test]
  fn test_validate_new_password() {
    assert!(validate_new_password("abcd", "abcd").is_ok());
    assert!(validate_new_password("abcd", "abce").is_err());
    assert!(validate_new_password("abc", "abc").is_err());
  }

  #[test]
  fn test_require_credentials() {
    assert!(require_credentials("admin", "password").is_ok());
    assert!(require_credentials("  ", "password").is_err());
    assert!(require_credentials("admin", "").is_err());
  }
}
