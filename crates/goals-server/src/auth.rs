//! Email/password accounts and bearer-token sessions.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/sign-up`  | Body: `{"email","password"}`, returns `{token, user}` |
//! | `POST` | `/auth/sign-in`  | Same body and response |
//! | `POST` | `/auth/sign-out` | Revokes the bearer token |
//! | `GET`  | `/auth/me`       | The bearer token's user |

use std::sync::OnceLock;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  Json,
  extract::{FromRequestParts, State},
  http::{HeaderMap, StatusCode, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use goals_core::{
  identity::{Credentials, User},
  store::{Account, AccountStore},
};
use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::{
  AppState,
  error::{Error, Result},
};

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::Hash(e.to_string()))
}

/// Checked against when an email has no account, so a miss costs the same
/// argon2 run as a wrong password.
fn dummy_hash() -> &'static str {
  static DUMMY: OnceLock<String> = OnceLock::new();
  DUMMY.get_or_init(|| hash_password(&new_token()).unwrap_or_default())
}

pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .and_then(|hash| Argon2::default().verify_password(password.as_bytes(), &hash))
    .is_ok()
}

/// Trim and lowercase an email, rejecting anything without a local part and
/// a dotted domain.
pub fn normalize_email(email: &str) -> Result<String> {
  let email = email.trim().to_lowercase();
  let valid = match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
    }
    None => false,
  };
  if !valid || email.chars().any(char::is_whitespace) {
    return Err(Error::InvalidEmail);
  }
  Ok(email)
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

/// 32 random bytes, base64url without padding.
pub fn new_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}

/// What the store keeps instead of the token itself.
pub fn token_digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

fn bearer_token(headers: &HeaderMap) -> Result<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|token| !token.is_empty())
    .ok_or(Error::Unauthorized)
}

pub fn user_of(account: &Account) -> User {
  User { uid: account.uid, email: Some(account.email.clone()) }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// The caller's session. Present in a handler means the bearer token was
/// valid.
pub struct Session {
  pub account:      Account,
  pub token_digest: String,
}

impl<S> FromRequestParts<AppState<S>> for Session
where
  S: AccountStore + Clone + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let digest = token_digest(bearer_token(&parts.headers)?);
    let account = state
      .store
      .session_account(&digest)
      .await
      .map_err(Error::store)?
      .ok_or(Error::Unauthorized)?;
    Ok(Session { account, token_digest: digest })
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionBody {
  pub token: String,
  pub user:  User,
}

async fn start_session<S: AccountStore>(store: &S, account: &Account) -> Result<SessionBody> {
  let token = new_token();
  store
    .insert_session(token_digest(&token), account.uid)
    .await
    .map_err(Error::store)?;
  tracing::info!(uid = %account.uid, "session started");
  Ok(SessionBody { token, user: user_of(account) })
}

/// `POST /auth/sign-up`
pub async fn sign_up<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<SessionBody>)>
where
  S: AccountStore + Clone + 'static,
{
  let email = normalize_email(&body.email)?;
  if body.password.chars().count() < state.config.min_password_length {
    return Err(Error::WeakPassword);
  }

  let hash = hash_password(&body.password)?;
  let account = state
    .store
    .create_account(email, hash)
    .await
    .map_err(Error::store)?
    .ok_or(Error::EmailInUse)?;
  tracing::info!(uid = %account.uid, "account created");

  let session = start_session(state.store.as_ref(), &account).await?;
  Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /auth/sign-in`
pub async fn sign_in<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Credentials>,
) -> Result<Json<SessionBody>>
where
  S: AccountStore + Clone + 'static,
{
  let email = normalize_email(&body.email)?;
  let account = state.store.account_by_email(&email).await.map_err(Error::store)?;

  let phc = match &account {
    Some(account) => account.password_hash.as_str(),
    None => dummy_hash(),
  };
  let verified = verify_password(&body.password, phc);
  let account = account.filter(|_| verified).ok_or(Error::InvalidCredentials)?;

  Ok(Json(start_session(state.store.as_ref(), &account).await?))
}

/// `POST /auth/sign-out`
pub async fn sign_out<S>(State(state): State<AppState<S>>, session: Session) -> Result<StatusCode>
where
  S: AccountStore + Clone + 'static,
{
  state
    .store
    .delete_session(&session.token_digest)
    .await
    .map_err(Error::store)?;
  tracing::info!(uid = %session.account.uid, "session ended");
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /auth/me`
pub async fn me(session: Session) -> Json<User> { Json(user_of(&session.account)) }

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  #[test]
  fn password_hash_verifies() {
    let hash = hash_password("hunter22").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("hunter22", &hash));
    assert!(!verify_password("hunter23", &hash));
    assert!(!verify_password("hunter22", "not a phc string"));
  }

  #[test]
  fn dummy_hash_is_a_real_argon2_hash() {
    assert!(PasswordHash::new(dummy_hash()).is_ok());
    assert_eq!(dummy_hash(), dummy_hash());
    assert!(!verify_password("secret1", dummy_hash()));
  }

  #[test]
  fn tokens_are_random_and_digested() {
    let a = new_token();
    let b = new_token();
    assert_ne!(a, b);
    assert_eq!(a.len(), 43);
    assert_eq!(token_digest(&a), token_digest(&a));
    assert_eq!(token_digest(&a).len(), 64);
    assert_ne!(token_digest(&a), a);
  }

  #[test]
  fn email_normalisation() {
    assert_eq!(normalize_email("  Ann@Example.COM ").unwrap(), "ann@example.com");
    for bad in ["", "ann", "@example.com", "ann@", "ann@localhost", "a b@example.com", "a@b@c.com"] {
      assert!(matches!(normalize_email(bad), Err(Error::InvalidEmail)), "{bad}");
    }
  }

  #[test]
  fn bearer_header_parsing() {
    let mut headers = HeaderMap::new();
    assert!(matches!(bearer_token(&headers), Err(Error::Unauthorized)));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
    assert!(matches!(bearer_token(&headers), Err(Error::Unauthorized)));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
    assert_eq!(bearer_token(&headers).unwrap(), "abc");
  }
}
