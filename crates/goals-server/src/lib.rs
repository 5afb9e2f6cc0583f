//! Self-hosted identity provider and document store for Daily Goals.
//!
//! Exposes an axum [`Router`] with email/password accounts under `/auth` and
//! per-user JSON documents under `/documents`, backed by any [`AccountStore`].

pub mod auth;
pub mod documents;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use goals_core::store::AccountStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_min_password_length() -> usize { 6 }

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  #[serde(default = "default_min_password_length")]
  pub min_password_length: usize,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the goals server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: AccountStore + Clone + 'static,
{
  Router::new()
    .route("/auth/sign-up",      post(auth::sign_up::<S>))
    .route("/auth/sign-in",      post(auth::sign_in::<S>))
    .route("/auth/sign-out",     post(auth::sign_out::<S>))
    .route("/auth/me",           get(auth::me))
    .route("/documents/{*path}", get(documents::get::<S>).patch(documents::patch::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use goals_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState {
      store:  Arc::new(store),
      config: Arc::new(ServerConfig {
        host:                "127.0.0.1".to_string(),
        port:                8787,
        store_path:          PathBuf::from(":memory:"),
        min_password_length: 6,
      }),
    }
  }

  async fn send(
    state:  &AppState<SqliteStore>,
    method: &str,
    uri:    &str,
    token:  Option<&str>,
    body:   Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp = router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  /// Register `email` and return `(token, uid)`.
  async fn sign_up(state: &AppState<SqliteStore>, email: &str) -> (String, String) {
    let (status, body) = send(
      state,
      "POST",
      "/auth/sign-up",
      None,
      Some(json!({ "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
      body["token"].as_str().unwrap().to_string(),
      body["user"]["uid"].as_str().unwrap().to_string(),
    )
  }

  // ── Auth ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn sign_up_then_me() {
    let state = make_state().await;
    let (token, uid) = sign_up(&state, "Ann@Example.com").await;

    let (status, body) = send(&state, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uid"], uid.as_str());
    assert_eq!(body["email"], "ann@example.com");
  }

  #[tokio::test]
  async fn sign_up_rejects_duplicates_weak_passwords_and_bad_emails() {
    let state = make_state().await;
    sign_up(&state, "ann@example.com").await;

    let cases = [
      (json!({ "email": "ANN@example.com", "password": "secret1" }), StatusCode::CONFLICT, "email already in use"),
      (json!({ "email": "bob@example.com", "password": "12345" }), StatusCode::BAD_REQUEST, "weak password"),
      (json!({ "email": "bob", "password": "secret1" }), StatusCode::BAD_REQUEST, "invalid email"),
    ];
    for (body, expected, message) in cases {
      let (status, resp) = send(&state, "POST", "/auth/sign-up", None, Some(body)).await;
      assert_eq!(status, expected);
      assert_eq!(resp["error"], message);
    }
  }

  #[tokio::test]
  async fn sign_in_checks_password() {
    let state = make_state().await;
    let (_, uid) = sign_up(&state, "ann@example.com").await;

    let (status, body) = send(
      &state,
      "POST",
      "/auth/sign-in",
      None,
      Some(json!({ "email": "ann@example.com", "password": "wrong-one" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid email or password");

    let (status, body) = send(
      &state,
      "POST",
      "/auth/sign-in",
      None,
      Some(json!({ "email": " ann@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["uid"], uid.as_str());
  }

  #[tokio::test]
  async fn unknown_account_gets_the_wrong_password_message() {
    let state = make_state().await;
    let (status, body) = send(
      &state,
      "POST",
      "/auth/sign-in",
      None,
      Some(json!({ "email": "nobody@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid email or password");
  }

  #[tokio::test]
  async fn sign_out_revokes_the_token() {
    let state = make_state().await;
    let (token, _) = sign_up(&state, "ann@example.com").await;

    let (status, _) = send(&state, "POST", "/auth/sign-out", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&state, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn missing_token_returns_401_with_challenge() {
    let state = make_state().await;
    let req = Request::builder().uri("/auth/me").body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  // ── Documents ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn patch_merges_and_get_returns_document() {
    let state = make_state().await;
    let (token, uid) = sign_up(&state, "ann@example.com").await;
    let uri = format!("/documents/users/{uid}/entries/2026-06-01");

    let (status, _) = send(
      &state,
      "PATCH",
      &uri,
      Some(&token),
      Some(json!({ "date": "2026-06-01", "rating": { "material": 4, "ego": 2, "running": 5 } })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    send(
      &state,
      "PATCH",
      &uri,
      Some(&token),
      Some(json!({ "notes": { "ego": "calm" } })),
    )
    .await;

    let (status, body) = send(&state, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"]["material"], 4);
    assert_eq!(body["notes"]["ego"], "calm");
  }

  #[tokio::test]
  async fn missing_document_returns_404() {
    let state = make_state().await;
    let (token, uid) = sign_up(&state, "ann@example.com").await;
    let (status, body) = send(
      &state,
      "GET",
      &format!("/documents/users/{uid}/months/2026-06"),
      Some(&token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");
  }

  #[tokio::test]
  async fn collection_listing_is_ordered() {
    let state = make_state().await;
    let (token, uid) = sign_up(&state, "ann@example.com").await;
    for day in ["2026-06-03", "2026-06-01", "2026-06-02"] {
      send(
        &state,
        "PATCH",
        &format!("/documents/users/{uid}/entries/{day}"),
        Some(&token),
        Some(json!({ "date": day })),
      )
      .await;
    }

    let (status, body) = send(
      &state,
      "GET",
      &format!("/documents/users/{uid}/entries?order_by=date&direction=desc"),
      Some(&token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<_> = body
      .as_array()
      .unwrap()
      .iter()
      .map(|snap| snap["id"].as_str().unwrap().to_string())
      .collect();
    assert_eq!(ids, ["2026-06-03", "2026-06-02", "2026-06-01"]);
  }

  #[tokio::test]
  async fn other_users_documents_are_forbidden() {
    let state = make_state().await;
    let (_, ann) = sign_up(&state, "ann@example.com").await;
    let (bob_token, _) = sign_up(&state, "bob@example.com").await;

    let (status, _) = send(
      &state,
      "PATCH",
      &format!("/documents/users/{ann}/entries/2026-06-01"),
      Some(&bob_token),
      Some(json!({ "date": "2026-06-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
      &state,
      "GET",
      &format!("/documents/users/{ann}/entries"),
      Some(&bob_token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&state, "GET", "/documents/config/global", Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn non_object_body_is_rejected() {
    let state = make_state().await;
    let (token, uid) = sign_up(&state, "ann@example.com").await;
    let (status, _) = send(
      &state,
      "PATCH",
      &format!("/documents/users/{uid}/entries/2026-06-01"),
      Some(&token),
      Some(json!([1, 2, 3])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn documents_require_a_session() {
    let state = make_state().await;
    let (_, uid) = sign_up(&state, "ann@example.com").await;
    let (status, _) = send(
      &state,
      "GET",
      &format!("/documents/users/{uid}/entries"),
      Some("not-a-token"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }
}
