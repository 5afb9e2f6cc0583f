//! Error types and axum `IntoResponse` implementation.
//!
//! Every error leaves the server as `{"error": "<message>"}`. The auth
//! messages are shown to the user verbatim by the client.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("forbidden")]
  Forbidden,
  #[error("not found")]
  NotFound,
  #[error("{0}")]
  BadRequest(String),
  #[error("invalid email")]
  InvalidEmail,
  #[error("weak password")]
  WeakPassword,
  #[error("email already in use")]
  EmailInUse,
  #[error("invalid email or password")]
  InvalidCredentials,
  #[error("password hashing failed: {0}")]
  Hash(String),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Store(Box::new(e))
  }

  fn status(&self) -> StatusCode {
    match self {
      Error::Unauthorized | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
      Error::Forbidden => StatusCode::FORBIDDEN,
      Error::NotFound => StatusCode::NOT_FOUND,
      Error::BadRequest(_) | Error::InvalidEmail | Error::WeakPassword => {
        StatusCode::BAD_REQUEST
      }
      Error::EmailInUse => StatusCode::CONFLICT,
      Error::Hash(_) | Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<goals_core::Error> for Error {
  fn from(e: goals_core::Error) -> Self { Error::BadRequest(e.to_string()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if matches!(self, Error::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer realm=\"goals\""),
      );
    }
    res
  }
}
