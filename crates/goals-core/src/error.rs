//! Error types for `goals-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid document path: {0:?}")]
  InvalidPath(String),

  #[error("invalid month: {0:?}")]
  InvalidMonth(String),

  #[error("expected a JSON object for document {0}")]
  NotAnObject(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A failure reported by the document store backend.
  #[error("{0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
