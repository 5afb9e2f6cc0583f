//! Handlers for `/documents/{*path}`.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | document path   | 404 if absent |
//! | `GET`   | collection path | `?order_by=<field>&direction=asc\|desc` |
//! | `PATCH` | document path   | Body: JSON object, merged into the document |
//!
//! Callers may only touch paths under `users/{their uid}/`.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use goals_core::store::{
  AccountStore, CollectionPath, CollectionQuery, DocPath, Direction, DocumentStore,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
  AppState,
  auth::Session,
  error::{Error, Result},
};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub order_by:  Option<String>,
  #[serde(default)]
  pub direction: Direction,
}

fn authorize(owner: Option<&str>, session: &Session) -> Result<()> {
  if owner == Some(session.account.uid.to_string().as_str()) {
    Ok(())
  } else {
    tracing::warn!(uid = %session.account.uid, ?owner, "cross-user access refused");
    Err(Error::Forbidden)
  }
}

/// `GET /documents/{*path}`
pub async fn get<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(path): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Response>
where
  S: AccountStore + Clone + 'static,
{
  if let Ok(doc) = path.parse::<DocPath>() {
    authorize(doc.owner(), &session)?;
    let body = state
      .store
      .get(&doc)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound)?;
    return Ok(Json(body).into_response());
  }

  let collection: CollectionPath = path.parse()?;
  authorize(collection.owner(), &session)?;
  let query = CollectionQuery { order_by: params.order_by, direction: params.direction };
  let snapshots = state
    .store
    .list(&collection, &query)
    .await
    .map_err(Error::store)?;
  Ok(Json(snapshots).into_response())
}

/// `PATCH /documents/{*path}`
pub async fn patch<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(path): Path<String>,
  Json(body): Json<Value>,
) -> Result<StatusCode>
where
  S: AccountStore + Clone + 'static,
{
  let doc: DocPath = path.parse()?;
  authorize(doc.owner(), &session)?;
  let Value::Object(fields) = body else {
    return Err(Error::BadRequest("document body must be a JSON object".into()));
  };

  state
    .store
    .set_merge(&doc, fields)
    .await
    .map_err(Error::store)?;
  tracing::debug!(path = %doc, "document merged");
  Ok(StatusCode::NO_CONTENT)
}
