//! The document store boundary: paths, documents, and the store traits.
//!
//! Documents are JSON objects addressed by slash-separated paths such as
//! `users/{uid}/entries/{date}`. Writes are merge upserts. Higher layers
//! ([`crate::entries`], [`crate::aggregate`]) depend on the
//! [`DocumentStore`] abstraction, not on any concrete backend.

use std::{cmp::Ordering, fmt, future::Future, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, identity::UserId, month::Month};

/// A stored document body.
pub type Document = serde_json::Map<String, Value>;

// ─── Paths ───────────────────────────────────────────────────────────────────

fn parse_segments(s: &str) -> Result<Vec<String>, Error> {
  let segments: Vec<String> = s
    .trim_matches('/')
    .split('/')
    .map(str::to_owned)
    .collect();
  if segments.iter().any(|seg| seg.is_empty() || seg == "." || seg == "..") {
    return Err(Error::InvalidPath(s.to_owned()));
  }
  Ok(segments)
}

fn owner_of(segments: &[String]) -> Option<&str> {
  match segments {
    [root, uid, ..] if root == "users" => Some(uid.as_str()),
    _ => None,
  }
}

/// Path of a single document: an even number of segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath(Vec<String>);

/// Path of a collection: an odd number of segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(Vec<String>);

impl DocPath {
  /// `users/{uid}/entries/{date}`
  pub fn entry(uid: UserId, date: NaiveDate) -> Self {
    CollectionPath::entries(uid).doc(date.to_string())
  }

  /// `users/{uid}/months/{month}`
  pub fn month(uid: UserId, month: Month) -> Self {
    CollectionPath::months(uid).doc(month.to_string())
  }

  /// The last segment.
  pub fn id(&self) -> &str { self.0.last().map(String::as_str).unwrap_or_default() }

  pub fn parent(&self) -> CollectionPath { CollectionPath(self.0[..self.0.len() - 1].to_vec()) }

  /// The `{uid}` of a `users/{uid}/...` path.
  pub fn owner(&self) -> Option<&str> { owner_of(&self.0) }
}

impl CollectionPath {
  /// `users/{uid}/entries`
  pub fn entries(uid: UserId) -> Self {
    Self(vec!["users".into(), uid.to_string(), "entries".into()])
  }

  /// `users/{uid}/months`
  pub fn months(uid: UserId) -> Self {
    Self(vec!["users".into(), uid.to_string(), "months".into()])
  }

  pub fn doc(&self, id: impl Into<String>) -> DocPath {
    let mut segments = self.0.clone();
    segments.push(id.into());
    DocPath(segments)
  }

  pub fn owner(&self) -> Option<&str> { owner_of(&self.0) }
}

impl FromStr for DocPath {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let segments = parse_segments(s)?;
    if segments.len() % 2 != 0 {
      return Err(Error::InvalidPath(s.to_owned()));
    }
    Ok(Self(segments))
  }
}

impl FromStr for CollectionPath {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let segments = parse_segments(s)?;
    if segments.len() % 2 != 1 {
      return Err(Error::InvalidPath(s.to_owned()));
    }
    Ok(Self(segments))
  }
}

impl fmt::Display for DocPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0.join("/")) }
}

impl fmt::Display for CollectionPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0.join("/")) }
}

// ─── Merge ───────────────────────────────────────────────────────────────────

/// Apply a merge write: nested objects merge key by key, every other value
/// replaces what was there.
pub fn merge_fields(target: &mut Document, patch: Document) {
  for (key, value) in patch {
    match (target.get_mut(&key), value) {
      (Some(Value::Object(existing)), Value::Object(nested)) => {
        merge_fields(existing, nested)
      }
      (_, value) => {
        target.insert(key, value);
      }
    }
  }
}

/// Serialise `value` into a document body.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, Error> {
  match serde_json::to_value(value)? {
    Value::Object(map) => Ok(map),
    other => Err(Error::NotAnObject(other.to_string())),
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  #[default]
  Asc,
  Desc,
}

/// Parameters for [`DocumentStore::list`].
#[derive(Debug, Clone, Default)]
pub struct CollectionQuery {
  /// Top-level field to order by. Documents lacking the field are excluded.
  pub order_by:  Option<String>,
  pub direction: Direction,
}

impl CollectionQuery {
  pub fn ordered_by(field: impl Into<String>) -> Self {
    Self { order_by: Some(field.into()), direction: Direction::Asc }
  }
}

/// A document read back from a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  pub id:   String,
  pub data: Document,
}

fn type_rank(v: &Value) -> u8 {
  match v {
    Value::Null => 0,
    Value::Bool(_) => 1,
    Value::Number(_) => 2,
    Value::String(_) => 3,
    Value::Array(_) => 4,
    Value::Object(_) => 5,
  }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
  match (a, b) {
    (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
    (Value::Number(x), Value::Number(y)) => x
      .as_f64()
      .partial_cmp(&y.as_f64())
      .unwrap_or(Ordering::Equal),
    (Value::String(x), Value::String(y)) => x.cmp(y),
    _ => type_rank(a).cmp(&type_rank(b)),
  }
}

/// Apply `query` to an unordered set of snapshots. Ties fall back to the
/// document id so the result is deterministic.
pub fn apply_query(mut snapshots: Vec<Snapshot>, query: &CollectionQuery) -> Vec<Snapshot> {
  match &query.order_by {
    None => snapshots.sort_by(|a, b| a.id.cmp(&b.id)),
    Some(field) => {
      snapshots.retain(|s| s.data.contains_key(field));
      snapshots.sort_by(|a, b| {
        compare_values(&a.data[field], &b.data[field]).then_with(|| a.id.cmp(&b.id))
      });
    }
  }
  if query.direction == Direction::Desc {
    snapshots.reverse();
  }
  snapshots
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Abstraction over a document store backend.
///
/// There are no deletes: documents are created or merged into, never removed.
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch a document. Returns `None` if it does not exist.
  fn get<'a>(
    &'a self,
    path: &'a DocPath,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  /// Merge `fields` into the document at `path`, creating it if absent.
  fn set_merge<'a>(
    &'a self,
    path: &'a DocPath,
    fields: Document,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Every document directly inside `collection`, shaped by `query`.
  fn list<'a>(
    &'a self,
    collection: &'a CollectionPath,
    query: &'a CollectionQuery,
  ) -> impl Future<Output = Result<Vec<Snapshot>, Self::Error>> + Send + 'a;
}

/// A registered email/password account.
#[derive(Debug, Clone)]
pub struct Account {
  pub uid:           UserId,
  pub email:         String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

/// Persistence for the identity service, kept next to the documents it guards.
///
/// Session tokens are never stored in the clear; callers pass a digest.
pub trait AccountStore: DocumentStore {
  /// Register an account. Returns `None` if the email is already taken.
  fn create_account(
    &self,
    email: String,
    password_hash: String,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  fn account_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  fn insert_session(
    &self,
    token_digest: String,
    uid: UserId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Resolve a session digest to its account.
  fn session_account<'a>(
    &'a self,
    token_digest: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  /// Revoke a session. Returns `false` if it did not exist.
  fn delete_session<'a>(
    &'a self,
    token_digest: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn doc(v: Value) -> Document {
    match v {
      Value::Object(m) => m,
      _ => unreachable!(),
    }
  }

  #[test]
  fn entry_path_layout() {
    let uid: UserId = "6f1c1f52-5f9b-4a57-8d0a-6f3e0f4b2a10".parse().unwrap();
    let path = DocPath::entry(uid, "2026-06-03".parse().unwrap());
    assert_eq!(
      path.to_string(),
      "users/6f1c1f52-5f9b-4a57-8d0a-6f3e0f4b2a10/entries/2026-06-03"
    );
    assert_eq!(path.id(), "2026-06-03");
    assert_eq!(path.parent(), CollectionPath::entries(uid));
    assert_eq!(path.owner(), Some("6f1c1f52-5f9b-4a57-8d0a-6f3e0f4b2a10"));
  }

  #[test]
  fn path_parsing_checks_parity() {
    assert!("users/a/entries/2026-01-01".parse::<DocPath>().is_ok());
    assert!("users/a/entries".parse::<DocPath>().is_err());
    assert!("users/a/entries".parse::<CollectionPath>().is_ok());
    assert!("users//entries".parse::<CollectionPath>().is_err());
    assert!("users/../entries".parse::<CollectionPath>().is_err());
    assert_eq!("other/a".parse::<DocPath>().unwrap().owner(), None);
  }

  #[test]
  fn merge_is_deep_for_objects() {
    let mut target = doc(json!({
      "date": "2026-06-01",
      "rating": { "material": 4, "ego": 2, "running": 5 },
      "notes": { "material": "kept" },
    }));
    merge_fields(
      &mut target,
      doc(json!({ "notes": { "ego": "new" }, "updatedAt": "x" })),
    );
    assert_eq!(
      Value::Object(target),
      json!({
        "date": "2026-06-01",
        "rating": { "material": 4, "ego": 2, "running": 5 },
        "notes": { "material": "kept", "ego": "new" },
        "updatedAt": "x",
      })
    );
  }

  #[test]
  fn merge_replaces_non_objects() {
    let mut target = doc(json!({ "a": { "b": 1 }, "c": [1, 2] }));
    merge_fields(&mut target, doc(json!({ "a": 5, "c": [3] })));
    assert_eq!(Value::Object(target), json!({ "a": 5, "c": [3] }));
  }

  #[test]
  fn ordering_excludes_missing_field() {
    let snaps = vec![
      Snapshot { id: "b".into(), data: doc(json!({ "date": "2026-06-02" })) },
      Snapshot { id: "x".into(), data: doc(json!({ "other": 1 })) },
      Snapshot { id: "a".into(), data: doc(json!({ "date": "2026-06-01" })) },
    ];
    let asc = apply_query(snaps.clone(), &CollectionQuery::ordered_by("date"));
    assert_eq!(asc.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);

    let desc = apply_query(
      snaps,
      &CollectionQuery { order_by: Some("date".into()), direction: Direction::Desc },
    );
    assert_eq!(desc.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), ["b", "a"]);
  }
}
