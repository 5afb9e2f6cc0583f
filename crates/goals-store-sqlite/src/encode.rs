//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Document bodies are compact
//! JSON objects. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use goals_core::{
  identity::UserId,
  store::{Account, Document},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uid(id: UserId) -> String { id.0.hyphenated().to_string() }

pub fn decode_uid(s: &str) -> Result<UserId> { Ok(UserId(Uuid::parse_str(s)?)) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Documents ────────────────────────────────────────────────────────────────

pub fn encode_body(body: &Document) -> Result<String> { Ok(serde_json::to_string(body)?) }

pub fn decode_body(path: &str, s: &str) -> Result<Document> {
  match serde_json::from_str(s)? {
    serde_json::Value::Object(map) => Ok(map),
    _ => Err(Error::CorruptDocument(path.to_owned())),
  }
}

// ─── Raw row types ────────────────────────────────────────────────────────────

/// Row from the `accounts` table, still in column form.
pub struct RawAccount {
  pub uid:           String,
  pub email:         String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawAccount {
  pub const COLUMNS: &'static str = "uid, email, password_hash, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      uid:           row.get(0)?,
      email:         row.get(1)?,
      password_hash: row.get(2)?,
      created_at:    row.get(3)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      uid:           decode_uid(&self.uid)?,
      email:         self.email,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
