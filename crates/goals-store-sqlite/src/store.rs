//! [`SqliteStore`]: the SQLite implementation of [`DocumentStore`] and
//! [`AccountStore`].

use std::path::Path;

use chrono::Utc;
use goals_core::{
  identity::UserId,
  store::{
    Account, AccountStore, CollectionPath, CollectionQuery, DocPath, Document, DocumentStore,
    Snapshot, apply_query, merge_fields,
  },
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{RawAccount, decode_body, encode_body, encode_dt, encode_uid},
  schema::SCHEMA,
};

/// Carry one of our errors out of a `tokio_rusqlite` closure.
fn inside(e: Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A goals document store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::info!(path = %path.display(), "store opened");
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  async fn get(&self, path: &DocPath) -> Result<Option<Document>> {
    let path_str = path.to_string();

    let raw: Option<String> = self
      .conn
      .call({
        let path_str = path_str.clone();
        move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT body_json FROM documents WHERE path = ?1",
                rusqlite::params![path_str],
                |row| row.get(0),
              )
              .optional()?,
          )
        }
      })
      .await?;

    raw.map(|body| decode_body(&path_str, &body)).transpose()
  }

  async fn set_merge(&self, path: &DocPath, fields: Document) -> Result<()> {
    let path_str   = path.to_string();
    let collection = path.parent().to_string();
    let doc_id     = path.id().to_owned();
    let now_str    = encode_dt(Utc::now());

    // Read, merge and write under one transaction so concurrent merges into
    // the same document cannot drop each other's fields.
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
          .query_row(
            "SELECT body_json FROM documents WHERE path = ?1",
            rusqlite::params![path_str],
            |row| row.get(0),
          )
          .optional()?;

        let mut body = match existing {
          Some(raw) => decode_body(&path_str, &raw).map_err(inside)?,
          None => Document::new(),
        };
        merge_fields(&mut body, fields);
        let body_json = encode_body(&body).map_err(inside)?;

        tx.execute(
          "INSERT INTO documents (path, collection, doc_id, body_json, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (path) DO UPDATE SET
             body_json  = excluded.body_json,
             updated_at = excluded.updated_at",
          rusqlite::params![path_str, collection, doc_id, body_json, now_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list(
    &self,
    collection: &CollectionPath,
    query:      &CollectionQuery,
  ) -> Result<Vec<Snapshot>> {
    let collection_str = collection.to_string();

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare("SELECT doc_id, body_json FROM documents WHERE collection = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![collection_str], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let snapshots = rows
      .into_iter()
      .map(|(id, body)| {
        let data = decode_body(&format!("{collection}/{id}"), &body)?;
        Ok(Snapshot { id, data })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(apply_query(snapshots, query))
  }
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl AccountStore for SqliteStore {
  async fn create_account(
    &self,
    email:         String,
    password_hash: String,
  ) -> Result<Option<Account>> {
    let account = Account {
      uid: UserId::new(),
      email: email.to_lowercase(),
      password_hash,
      created_at: Utc::now(),
    };

    let uid_str   = encode_uid(account.uid);
    let email_str = account.email.clone();
    let hash_str  = account.password_hash.clone();
    let at_str    = encode_dt(account.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO accounts (uid, email, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (email) DO NOTHING",
          rusqlite::params![uid_str, email_str, hash_str, at_str],
        )?)
      })
      .await?;

    if inserted == 0 {
      tracing::debug!(email = %account.email, "email already registered");
      return Ok(None);
    }
    Ok(Some(account))
  }

  async fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
    let email_str = email.to_lowercase();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM accounts WHERE email = ?1", RawAccount::COLUMNS),
              rusqlite::params![email_str],
              RawAccount::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn insert_session(&self, token_digest: String, uid: UserId) -> Result<()> {
    let uid_str = encode_uid(uid);
    let at_str  = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token_digest, uid, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![token_digest, uid_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn session_account(&self, token_digest: &str) -> Result<Option<Account>> {
    let digest = token_digest.to_owned();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT a.uid, a.email, a.password_hash, a.created_at
               FROM sessions s
               JOIN accounts a ON a.uid = s.uid
               WHERE s.token_digest = ?1",
              rusqlite::params![digest],
              RawAccount::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn delete_session(&self, token_digest: &str) -> Result<bool> {
    let digest = token_digest.to_owned();

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM sessions WHERE token_digest = ?1",
          rusqlite::params![digest],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }
}
