//! SQL schema for the goals SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per document. Writes merge into body_json; rows are never deleted.
CREATE TABLE IF NOT EXISTS documents (
    path        TEXT PRIMARY KEY,  -- e.g. users/{uid}/entries/2026-06-01
    collection  TEXT NOT NULL,     -- parent collection path
    doc_id      TEXT NOT NULL,     -- last path segment
    body_json   TEXT NOT NULL,     -- JSON object
    updated_at  TEXT NOT NULL      -- ISO 8601 UTC; server-assigned
);

CREATE TABLE IF NOT EXISTS accounts (
    uid            TEXT PRIMARY KEY,
    email          TEXT NOT NULL UNIQUE,  -- stored lowercased
    password_hash  TEXT NOT NULL,         -- argon2 PHC string
    created_at     TEXT NOT NULL
);

-- Only a digest of each bearer token is kept.
CREATE TABLE IF NOT EXISTS sessions (
    token_digest  TEXT PRIMARY KEY,
    uid           TEXT NOT NULL REFERENCES accounts(uid),
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS documents_collection_idx ON documents(collection);
CREATE INDEX IF NOT EXISTS sessions_uid_idx         ON sessions(uid);

PRAGMA user_version = 1;
";
