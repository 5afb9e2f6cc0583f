//! Async HTTP client for the goals server, exposed through the core
//! [`IdentityProvider`] and [`DocumentStore`] traits.

use std::{
  path::PathBuf,
  sync::{Arc, RwLock},
};

use anyhow::Context as _;
use goals_core::{
  identity::{AuthState, Credentials, IdentityProvider, User},
  store::{CollectionPath, CollectionQuery, DocPath, Direction, Document, DocumentStore, Snapshot},
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum ClientError {
  /// A message from the server, shown to the user as-is.
  #[error("{message}")]
  Api { status: StatusCode, message: String },
  #[error("network error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("session file: {0}")]
  Io(#[from] std::io::Error),
}

/// Connection settings for the goals server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// Shared HTTP plumbing: one connection pool, one bearer token.
///
/// Cheap to clone: the inner [`reqwest::Client`] and the token slot are
/// `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
  token:  Arc<RwLock<Option<String>>>,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
    let client = Client::builder().build().context("failed to build HTTP client")?;
    Ok(Self { client, config, token: Arc::default() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn set_token(&self, token: Option<String>) {
    *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match self.token.read().unwrap_or_else(|e| e.into_inner()).as_deref() {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }
}

/// Turn a non-success response into [`ClientError::Api`], using the server's
/// `{"error": ...}` message when there is one.
async fn check(resp: Response) -> Result<Response, ClientError> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }

  #[derive(Deserialize)]
  struct ErrorBody {
    error: String,
  }

  let message = match resp.json::<ErrorBody>().await {
    Ok(body) => body.error,
    Err(_) => status.to_string(),
  };
  Err(ClientError::Api { status, message })
}

// ─── Identity ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SessionBody {
  token: String,
  user:  User,
}

/// Identity provider backed by the server's `/auth` endpoints.
///
/// The session token survives restarts in `session_file`. Until [`restore`]
/// has checked it, the published state is [`AuthState::Unknown`].
///
/// [`restore`]: HttpIdentity::restore
pub struct HttpIdentity {
  api:          ApiClient,
  session_file: Option<PathBuf>,
  state:        watch::Sender<AuthState>,
}

impl HttpIdentity {
  pub fn new(api: ApiClient, session_file: Option<PathBuf>) -> Self {
    Self { api, session_file, state: watch::Sender::new(AuthState::Unknown) }
  }

  /// Resume the stored session, if any, and publish the first auth state.
  pub async fn restore(&self) {
    let state = match self.resume().await {
      Ok(Some(user)) => {
        tracing::info!(uid = %user.uid, "session restored");
        AuthState::SignedIn(user)
      }
      Ok(None) => AuthState::SignedOut,
      Err(e) => {
        tracing::warn!(error = %e, "could not restore session");
        AuthState::SignedOut
      }
    };
    self.state.send_replace(state);
  }

  async fn resume(&self) -> Result<Option<User>, ClientError> {
    let Some(path) = &self.session_file else {
      return Ok(None);
    };
    let token = match tokio::fs::read_to_string(path).await {
      Ok(token) => token.trim().to_owned(),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };
    if token.is_empty() {
      return Ok(None);
    }

    self.api.set_token(Some(token));
    let resp = self.api.auth(self.api.client.get(self.api.url("/auth/me"))).send().await?;
    match check(resp).await {
      Ok(resp) => Ok(Some(resp.json().await?)),
      Err(ClientError::Api { status, .. }) if status == StatusCode::UNAUTHORIZED => {
        self.forget().await;
        Ok(None)
      }
      Err(e) => {
        self.api.set_token(None);
        Err(e)
      }
    }
  }

  async fn start(&self, path: &str, credentials: Credentials) -> Result<User, ClientError> {
    let resp = self
      .api
      .client
      .post(self.api.url(path))
      .json(&credentials)
      .send()
      .await?;
    let session: SessionBody = check(resp).await?.json().await?;

    // Nothing changes locally unless the token could be kept.
    self.persist(&session.token).await?;
    self.api.set_token(Some(session.token));
    self.state.send_replace(AuthState::SignedIn(session.user.clone()));
    Ok(session.user)
  }

  async fn persist(&self, token: &str) -> Result<(), ClientError> {
    let Some(file) = &self.session_file else {
      return Ok(());
    };
    if let Some(parent) = file.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(file, token).await?;
    Ok(())
  }

  /// Drop the token locally and remove the session file.
  async fn forget(&self) {
    self.api.set_token(None);
    if let Some(file) = &self.session_file
      && let Err(e) = tokio::fs::remove_file(file).await
      && e.kind() != std::io::ErrorKind::NotFound
    {
      tracing::warn!(error = %e, "could not remove session file");
    }
  }
}

impl IdentityProvider for HttpIdentity {
  type Error = ClientError;

  async fn sign_in(&self, credentials: Credentials) -> Result<User, ClientError> {
    self.start("/auth/sign-in", credentials).await
  }

  async fn sign_up(&self, credentials: Credentials) -> Result<User, ClientError> {
    self.start("/auth/sign-up", credentials).await
  }

  async fn sign_out(&self) -> Result<(), ClientError> {
    let resp = self
      .api
      .auth(self.api.client.post(self.api.url("/auth/sign-out")))
      .send()
      .await?;
    match check(resp).await {
      Ok(_) => {}
      // An unknown token is already signed out.
      Err(ClientError::Api { status, .. }) if status == StatusCode::UNAUTHORIZED => {}
      Err(e) => return Err(e),
    }
    self.forget().await;
    self.state.send_replace(AuthState::SignedOut);
    Ok(())
  }

  fn subscribe(&self) -> watch::Receiver<AuthState> { self.state.subscribe() }
}

// ─── Documents ────────────────────────────────────────────────────────────────

/// Document store backed by the server's `/documents` endpoints, using the
/// token of the shared [`ApiClient`].
pub struct HttpDocuments {
  api: ApiClient,
}

impl HttpDocuments {
  pub fn new(api: ApiClient) -> Self { Self { api } }
}

impl DocumentStore for HttpDocuments {
  type Error = ClientError;

  /// `GET /documents/{path}`
  async fn get(&self, path: &DocPath) -> Result<Option<Document>, ClientError> {
    let resp = self
      .api
      .auth(self.api.client.get(self.api.url(&format!("/documents/{path}"))))
      .send()
      .await?;
    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    Ok(Some(check(resp).await?.json().await?))
  }

  /// `PATCH /documents/{path}`
  async fn set_merge(&self, path: &DocPath, fields: Document) -> Result<(), ClientError> {
    let resp = self
      .api
      .auth(self.api.client.patch(self.api.url(&format!("/documents/{path}"))))
      .json(&fields)
      .send()
      .await?;
    check(resp).await?;
    Ok(())
  }

  /// `GET /documents/{collection}?order_by=<field>&direction=<dir>`
  async fn list(
    &self,
    collection: &CollectionPath,
    query: &CollectionQuery,
  ) -> Result<Vec<Snapshot>, ClientError> {
    let mut params = vec![(
      "direction",
      match query.direction {
        Direction::Asc => "asc",
        Direction::Desc => "desc",
      },
    )];
    if let Some(field) = &query.order_by {
      params.push(("order_by", field.as_str()));
    }

    let resp = self
      .api
      .auth(self.api.client.get(self.api.url(&format!("/documents/{collection}"))))
      .query(&params)
      .send()
      .await?;
    Ok(check(resp).await?.json().await?)
  }
}
