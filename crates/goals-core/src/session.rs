//! [`SessionManager`]: the app's view of who is signed in.
//!
//! The manager owns the provider subscription for its whole lifetime; dropping
//! it is the single teardown. Sign-in, sign-up and sign-out never touch the
//! observed user directly. The new state arrives through the subscription,
//! exactly as the provider publishes it.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::identity::{AuthState, Credentials, IdentityProvider, User};

/// A provider failure, displayed verbatim to the user.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SessionError(#[source] Box<dyn std::error::Error + Send + Sync>);

/// A change in the observed user. The first report is always delivered, even
/// when nobody is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
  pub user: Option<User>,
}

pub struct SessionManager<P> {
  provider: Arc<P>,
  auth_rx:  watch::Receiver<AuthState>,
  user:     Option<User>,
  ready:    bool,
}

impl<P: IdentityProvider> SessionManager<P> {
  pub fn new(provider: Arc<P>) -> Self {
    let auth_rx = provider.subscribe();
    Self { provider, auth_rx, user: None, ready: false }
  }

  /// True once the provider has reported its initial state.
  pub fn ready(&self) -> bool { self.ready }

  pub fn current_user(&self) -> Option<&User> { self.user.as_ref() }

  pub fn provider(&self) -> &P { &self.provider }

  /// Take any pending auth-state report without waiting.
  pub fn poll(&mut self) -> Option<AuthEvent> {
    if self.ready && !self.auth_rx.has_changed().unwrap_or(false) {
      return None;
    }
    self.observe()
  }

  /// Wait for the next auth-state report. Returns `None` once the provider
  /// has gone away.
  pub async fn changed(&mut self) -> Option<AuthEvent> {
    loop {
      if let Some(event) = self.poll() {
        return Some(event);
      }
      self.auth_rx.changed().await.ok()?;
    }
  }

  fn observe(&mut self) -> Option<AuthEvent> {
    let state = self.auth_rx.borrow_and_update().clone();
    let user = match state {
      AuthState::Unknown => return None,
      AuthState::SignedOut => None,
      AuthState::SignedIn(user) => Some(user),
    };
    self.ready = true;
    self.user = user.clone();
    Some(AuthEvent { user })
  }

  pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, SessionError> {
    self
      .provider
      .sign_in(credentials(email, password))
      .await
      .map_err(|e| failed("sign-in", e))
  }

  pub async fn sign_up(&self, email: &str, password: &str) -> Result<User, SessionError> {
    self
      .provider
      .sign_up(credentials(email, password))
      .await
      .map_err(|e| failed("sign-up", e))
  }

  pub async fn sign_out(&self) -> Result<(), SessionError> {
    self.provider.sign_out().await.map_err(|e| failed("sign-out", e))
  }
}

fn credentials(email: &str, password: &str) -> Credentials {
  Credentials { email: email.trim().to_owned(), password: password.to_owned() }
}

fn failed<E>(operation: &str, e: E) -> SessionError
where
  E: std::error::Error + Send + Sync + 'static,
{
  tracing::warn!(operation, error = %e, "identity provider call failed");
  SessionError(Box::new(e))
}

#[cfg(test)]
mod tests {
  use std::{collections::HashMap, sync::Mutex};

  use super::*;
  use crate::identity::UserId;

  #[derive(Debug, Error)]
  #[error("{0}")]
  struct FakeError(&'static str);

  /// In-memory provider: accounts by email, one signed-in user at a time.
  struct FakeProvider {
    accounts: Mutex<HashMap<String, (String, User)>>,
    state:    watch::Sender<AuthState>,
  }

  impl FakeProvider {
    fn new() -> Self {
      Self { accounts: Mutex::new(HashMap::new()), state: watch::Sender::new(AuthState::Unknown) }
    }
  }

  impl IdentityProvider for FakeProvider {
    type Error = FakeError;

    async fn sign_in(&self, c: Credentials) -> Result<User, FakeError> {
      let user = match self.accounts.lock().unwrap().get(&c.email) {
        Some((pw, user)) if *pw == c.password => user.clone(),
        _ => return Err(FakeError("invalid email or password")),
      };
      self.state.send_replace(AuthState::SignedIn(user.clone()));
      Ok(user)
    }

    async fn sign_up(&self, c: Credentials) -> Result<User, FakeError> {
      let user = {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&c.email) {
          return Err(FakeError("email already in use"));
        }
        let user = User { uid: UserId::new(), email: Some(c.email.clone()) };
        accounts.insert(c.email, (c.password, user.clone()));
        user
      };
      self.state.send_replace(AuthState::SignedIn(user.clone()));
      Ok(user)
    }

    async fn sign_out(&self) -> Result<(), FakeError> {
      self.state.send_replace(AuthState::SignedOut);
      Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<AuthState> { self.state.subscribe() }
  }

  #[tokio::test]
  async fn not_ready_until_first_report() {
    let provider = Arc::new(FakeProvider::new());
    let mut session = SessionManager::new(provider.clone());
    assert!(session.poll().is_none());
    assert!(!session.ready());

    provider.state.send_replace(AuthState::SignedOut);
    assert_eq!(session.poll(), Some(AuthEvent { user: None }));
    assert!(session.ready());
    assert!(session.poll().is_none());
  }

  #[tokio::test]
  async fn initial_report_is_delivered_even_if_already_published() {
    let provider = Arc::new(FakeProvider::new());
    provider.state.send_replace(AuthState::SignedOut);
    let mut session = SessionManager::new(provider);
    assert_eq!(session.changed().await, Some(AuthEvent { user: None }));
  }

  #[tokio::test]
  async fn sign_up_then_sign_in_trims_email() {
    let provider = Arc::new(FakeProvider::new());
    provider.state.send_replace(AuthState::SignedOut);
    let mut session = SessionManager::new(provider);
    session.poll();

    let user = session.sign_up(" a@example.com ", "secret1").await.unwrap();
    assert_eq!(user.email.as_deref(), Some("a@example.com"));
    let event = session.poll().unwrap();
    assert_eq!(event.user.as_ref(), Some(&user));
    assert_eq!(session.current_user(), Some(&user));

    session.sign_out().await.unwrap();
    assert_eq!(session.poll(), Some(AuthEvent { user: None }));

    session.sign_in("a@example.com  ", "secret1").await.unwrap();
    assert_eq!(session.poll().unwrap().user, Some(user));
  }

  #[tokio::test]
  async fn failure_leaves_identity_unchanged() {
    let provider = Arc::new(FakeProvider::new());
    provider.state.send_replace(AuthState::SignedOut);
    let mut session = SessionManager::new(provider);
    session.poll();

    let err = session.sign_in("nobody@example.com", "x").await.unwrap_err();
    assert_eq!(err.to_string(), "invalid email or password");
    assert!(session.poll().is_none());
    assert!(session.current_user().is_none());

    session.sign_up("b@example.com", "pw").await.unwrap();
    session.poll();
    let before = session.current_user().cloned();
    let err = session.sign_up("b@example.com", "pw").await.unwrap_err();
    assert_eq!(err.to_string(), "email already in use");
    assert!(session.poll().is_none());
    assert_eq!(session.current_user().cloned(), before);
  }
}
