//! The identity provider boundary.
//!
//! Credential storage, password hashing and session tokens belong to the
//! provider. The rest of the app only sees "current user or none", pushed
//! through a [`watch`] channel.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

/// Opaque user id issued by the identity provider. All stored data is
/// partitioned by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for UserId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

impl std::str::FromStr for UserId {
  type Err = uuid::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Uuid::parse_str(s).map(Self) }
}

/// A signed-in user as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub uid:   UserId,
  pub email: Option<String>,
}

/// What the provider currently reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
  /// The provider has not reported yet (e.g. a stored session is still being
  /// checked).
  #[default]
  Unknown,
  SignedOut,
  SignedIn(User),
}

impl AuthState {
  pub fn user(&self) -> Option<&User> {
    match self {
      AuthState::SignedIn(user) => Some(user),
      _ => None,
    }
  }
}

/// Email/password pair submitted to sign in or sign up.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
  pub email:    String,
  pub password: String,
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("email", &self.email)
      .field("password", &"<redacted>")
      .finish()
  }
}

/// Abstraction over an email/password identity provider.
///
/// Successful calls publish the new state on the [`subscribe`] channel;
/// failed calls leave it untouched. Error messages are shown to the user as-is.
///
/// [`subscribe`]: IdentityProvider::subscribe
pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn sign_in(
    &self,
    credentials: Credentials,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Create an account and sign it in.
  fn sign_up(
    &self,
    credentials: Credentials,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn sign_out(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Subscribe to auth-state changes. The current value is
  /// [`AuthState::Unknown`] until the provider has made its first report.
  fn subscribe(&self) -> watch::Receiver<AuthState>;
}
