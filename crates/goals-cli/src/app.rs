//! Application state machine and event dispatcher.

use chrono::{Days, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use goals_core::{
  entries::EntryStore,
  entry::{EntryDraft, MonthSummary},
  goal::{GoalKey, PerGoal},
  identity::{IdentityProvider, User},
  month::{Month, today},
  session::{AuthEvent, SessionManager},
  store::DocumentStore,
};

// ─── Phase ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// Waiting for the identity provider's first report.
  Loading,
  /// Credential form.
  Unauthenticated,
  /// Goal form for the signed-in user.
  Authenticated,
}

/// Which credential field has the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
  Email,
  Password,
}

/// Email and password as typed.
#[derive(Debug)]
pub struct SignInForm {
  pub email:    String,
  pub password: String,
  pub field:    Field,
}

impl SignInForm {
  fn active_field(&mut self) -> &mut String {
    match self.field {
      Field::Email => &mut self.email,
      Field::Password => &mut self.password,
    }
  }
}

impl Default for SignInForm {
  fn default() -> Self {
    Self { email: String::new(), password: String::new(), field: Field::Email }
  }
}

/// Work queued by a key press. It runs after the next frame is drawn so the
/// in-flight status is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Load,
  Save,
  SignIn,
  SignUp,
  SignOut,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App<P, S> {
  pub phase: Phase,

  session: SessionManager<P>,
  entries: EntryStore<S>,

  /// The user whose data is on screen.
  pub user: Option<User>,

  pub form: SignInForm,

  /// Selected day. Defaults to today.
  pub date: NaiveDate,

  /// Unsaved edits for `date`. `None` until the day has been loaded.
  pub draft: Option<EntryDraft>,

  /// Stored summary for the month of `date`.
  pub summary: Option<MonthSummary>,

  /// One mantra per goal, picked at startup.
  pub mantras: PerGoal<&'static str>,

  /// Goal block with keyboard focus.
  pub focus: GoalKey,

  /// True while typing into the focused goal's notes.
  pub editing: bool,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  pending: Option<Action>,
}

impl<P, S> App<P, S>
where
  P: IdentityProvider,
  S: DocumentStore,
{
  pub fn new(
    session: SessionManager<P>,
    entries: EntryStore<S>,
    mantras: PerGoal<&'static str>,
  ) -> Self {
    Self {
      phase: Phase::Loading,
      session,
      entries,
      user: None,
      form: SignInForm::default(),
      date: today(),
      draft: None,
      summary: None,
      mantras,
      focus: GoalKey::Material,
      editing: false,
      status_msg: String::new(),
      pending: None,
    }
  }

  pub fn pending(&self) -> Option<Action> { self.pending }

  // ── Auth ──────────────────────────────────────────────────────────────────

  /// Apply every auth-state report the provider has published since the
  /// last call.
  pub fn sync_auth(&mut self) {
    while let Some(event) = self.session.poll() {
      self.on_auth_event(event);
    }
  }

  fn on_auth_event(&mut self, event: AuthEvent) {
    let switched = self.user.as_ref().map(|u| u.uid) != event.user.as_ref().map(|u| u.uid);
    if switched {
      self.clear_user_state();
    }
    self.user = event.user;

    match &self.user {
      Some(user) => {
        tracing::info!(uid = %user.uid, "signed in");
        self.phase = Phase::Authenticated;
        if switched || self.draft.is_none() {
          self.pending = Some(Action::Load);
        }
      }
      None => {
        self.phase = Phase::Unauthenticated;
      }
    }
  }

  /// Forget everything that belongs to the previous user.
  fn clear_user_state(&mut self) {
    self.draft = None;
    self.summary = None;
    self.date = today();
    self.focus = GoalKey::Material;
    self.editing = false;
    self.pending = None;
  }

  // ── Date ──────────────────────────────────────────────────────────────────

  /// Select another day. Unsaved edits are dropped.
  pub fn set_date(&mut self, date: NaiveDate) {
    if date == self.date && self.draft.is_some() {
      return;
    }
    self.date = date;
    self.draft = None;
    self.summary = None;
    self.editing = false;
    self.pending = Some(Action::Load);
  }

  fn shift_date(&mut self, forward: bool) {
    let next = if forward {
      self.date.checked_add_days(Days::new(1))
    } else {
      self.date.checked_sub_days(Days::new(1))
    };
    if let Some(date) = next {
      self.set_date(date);
    }
  }

  // ── Async work ────────────────────────────────────────────────────────────

  /// Run the queued action, if any.
  pub async fn run_pending(&mut self) {
    let Some(action) = self.pending.take() else {
      return;
    };
    match action {
      Action::Load => self.load().await,
      Action::Save => self.save().await,
      Action::SignIn => self.sign_in().await,
      Action::SignUp => self.sign_up().await,
      Action::SignOut => self.sign_out().await,
    }
    self.sync_auth();
  }

  async fn load(&mut self) {
    let Some(uid) = self.user.as_ref().map(|u| u.uid) else {
      return;
    };
    let date = self.date;

    // The entry and the month summary fail independently. Only an entry
    // failure falls back to defaults; a summary failure just hides the panel.
    match self.entries.load_entry(uid, date).await {
      Ok(draft) => {
        self.draft = Some(draft);
        self.status_msg.clear();
      }
      Err(e) => {
        tracing::warn!(%uid, %date, error = %e, "entry load failed");
        self.draft = Some(EntryDraft::new(date));
        self.status_msg = format!("Load error: {e}");
      }
    }

    let month = Month::of(date);
    self.summary = match self.entries.load_month_summary(uid, month).await {
      Ok(summary) => Some(summary),
      Err(e) => {
        tracing::warn!(%uid, %month, error = %e, "month summary load failed");
        None
      }
    };
  }

  async fn save(&mut self) {
    let (Some(uid), Some(draft)) = (self.user.as_ref().map(|u| u.uid), self.draft.as_ref()) else {
      return;
    };
    match self.entries.commit(uid, draft).await {
      Ok(summary) => {
        self.summary = Some(summary);
        self.status_msg = "Saved ✓".into();
      }
      Err(e) => {
        tracing::warn!(%uid, date = %draft.date, error = %e, "save failed");
        self.status_msg = format!("Save error: {e}");
      }
    }
  }

  async fn sign_in(&mut self) {
    match self.session.sign_in(&self.form.email, &self.form.password).await {
      Ok(_) => {
        self.form = SignInForm::default();
        self.status_msg.clear();
      }
      Err(e) => self.status_msg = format!("Sign-in error: {e}"),
    }
  }

  async fn sign_up(&mut self) {
    match self.session.sign_up(&self.form.email, &self.form.password).await {
      Ok(_) => {
        self.form = SignInForm::default();
        self.status_msg.clear();
      }
      Err(e) => self.status_msg = format!("Sign-up error: {e}"),
    }
  }

  async fn sign_out(&mut self) {
    match self.session.sign_out().await {
      Ok(()) => self.status_msg.clear(),
      Err(e) => self.status_msg = format!("Sign-out error: {e}"),
    }
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub fn handle_key(&mut self, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
      return false;
    }

    match self.phase {
      Phase::Loading => key.code != KeyCode::Char('q') && key.code != KeyCode::Esc,
      Phase::Unauthenticated => self.handle_form_key(key, ctrl),
      Phase::Authenticated if self.editing => {
        self.handle_notes_key(key, ctrl);
        true
      }
      Phase::Authenticated => self.handle_goal_key(key),
    }
  }

  fn handle_form_key(&mut self, key: KeyEvent, ctrl: bool) -> bool {
    match key.code {
      KeyCode::Esc => return false,
      KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
        self.form.field = match self.form.field {
          Field::Email => Field::Password,
          Field::Password => Field::Email,
        };
      }
      KeyCode::Enter => self.queue(Action::SignIn, "Signing in…"),
      KeyCode::Char('n') if ctrl => self.queue(Action::SignUp, "Creating account…"),
      KeyCode::Backspace => {
        self.form.active_field().pop();
      }
      KeyCode::Char(c) if !ctrl => self.form.active_field().push(c),
      _ => {}
    }
    true
  }

  fn handle_notes_key(&mut self, key: KeyEvent, ctrl: bool) {
    if ctrl && key.code == KeyCode::Char('s') {
      self.editing = false;
      self.queue(Action::Save, "Saving…");
      return;
    }
    let Some(draft) = self.draft.as_mut() else {
      self.editing = false;
      return;
    };
    let note = draft.note_mut(self.focus);
    match key.code {
      KeyCode::Esc => self.editing = false,
      KeyCode::Enter => note.push('\n'),
      KeyCode::Backspace => {
        note.pop();
      }
      KeyCode::Char(c) if !ctrl => note.push(c),
      _ => {}
    }
  }

  fn handle_goal_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('q') => return false,

      // Date
      KeyCode::Left | KeyCode::Char('h') => self.shift_date(false),
      KeyCode::Right | KeyCode::Char('l') => self.shift_date(true),
      KeyCode::Char('t') => self.set_date(today()),

      // Goal focus
      KeyCode::Tab | KeyCode::Down | KeyCode::Char('j') => self.focus = step_focus(self.focus, true),
      KeyCode::BackTab | KeyCode::Up | KeyCode::Char('k') => {
        self.focus = step_focus(self.focus, false)
      }

      // Rating
      KeyCode::Char(c @ '1'..='5') => {
        if let (Some(draft), Some(rating)) = (self.draft.as_mut(), c.to_digit(10)) {
          draft.set_rating(self.focus, rating as u8);
        }
      }
      KeyCode::Char('+') | KeyCode::Char('=') => {
        if let Some(draft) = self.draft.as_mut() {
          draft.step_rating(self.focus, true);
        }
      }
      KeyCode::Char('-') => {
        if let Some(draft) = self.draft.as_mut() {
          draft.step_rating(self.focus, false);
        }
      }

      // Notes
      KeyCode::Enter | KeyCode::Char('e') if self.draft.is_some() => self.editing = true,

      // Save (plain or Ctrl-S)
      KeyCode::Char('s') if self.draft.is_some() => self.queue(Action::Save, "Saving…"),

      // Sign out
      KeyCode::Char('L') => self.queue(Action::SignOut, "Signing out…"),

      _ => {}
    }
    true
  }

  fn queue(&mut self, action: Action, status: &str) {
    self.pending = Some(action);
    self.status_msg = status.into();
  }
}

fn step_focus(current: GoalKey, forward: bool) -> GoalKey {
  let keys: Vec<GoalKey> = GoalKey::all().collect();
  let i = keys.iter().position(|k| *k == current).unwrap_or(0);
  let next = if forward { i + 1 } else { i + keys.len() - 1 };
  keys[next % keys.len()]
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
  };

  use crossterm::event::KeyEventKind;
  use goals_core::{
    identity::{AuthState, Credentials, UserId},
    store::{CollectionPath, CollectionQuery, DocPath, Document, Snapshot},
  };
  use goals_store_sqlite::SqliteStore;
  use thiserror::Error;
  use tokio::sync::watch;

  use super::*;

  #[derive(Debug, Error)]
  #[error("{0}")]
  struct FakeError(&'static str);

  /// In-memory identity provider that starts in the `Unknown` state.
  struct FakeIdentity {
    accounts: Mutex<HashMap<String, (String, User)>>,
    state:    watch::Sender<AuthState>,
  }

  impl FakeIdentity {
    fn new() -> Self {
      Self { accounts: Mutex::new(HashMap::new()), state: watch::Sender::new(AuthState::Unknown) }
    }
  }

  impl IdentityProvider for FakeIdentity {
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
      let user = User { uid: UserId::new(), email: Some(c.email.clone()) };
      self.accounts.lock().unwrap().insert(c.email, (c.password, user.clone()));
      self.state.send_replace(AuthState::SignedIn(user.clone()));
      Ok(user)
    }

    async fn sign_out(&self) -> Result<(), FakeError> {
      self.state.send_replace(AuthState::SignedOut);
      Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<AuthState> { self.state.subscribe() }
  }

  /// A store whose every call fails.
  struct BrokenStore;

  impl DocumentStore for BrokenStore {
    type Error = FakeError;

    async fn get(&self, _: &DocPath) -> Result<Option<Document>, FakeError> {
      Err(FakeError("store unavailable"))
    }

    async fn set_merge(&self, _: &DocPath, _: Document) -> Result<(), FakeError> {
      Err(FakeError("store unavailable"))
    }

    async fn list(&self, _: &CollectionPath, _: &CollectionQuery) -> Result<Vec<Snapshot>, FakeError> {
      Err(FakeError("store unavailable"))
    }
  }

  /// Wraps a real store but fails every read of a month summary.
  struct FlakyMonths(Arc<SqliteStore>);

  impl DocumentStore for FlakyMonths {
    type Error = FakeError;

    async fn get(&self, path: &DocPath) -> Result<Option<Document>, FakeError> {
      if path.to_string().contains("/months/") {
        return Err(FakeError("months unavailable"));
      }
      self.0.get(path).await.map_err(|_| FakeError("store unavailable"))
    }

    async fn set_merge(&self, path: &DocPath, fields: Document) -> Result<(), FakeError> {
      self.0.set_merge(path, fields).await.map_err(|_| FakeError("store unavailable"))
    }

    async fn list(
      &self,
      collection: &CollectionPath,
      query: &CollectionQuery,
    ) -> Result<Vec<Snapshot>, FakeError> {
      self.0.list(collection, query).await.map_err(|_| FakeError("store unavailable"))
    }
  }

  fn mantras() -> PerGoal<&'static str> { PerGoal::splat("breathe") }

  async fn app() -> (Arc<FakeIdentity>, App<FakeIdentity, SqliteStore>) {
    let identity = Arc::new(FakeIdentity::new());
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let app = App::new(SessionManager::new(identity.clone()), EntryStore::new(store), mantras());
    (identity, app)
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new_with_kind(code, KeyModifiers::NONE, KeyEventKind::Press)
  }

  fn ctrl(c: char) -> KeyEvent {
    KeyEvent::new_with_kind(KeyCode::Char(c), KeyModifiers::CONTROL, KeyEventKind::Press)
  }

  fn type_str<P: IdentityProvider, S: DocumentStore>(app: &mut App<P, S>, s: &str) {
    for c in s.chars() {
      assert!(app.handle_key(key(KeyCode::Char(c))));
    }
  }

  /// Drive the credential form and let the resulting load finish.
  async fn register<S: DocumentStore>(app: &mut App<FakeIdentity, S>, email: &str) {
    type_str(app, email);
    app.handle_key(key(KeyCode::Tab));
    type_str(app, "secret1");
    app.handle_key(ctrl('n'));
    assert_eq!(app.pending(), Some(Action::SignUp));
    app.run_pending().await;
    assert_eq!(app.phase, Phase::Authenticated);
    app.run_pending().await;
  }

  fn day(s: &str) -> NaiveDate { s.parse().unwrap() }

  #[tokio::test]
  async fn first_report_leaves_loading_either_way() {
    let (identity, mut app) = app().await;
    app.sync_auth();
    assert_eq!(app.phase, Phase::Loading);

    identity.state.send_replace(AuthState::SignedOut);
    app.sync_auth();
    assert_eq!(app.phase, Phase::Unauthenticated);
  }

  #[tokio::test]
  async fn restored_user_goes_straight_to_the_goal_form() {
    let (identity, mut app) = app().await;
    let user = User { uid: UserId::new(), email: None };
    identity.state.send_replace(AuthState::SignedIn(user.clone()));

    app.sync_auth();
    assert_eq!(app.phase, Phase::Authenticated);
    assert_eq!(app.pending(), Some(Action::Load));
    app.run_pending().await;
    assert_eq!(app.draft, Some(EntryDraft::new(app.date)));
    assert_eq!(app.summary, Some(MonthSummary::zeroed()));
  }

  #[tokio::test]
  async fn sign_up_clears_the_form_and_loads_defaults() {
    let (identity, mut app) = app().await;
    identity.state.send_replace(AuthState::SignedOut);
    app.sync_auth();

    register(&mut app, "ann@example.com").await;
    assert_eq!(app.form.email, "");
    assert_eq!(app.form.password, "");
    assert_eq!(app.user.as_ref().and_then(|u| u.email.as_deref()), Some("ann@example.com"));
    assert_eq!(app.draft.as_ref().unwrap().rating, PerGoal::splat(3));
  }

  #[tokio::test]
  async fn sign_in_failure_shows_status_and_stays_put() {
    let (identity, mut app) = app().await;
    identity.state.send_replace(AuthState::SignedOut);
    app.sync_auth();

    type_str(&mut app, "nobody@example.com");
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.status_msg, "Signing in…");
    app.run_pending().await;

    assert_eq!(app.phase, Phase::Unauthenticated);
    assert_eq!(app.status_msg, "Sign-in error: invalid email or password");
    assert_eq!(app.form.email, "nobody@example.com");
  }

  #[tokio::test]
  async fn edits_stay_in_the_draft_until_saved() {
    let (identity, mut app) = app().await;
    identity.state.send_replace(AuthState::SignedOut);
    app.sync_auth();
    register(&mut app, "ann@example.com").await;
    app.set_date(day("2026-06-01"));
    app.run_pending().await;

    app.handle_key(key(KeyCode::Char('5')));
    app.handle_key(key(KeyCode::Tab));
    app.handle_key(key(KeyCode::Char('-')));
    app.handle_key(key(KeyCode::Enter));
    assert!(app.editing);
    type_str(&mut app, "no snapping");
    app.handle_key(key(KeyCode::Esc));
    assert!(!app.editing);

    let draft = app.draft.clone().unwrap();
    assert_eq!(draft.rating, PerGoal { material: 5, ego: 2, running: 3 });
    assert_eq!(draft.notes.ego, "no snapping");
    assert_eq!(app.summary, Some(MonthSummary::zeroed()));

    app.handle_key(key(KeyCode::Char('s')));
    assert_eq!(app.status_msg, "Saving…");
    app.run_pending().await;
    assert_eq!(app.status_msg, "Saved ✓");
    assert_eq!(
      app.summary.unwrap().percent,
      PerGoal { material: 100, ego: 40, running: 60 }
    );

    // Reloading the day shows the committed values.
    app.set_date(day("2026-06-02"));
    app.run_pending().await;
    app.set_date(day("2026-06-01"));
    app.run_pending().await;
    assert_eq!(app.draft, Some(draft));
  }

  #[tokio::test]
  async fn changing_date_discards_unsaved_edits() {
    let (identity, mut app) = app().await;
    identity.state.send_replace(AuthState::SignedOut);
    app.sync_auth();
    register(&mut app, "ann@example.com").await;
    app.set_date(day("2026-06-10"));
    app.run_pending().await;

    app.handle_key(key(KeyCode::Char('1')));
    app.handle_key(key(KeyCode::Right));
    assert_eq!(app.date, day("2026-06-11"));
    assert!(app.draft.is_none());
    app.run_pending().await;

    app.handle_key(key(KeyCode::Left));
    app.run_pending().await;
    assert_eq!(app.draft, Some(EntryDraft::new(day("2026-06-10"))));
  }

  #[tokio::test]
  async fn next_user_never_sees_previous_users_data() {
    let (identity, mut app) = app().await;
    identity.state.send_replace(AuthState::SignedOut);
    app.sync_auth();

    register(&mut app, "ann@example.com").await;
    let ann_day = app.date;
    app.handle_key(key(KeyCode::Char('5')));
    app.handle_key(key(KeyCode::Char('e')));
    type_str(&mut app, "ann's secret");
    app.handle_key(ctrl('s'));
    app.run_pending().await;
    assert_eq!(app.summary.unwrap().percent.material, 100);

    app.set_date(day("2020-01-01"));
    app.run_pending().await;
    app.handle_key(key(KeyCode::Char('L')));
    app.run_pending().await;
    assert_eq!(app.phase, Phase::Unauthenticated);
    assert!(app.draft.is_none());
    assert!(app.summary.is_none());
    assert_eq!(app.date, today());

    register(&mut app, "bob@example.com").await;
    assert_eq!(app.date, ann_day);
    let draft = app.draft.as_ref().unwrap();
    assert_eq!(draft.rating, PerGoal::splat(3));
    assert_eq!(draft.notes, PerGoal::default());
    assert_eq!(app.summary, Some(MonthSummary::zeroed()));
  }

  #[tokio::test]
  async fn store_failures_become_status_messages() {
    let identity = Arc::new(FakeIdentity::new());
    let mut app = App::new(
      SessionManager::new(identity.clone()),
      EntryStore::new(Arc::new(BrokenStore)),
      mantras(),
    );
    identity.state.send_replace(AuthState::SignedOut);
    app.sync_auth();
    register(&mut app, "ann@example.com").await;

    assert_eq!(app.status_msg, "Load error: store unavailable");
    assert_eq!(app.draft, Some(EntryDraft::new(app.date)));

    app.handle_key(key(KeyCode::Char('s')));
    app.run_pending().await;
    assert_eq!(app.status_msg, "Save error: store unavailable");
    assert_eq!(app.phase, Phase::Authenticated);
  }

  #[tokio::test]
  async fn month_summary_failure_keeps_the_stored_entry() {
    let inner = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let identity = Arc::new(FakeIdentity::new());
    let mut app = App::new(
      SessionManager::new(identity.clone()),
      EntryStore::new(Arc::new(FlakyMonths(inner.clone()))),
      mantras(),
    );
    identity.state.send_replace(AuthState::SignedOut);
    app.sync_auth();
    register(&mut app, "ann@example.com").await;
    let uid = app.user.as_ref().unwrap().uid;

    let mut seeded = EntryDraft::new(day("2026-06-04"));
    for goal in GoalKey::all() {
      seeded.set_rating(goal, 5);
    }
    seeded.note_mut(GoalKey::Ego).push_str("precious");
    EntryStore::new(inner.clone()).save_entry(uid, &seeded.to_patch()).await.unwrap();

    app.set_date(seeded.date);
    app.run_pending().await;
    assert_eq!(app.draft, Some(seeded.clone()));
    assert!(app.summary.is_none());
    assert_eq!(app.status_msg, "");

    app.handle_key(key(KeyCode::Char('s')));
    app.run_pending().await;
    assert_eq!(app.status_msg, "Saved ✓");

    let stored = EntryStore::new(inner).get_entry(uid, seeded.date).await.unwrap().unwrap();
    assert_eq!(stored.into_draft(), seeded);
  }

  #[test]
  fn focus_wraps_around() {
    assert_eq!(step_focus(GoalKey::Running, true), GoalKey::Material);
    assert_eq!(step_focus(GoalKey::Material, false), GoalKey::Running);
    assert_eq!(step_focus(GoalKey::Material, true), GoalKey::Ego);
  }
}
