//! `goals`: terminal UI for rating three daily goals.
//!
//! # Usage
//!
//! ```
//! goals --url http://localhost:8787
//! goals --config ~/.config/goals/config.toml
//! ```

mod app;
mod client;
mod ui;

use std::{
  io,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  time::Duration,
};

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use client::{ApiClient, ApiConfig, HttpDocuments, HttpIdentity};
use crossterm::{
  event::{self, Event, KeyEventKind},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use goals_core::{entries::EntryStore, goal::pick_mantras, session::SessionManager};
use rand_core::OsRng;
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "goals", about = "Terminal UI for Daily Goals")]
struct Args {
  /// Path to a TOML config file (url, session_file, log_file).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the goals server (default: http://localhost:8787).
  #[arg(long, env = "GOALS_URL")]
  url: Option<String>,

  /// Where the session token is kept between runs.
  #[arg(long, env = "GOALS_SESSION_FILE", value_name = "FILE")]
  session_file: Option<PathBuf>,

  /// Where log output goes; the terminal belongs to the UI.
  #[arg(long, env = "GOALS_LOG_FILE", value_name = "FILE")]
  log_file: Option<PathBuf>,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:          String,
  session_file: Option<PathBuf>,
  log_file:     Option<PathBuf>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:8787".to_string());
  let session_file = expand_tilde(
    &args
      .session_file
      .or(file_cfg.session_file)
      .unwrap_or_else(|| PathBuf::from("~/.local/share/goals/session")),
  );
  let log_file = expand_tilde(
    &args
      .log_file
      .or(file_cfg.log_file)
      .unwrap_or_else(|| PathBuf::from("~/.local/share/goals/goals.log")),
  );

  init_logging(&log_file)?;
  tracing::info!(%base_url, "starting");

  let api = ApiClient::new(ApiConfig { base_url })?;
  let identity = Arc::new(HttpIdentity::new(api.clone(), Some(session_file)));
  let documents = Arc::new(HttpDocuments::new(api));

  // The provider's first report arrives once the stored session is checked.
  tokio::spawn({
    let identity = identity.clone();
    async move { identity.restore().await }
  });

  let mut app = App::new(
    SessionManager::new(identity),
    EntryStore::new(documents),
    pick_mantras(&mut OsRng),
  );

  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let run_result = run_event_loop(&mut terminal, &mut app).await;

  // Restore terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  if let Err(e) = &run_result {
    tracing::error!(error = %e, "event loop failed");
  }
  run_result
}

fn init_logging(path: &Path) -> Result<()> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("creating log directory {}", parent.display()))?;
  }
  let file = std::fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .with_context(|| format!("opening log file {}", path.display()))?;

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_ansi(false)
    .with_writer(Mutex::new(file))
    .init();
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App<HttpIdentity, HttpDocuments>,
) -> Result<()> {
  loop {
    app.sync_auth();
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Queued work runs after the frame that shows its status.
    if app.pending().is_some() {
      app.run_pending().await;
      continue;
    }

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event
      && key.kind == KeyEventKind::Press
      && !app.handle_key(key)
    {
      break;
    }
  }

  Ok(())
}
