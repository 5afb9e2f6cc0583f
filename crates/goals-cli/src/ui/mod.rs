//! TUI rendering entry point.

pub mod goal_form;
pub mod sign_in;

use goals_core::{identity::IdentityProvider, store::DocumentStore};
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Paragraph},
};

use crate::app::{App, Phase};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw<P, S>(f: &mut Frame, app: &App<P, S>)
where
  P: IdentityProvider,
  S: DocumentStore,
{
  let area = f.area();

  // Vertical stack: header, body, status bar.
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(area);

  draw_header(f, rows[0], app);
  match app.phase {
    Phase::Loading => draw_loading(f, rows[1]),
    Phase::Unauthenticated => sign_in::draw(f, rows[1], app),
    Phase::Authenticated => goal_form::draw(f, rows[1], app),
  }
  draw_status(f, rows[2], app);
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header<P, S>(f: &mut Frame, area: Rect, app: &App<P, S>) {
  let left = Span::styled(
    " Daily Goals",
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );
  let who = match &app.user {
    Some(user) => format!(
      "signed in as {}  ({}) ",
      user.email.as_deref().unwrap_or("(no email)"),
      user.uid
    ),
    None => String::new(),
  };
  let right = Span::styled(who, Style::default().fg(Color::Gray));

  // Simple left-right header: pad the middle.
  let left_width = left.content.chars().count() as u16;
  let right_width = right.content.chars().count() as u16;
  let pad = area
    .width
    .saturating_sub(left_width)
    .saturating_sub(right_width);

  let line = Line::from(vec![
    left,
    Span::raw(" ".repeat(pad as usize)),
    right,
  ]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_loading(f: &mut Frame, area: Rect) {
  f.render_widget(
    Paragraph::new("Checking session…").style(Style::default().fg(Color::DarkGray)),
    area,
  );
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status<P, S>(f: &mut Frame, area: Rect, app: &App<P, S>) {
  let (mode_label, hints) = match app.phase {
    Phase::Loading => ("WAIT", "q quit"),
    Phase::Unauthenticated => (
      "SIGN IN",
      "Tab switch field  Enter sign in  Ctrl-N create account  Esc quit",
    ),
    Phase::Authenticated if app.editing => (
      "NOTES",
      "Type to edit  Enter newline  Esc done  Ctrl-S save",
    ),
    Phase::Authenticated => (
      "NORMAL",
      "←→/hl day  t today  ↑↓/jk goal  1-5 rate  e notes  s save  L sign out  q quit",
    ),
  };

  let status = if app.status_msg.is_empty() {
    hints.to_string()
  } else {
    app.status_msg.clone()
  };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(
    format!("  {status}"),
    Style::default().fg(Color::Gray),
  );

  let line = Line::from(vec![mode_span, hint_span]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}
