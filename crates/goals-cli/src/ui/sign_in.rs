//! Credential form shown while nobody is signed in.

use ratatui::{
  Frame,
  layout::{Constraint, Flex, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, Field};

/// Render the sign-in form centred in `area`.
pub fn draw<P, S>(f: &mut Frame, area: Rect, app: &App<P, S>) {
  let [column] = Layout::horizontal([Constraint::Length(60)])
    .flex(Flex::Center)
    .areas(area);
  let [title, email, password, hint] = Layout::vertical([
    Constraint::Length(2),
    Constraint::Length(3),
    Constraint::Length(3),
    Constraint::Length(2),
  ])
  .flex(Flex::Center)
  .areas(column);

  f.render_widget(
    Paragraph::new(Line::from(Span::styled(
      "Sign in to track today's goals",
      Style::default().add_modifier(Modifier::BOLD),
    ))),
    title,
  );

  let masked = "•".repeat(app.form.password.chars().count());
  draw_field(f, email, "Email", &app.form.email, app.form.field == Field::Email);
  draw_field(f, password, "Password", &masked, app.form.field == Field::Password);

  f.render_widget(
    Paragraph::new("Enter: sign in    Ctrl-N: create account")
      .style(Style::default().fg(Color::DarkGray)),
    hint,
  );
}

fn draw_field(f: &mut Frame, area: Rect, label: &str, value: &str, focused: bool) {
  let border = if focused {
    Style::default().fg(Color::Cyan)
  } else {
    Style::default().fg(Color::DarkGray)
  };
  let block = Block::default()
    .title(format!(" {label} "))
    .borders(Borders::ALL)
    .border_style(border);
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(value), inner);

  if focused {
    let x = inner.x + (value.chars().count() as u16).min(inner.width.saturating_sub(1));
    f.set_cursor_position((x, inner.y));
  }
}
