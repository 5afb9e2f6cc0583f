//! The goal form: date line, month score panel and one block per goal.

use goals_core::{
  entry::{EntryDraft, MAX_RATING},
  goal::GoalKey,
};
use ratatui::{
  Frame,
  layout::{Constraint, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::App;

pub fn draw<P, S>(f: &mut Frame, area: Rect, app: &App<P, S>) {
  let [top, goals] =
    Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(area);
  let [date, score] =
    Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(top);

  draw_date(f, date, app);
  draw_score(f, score, app);

  let Some(draft) = &app.draft else {
    f.render_widget(
      Paragraph::new("Loading…").style(Style::default().fg(Color::DarkGray)),
      goals,
    );
    return;
  };

  let rows = Layout::vertical([Constraint::Ratio(1, 3); 3]).split(goals);
  for (key, row) in GoalKey::all().zip(rows.iter()) {
    draw_goal(f, *row, app, draft, key);
  }
}

fn draw_date<P, S>(f: &mut Frame, area: Rect, app: &App<P, S>) {
  let block = Block::default()
    .title(" Date ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let line = Line::from(vec![
    Span::styled("◀ ", Style::default().fg(Color::DarkGray)),
    Span::styled(
      app.date.format("%Y-%m-%d").to_string(),
      Style::default().add_modifier(Modifier::BOLD),
    ),
    Span::styled(" ▶  ", Style::default().fg(Color::DarkGray)),
    Span::raw(app.date.format("%A").to_string()),
  ]);
  f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_score<P, S>(f: &mut Frame, area: Rect, app: &App<P, S>) {
  let block = Block::default()
    .title(format!(" {} score ", app.date.format("%B %Y")))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let spans: Vec<Span> = match &app.summary {
    Some(summary) => summary
      .percent
      .iter()
      .flat_map(|(key, pct)| {
        [
          Span::styled(format!("{key} "), Style::default().fg(Color::Cyan)),
          Span::styled(format!("{pct}%   "), Style::default().add_modifier(Modifier::BOLD)),
        ]
      })
      .collect(),
    None => vec![Span::styled("-", Style::default().fg(Color::DarkGray))],
  };
  f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_goal<P, S>(f: &mut Frame, area: Rect, app: &App<P, S>, draft: &EntryDraft, key: GoalKey) {
  let goal = key.goal();
  let focused = app.focus == key;
  let border = match (focused, app.editing) {
    (true, true) => Style::default().fg(Color::Yellow),
    (true, false) => Style::default().fg(Color::Cyan),
    _ => Style::default().fg(Color::DarkGray),
  };
  let block = Block::default()
    .title(Span::styled(
      format!(" {} ", goal.title),
      Style::default().add_modifier(Modifier::BOLD),
    ))
    .borders(Borders::ALL)
    .border_style(border);

  let rating = draft.rating[key];
  let dots: String = (1..=MAX_RATING)
    .map(|i| if i <= rating { '●' } else { '○' })
    .collect();

  let mut lines = vec![
    Line::from(Span::styled(goal.prompt, Style::default().fg(Color::Gray))),
    Line::from(Span::styled(
      app.mantras[key],
      Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC),
    )),
    Line::from(vec![
      Span::styled("Rating  ", Style::default().fg(Color::Cyan)),
      Span::styled(dots, Style::default().fg(Color::Yellow)),
      Span::raw(format!("  {rating}/{MAX_RATING}")),
    ]),
    Line::from(Span::styled("Notes", Style::default().fg(Color::Cyan))),
  ];

  let notes = &draft.notes[key];
  if notes.is_empty() && !(focused && app.editing) {
    lines.push(Line::from(Span::styled(
      "(empty, press e to write)",
      Style::default().fg(Color::DarkGray),
    )));
  } else {
    lines.extend(notes.split('\n').map(|l| Line::from(l.to_owned())));
  }

  let inner = block.inner(area);
  f.render_widget(
    Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
    area,
  );

  if focused && app.editing {
    let last = notes.rsplit('\n').next().unwrap_or_default();
    let line_count = notes.split('\n').count() as u16;
    let y = inner.y + 3 + line_count;
    let x = inner.x + (last.chars().count() as u16).min(inner.width.saturating_sub(1));
    if y < inner.y + inner.height {
      f.set_cursor_position((x, y));
    }
  }
}
