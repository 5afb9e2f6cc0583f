//! Daily entries and month summaries.
//!
//! The UI edits an [`EntryDraft`] freely; nothing reaches the store until the
//! draft is turned into an [`EntryPatch`] at an explicit save. What comes back
//! from the store is a [`DailyEntry`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::goal::{GoalKey, PerGoal};

pub const DEFAULT_RATING: u8 = 3;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

// ─── Draft ───────────────────────────────────────────────────────────────────

/// The in-memory, unsaved state of one day's entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
  pub date:   NaiveDate,
  pub rating: PerGoal<u8>,
  pub notes:  PerGoal<String>,
}

impl EntryDraft {
  /// Rating 3 for every goal, empty notes.
  pub fn new(date: NaiveDate) -> Self {
    Self {
      date,
      rating: PerGoal::splat(DEFAULT_RATING),
      notes: PerGoal::default(),
    }
  }

  /// Set a rating, kept within the range the rating control offers.
  pub fn set_rating(&mut self, key: GoalKey, rating: u8) {
    self.rating[key] = rating.clamp(MIN_RATING, MAX_RATING);
  }

  /// Move a rating one step up or down.
  pub fn step_rating(&mut self, key: GoalKey, up: bool) {
    let current = self.rating[key];
    let next = if up { current.saturating_add(1) } else { current.saturating_sub(1) };
    self.set_rating(key, next);
  }

  pub fn note_mut(&mut self, key: GoalKey) -> &mut String { &mut self.notes[key] }

  /// A full merge write of this draft.
  pub fn to_patch(&self) -> EntryPatch {
    EntryPatch {
      date:   self.date,
      rating: Some(self.rating),
      notes:  Some(self.notes.clone()),
    }
  }
}

// ─── Committed ───────────────────────────────────────────────────────────────

/// A stored daily entry. One per (user, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
  pub date:       NaiveDate,
  pub rating:     PerGoal<u8>,
  pub notes:      PerGoal<String>,
  pub updated_at: Option<DateTime<Utc>>,
}

impl DailyEntry {
  pub fn into_draft(self) -> EntryDraft {
    EntryDraft { date: self.date, rating: self.rating, notes: self.notes }
  }
}

/// A merge write for a daily entry. `None` fields are left out of the write
/// and keep whatever the stored document already holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPatch {
  pub date:   NaiveDate,
  pub rating: Option<PerGoal<u8>>,
  pub notes:  Option<PerGoal<String>>,
}

impl EntryPatch {
  /// A patch touching only the notes.
  pub fn notes(date: NaiveDate, notes: PerGoal<String>) -> Self {
    Self { date, rating: None, notes: Some(notes) }
  }
}

// ─── Month summary ───────────────────────────────────────────────────────────

/// Percentage (0–100) per goal for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthSummary {
  pub percent: PerGoal<u32>,
}

impl MonthSummary {
  pub fn zeroed() -> Self { Self::default() }
}
