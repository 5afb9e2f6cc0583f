//! [`EntryStore`]: typed reads and writes of daily entries and month summaries
//! over any [`DocumentStore`].

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result, aggregate,
  entry::{DEFAULT_RATING, DailyEntry, EntryDraft, EntryPatch, MonthSummary},
  goal::PerGoal,
  identity::UserId,
  month::Month,
  store::{DocPath, DocumentStore, to_document},
};

/// Stored entry as read back. Keys missing from the document fall back to the
/// draft defaults.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
  #[serde(default)]
  rating:     PerGoal<Option<u8>>,
  #[serde(default)]
  notes:      PerGoal<Option<String>>,
  #[serde(default)]
  updated_at: Option<DateTime<Utc>>,
}

/// Body of a merge write. `None` fields are omitted so the store keeps them.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryWrite<'a> {
  date:       NaiveDate,
  #[serde(skip_serializing_if = "Option::is_none")]
  rating:     Option<&'a PerGoal<u8>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  notes:      Option<&'a PerGoal<String>>,
  updated_at: DateTime<Utc>,
}

/// The entry store adapter.
///
/// Cloning is cheap; the backend is reference-counted.
pub struct EntryStore<S> {
  store: Arc<S>,
}

impl<S> Clone for EntryStore<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: DocumentStore> EntryStore<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn backend(&self) -> &S { &self.store }

  /// The stored entry for `(uid, date)`, or `None` if there is none.
  pub async fn get_entry(&self, uid: UserId, date: NaiveDate) -> Result<Option<DailyEntry>> {
    let path = DocPath::entry(uid, date);
    let Some(doc) = self.store.get(&path).await.map_err(Error::store)? else {
      return Ok(None);
    };
    let stored: StoredEntry = serde_json::from_value(doc.into())?;
    Ok(Some(DailyEntry {
      date,
      rating: stored.rating.map(|r| r.unwrap_or(DEFAULT_RATING)),
      notes: stored.notes.map(Option::unwrap_or_default),
      updated_at: stored.updated_at,
    }))
  }

  /// The draft to show for `(uid, date)`: the stored entry, or the defaults
  /// when nothing has been saved for that day.
  pub async fn load_entry(&self, uid: UserId, date: NaiveDate) -> Result<EntryDraft> {
    Ok(
      self
        .get_entry(uid, date)
        .await?
        .map(DailyEntry::into_draft)
        .unwrap_or_else(|| EntryDraft::new(date)),
    )
  }

  /// The stored summary for `month`, zeroed when absent.
  pub async fn load_month_summary(&self, uid: UserId, month: Month) -> Result<MonthSummary> {
    let path = DocPath::month(uid, month);
    match self.store.get(&path).await.map_err(Error::store)? {
      Some(doc) => Ok(serde_json::from_value(doc.into())?),
      None => Ok(MonthSummary::zeroed()),
    }
  }

  /// Merge-upsert an entry. `updatedAt` is always set to the current time.
  pub async fn save_entry(&self, uid: UserId, patch: &EntryPatch) -> Result<DateTime<Utc>> {
    let updated_at = Utc::now();
    let write = EntryWrite {
      date: patch.date,
      rating: patch.rating.as_ref(),
      notes: patch.notes.as_ref(),
      updated_at,
    };
    self
      .store
      .set_merge(&DocPath::entry(uid, patch.date), to_document(&write)?)
      .await
      .map_err(Error::store)?;
    tracing::debug!(%uid, date = %patch.date, "entry saved");
    Ok(updated_at)
  }

  /// Save `draft`, then recompute the summary of its month.
  ///
  /// The two writes are independent: if the second fails the entry stays
  /// saved and the summary is stale until the next save in that month.
  pub async fn commit(&self, uid: UserId, draft: &EntryDraft) -> Result<MonthSummary> {
    self.save_entry(uid, &draft.to_patch()).await?;
    aggregate::recompute_month(self.store.as_ref(), uid, Month::of(draft.date)).await
  }
}
