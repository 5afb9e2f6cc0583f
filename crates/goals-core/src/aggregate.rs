//! Month aggregation: per-goal completion percentage over a calendar month.
//!
//! The summary is recomputed in full from the user's entries on every save and
//! overwrites the stored month document. It is never maintained incrementally.

use chrono::NaiveDate;
use serde_json::Value;

use crate::{
  Error, Result,
  entry::{MAX_RATING, MonthSummary},
  goal::{GoalKey, PerGoal},
  identity::UserId,
  month::Month,
  store::{CollectionPath, CollectionQuery, DocPath, Document, DocumentStore, to_document},
};

/// Percentage for `count` entries whose ratings add up to `sum`:
/// `round(100 * sum / (5 * count))`, rounding halves up, or 0 when empty.
pub fn percentage(sum: u64, count: u64) -> u32 {
  if count == 0 {
    return 0;
  }
  let denominator = u64::from(MAX_RATING) * count;
  ((200 * sum + denominator) / (2 * denominator)) as u32
}

fn entry_date(doc: &Document) -> Option<NaiveDate> {
  doc.get("date")?.as_str()?.parse().ok()
}

/// Missing or non-numeric ratings count as zero. Numeric strings such as
/// `"4"` count at their value.
fn rating_value(value: &Value) -> u64 {
  let number = match value {
    Value::String(s) => s.trim().parse::<f64>().ok(),
    other => other.as_f64(),
  };
  number.filter(|f| f.is_finite() && *f > 0.0).map(|f| f.round() as u64).unwrap_or(0)
}

/// Summarise the entries among `docs` that fall in `month`.
///
/// Documents without a readable `date` are skipped.
pub fn summarize<'a>(month: Month, docs: impl IntoIterator<Item = &'a Document>) -> MonthSummary {
  let mut count = 0u64;
  let mut sums = PerGoal::<u64>::default();

  for doc in docs {
    let Some(date) = entry_date(doc) else {
      tracing::warn!(date = ?doc.get("date"), "skipping entry without a valid date");
      continue;
    };
    if !month.contains(date) {
      continue;
    }
    count += 1;
    let rating = doc.get("rating").and_then(Value::as_object);
    for key in GoalKey::all() {
      sums[key] += rating
        .and_then(|r| r.get(key.as_str()))
        .map(rating_value)
        .unwrap_or(0);
    }
  }

  MonthSummary { percent: sums.map(|sum| percentage(sum, count)) }
}

/// Rescan all of `uid`'s entries, summarise `month`, and merge the result into
/// `users/{uid}/months/{month}`.
///
/// The scan covers the whole entries collection and filters by month here, so
/// its cost follows the user's total entry count.
pub async fn recompute_month<S: DocumentStore>(
  store: &S,
  uid: UserId,
  month: Month,
) -> Result<MonthSummary> {
  let snapshots = store
    .list(&CollectionPath::entries(uid), &CollectionQuery::ordered_by("date"))
    .await
    .map_err(Error::store)?;

  let summary = summarize(month, snapshots.iter().map(|s| &s.data));

  store
    .set_merge(&DocPath::month(uid, month), to_document(&summary)?)
    .await
    .map_err(Error::store)?;

  tracing::debug!(%uid, %month, scanned = snapshots.len(), ?summary, "month summary recomputed");
  Ok(summary)
}
