//! The three tracked goals and the per-goal value container.
//!
//! Goals are static configuration: they are never persisted, only their keys
//! appear in stored documents.

use std::ops::{Index, IndexMut};

use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Identifier of a tracked goal. Serialised lowercase (`"material"`).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GoalKey {
  Material,
  Ego,
  Running,
}

impl GoalKey {
  /// All keys in display order.
  pub fn all() -> impl Iterator<Item = GoalKey> { GoalKey::iter() }

  /// The key as it appears in stored documents.
  pub fn as_str(self) -> &'static str {
    match self {
      GoalKey::Material => "material",
      GoalKey::Ego => "ego",
      GoalKey::Running => "running",
    }
  }

  /// The static catalog entry for this key.
  pub fn goal(self) -> &'static Goal {
    match self {
      GoalKey::Material => &GOALS[0],
      GoalKey::Ego => &GOALS[1],
      GoalKey::Running => &GOALS[2],
    }
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// A tracked goal: the daily prompt and the motivational strings shown with it.
#[derive(Debug)]
pub struct Goal {
  pub key:     GoalKey,
  pub title:   &'static str,
  pub prompt:  &'static str,
  pub mantras: &'static [&'static str],
}

pub const GOALS: [Goal; 3] = [
  Goal {
    key:     GoalKey::Material,
    title:   "Less Material Focus",
    prompt:  "Did I avoid unnecessary spending and value what I already have today?",
    mantras: &[
      "Use what you have. Want less. Live more.",
      "Pause before purchase: will this matter in a week?",
      "Gratitude beats upgrades.",
    ],
  },
  Goal {
    key:     GoalKey::Ego,
    title:   "Less Ego-led",
    prompt:  "Did I act with humility and kindness, prioritising truth over ego today?",
    mantras: &[
      "Choose curiosity over being right.",
      "Let actions speak louder than identity.",
      "Be soft in tone, firm in values.",
    ],
  },
  Goal {
    key:     GoalKey::Running,
    title:   "Build My Running Career",
    prompt:  "Did I take meaningful action to improve my running (training, recovery, planning) today?",
    mantras: &[
      "Consistency beats intensity.",
      "Train with patience; race with courage.",
      "Small wins compound.",
    ],
  },
];

/// Pick one mantra per goal. Called once per UI session.
pub fn pick_mantras<R: RngCore + ?Sized>(rng: &mut R) -> PerGoal<&'static str> {
  PerGoal::from_fn(|key| {
    let mantras = key.goal().mantras;
    mantras[rng.next_u32() as usize % mantras.len()]
  })
}

// ─── Per-goal container ──────────────────────────────────────────────────────

/// One value per goal, stored as `{ "material": .., "ego": .., "running": .. }`.
///
/// Keys missing from a stored object deserialise to `T::default()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct PerGoal<T> {
  pub material: T,
  pub ego:      T,
  pub running:  T,
}

impl<T> PerGoal<T> {
  pub fn from_fn(mut f: impl FnMut(GoalKey) -> T) -> Self {
    Self {
      material: f(GoalKey::Material),
      ego:      f(GoalKey::Ego),
      running:  f(GoalKey::Running),
    }
  }

  /// Same value for every goal.
  pub fn splat(value: T) -> Self
  where
    T: Clone,
  {
    Self::from_fn(|_| value.clone())
  }

  pub fn iter(&self) -> impl Iterator<Item = (GoalKey, &T)> {
    GoalKey::all().map(move |key| (key, &self[key]))
  }

  pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> PerGoal<U> {
    PerGoal {
      material: f(self.material),
      ego:      f(self.ego),
      running:  f(self.running),
    }
  }
}

impl<T> Index<GoalKey> for PerGoal<T> {
  type Output = T;

  fn index(&self, key: GoalKey) -> &T {
    match key {
      GoalKey::Material => &self.material,
      GoalKey::Ego => &self.ego,
      GoalKey::Running => &self.running,
    }
  }
}

impl<T> IndexMut<GoalKey> for PerGoal<T> {
  fn index_mut(&mut self, key: GoalKey) -> &mut T {
    match key {
      GoalKey::Material => &mut self.material,
      GoalKey::Ego => &mut self.ego,
      GoalKey::Running => &mut self.running,
    }
  }
}
