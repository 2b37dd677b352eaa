//! Storage layer for pattern statistics.
//!
//! The engine talks to storage only through [`PatternStore`]. Keys arrive
//! typed and are flattened to `(family, value)` here, at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::features::{Family, FeatureKey};
use crate::engine::round::Outcome;
use crate::error::Result;

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Reliability counters for one feature key.
///
/// `total == wins_small + wins_big` holds for every row written by the
/// learning update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternStat {
    pub total: u64,
    /// Label A observations.
    pub wins_small: u64,
    /// Label B observations.
    pub wins_big: u64,
    pub weight: f64,
    pub power: f64,
    pub last_update: DateTime<Utc>,
}

impl PatternStat {
    /// A row created by its first observation.
    #[must_use]
    pub fn first(outcome: Outcome, now: DateTime<Utc>) -> Self {
        let (wins_small, wins_big) = match outcome {
            Outcome::Small => (1, 0),
            Outcome::Big => (0, 1),
        };
        Self {
            total: 1,
            wins_small,
            wins_big,
            weight: 1.0,
            power: 1.0,
            last_update: now,
        }
    }

    #[must_use]
    pub const fn wins(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Small => self.wins_small,
            Outcome::Big => self.wins_big,
        }
    }

    /// Share of observations that ended with `outcome`; zero for an empty row.
    #[must_use]
    pub fn rate(&self, outcome: Outcome) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.wins(outcome) as f64 / self.total as f64
    }

    /// Whether `outcome` is at least tied for the majority of this row.
    #[must_use]
    pub const fn agrees_with(&self, outcome: Outcome) -> bool {
        match outcome {
            Outcome::Big => self.wins_big >= self.wins_small,
            Outcome::Small => self.wins_small >= self.wins_big,
        }
    }

    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.total == self.wins_small + self.wins_big
    }
}

/// A stored row with its flattened key, as listed by `dpe stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPattern {
    pub family: String,
    pub value: String,
    #[serde(flatten)]
    pub stat: PatternStat,
}

/// Keyed counter storage consumed by the engine.
///
/// Each call is one logical unit. `upsert` must be atomic per key: concurrent
/// upserts on the same key may not lose updates. Nothing is promised across
/// keys.
pub trait PatternStore: Send + Sync {
    /// `Ok(None)` when no row exists for `key`.
    fn fetch(&self, key: &FeatureKey) -> Result<Option<PatternStat>>;

    /// Read-modify-write of a single row. Returns the row as written.
    fn upsert(
        &self,
        key: &FeatureKey,
        update: &mut dyn FnMut(Option<PatternStat>) -> PatternStat,
    ) -> Result<PatternStat>;

    /// Rows ordered by family then value, optionally limited to one family.
    fn list(&self, family: Option<Family>) -> Result<Vec<StoredPattern>>;

    /// Remove every row. Returns the number removed.
    fn clear(&self) -> Result<usize>;

    /// Cheap liveness check.
    fn ping(&self) -> Result<()> {
        Ok(())
    }
}
