//! In-process pattern store.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::engine::features::{Family, FeatureKey};
use crate::error::Result;
use crate::storage::{PatternStat, PatternStore, StoredPattern};

/// Map-backed store. The map lock is held for the whole transition, which
/// makes every upsert atomic per key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<(String, String), PatternStat>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a row directly, bypassing the learning update.
    pub fn seed(&self, key: &FeatureKey, stat: PatternStat) {
        self.rows
            .lock()
            .insert((key.family().as_str().to_string(), key.value()), stat);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

impl PatternStore for MemoryStore {
    fn fetch(&self, key: &FeatureKey) -> Result<Option<PatternStat>> {
        let id = (key.family().as_str().to_string(), key.value());
        Ok(self.rows.lock().get(&id).copied())
    }

    fn upsert(
        &self,
        key: &FeatureKey,
        update: &mut dyn FnMut(Option<PatternStat>) -> PatternStat,
    ) -> Result<PatternStat> {
        let id = (key.family().as_str().to_string(), key.value());
        let mut rows = self.rows.lock();
        let next = update(rows.get(&id).copied());
        rows.insert(id, next);
        Ok(next)
    }

    fn list(&self, family: Option<Family>) -> Result<Vec<StoredPattern>> {
        let rows = self.rows.lock();
        Ok(rows
            .iter()
            .filter(|((fam, _), _)| family.is_none_or(|f| f.as_str() == fam.as_str()))
            .map(|((fam, value), stat)| StoredPattern {
                family: fam.clone(),
                value: value.clone(),
                stat: *stat,
            })
            .collect())
    }

    fn clear(&self) -> Result<usize> {
        let mut rows = self.rows.lock();
        let removed = rows.len();
        rows.clear();
        Ok(removed)
    }
}
