use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::dashboard::Dashboard;
use crate::engine::{Family, FeatureKey, Prediction, RoundSummary};
use crate::error::{DpeError, Result};
use crate::storage::{MemoryStore, PatternStat, PatternStore, SqliteStore, StoredPattern};

/// Temporary directory holding a fresh SQLite store.
pub struct StoreFixture {
    pub temp_dir: TempDir,
    pub db_path: PathBuf,
    pub store: Arc<SqliteStore>,
}

impl StoreFixture {
    /// # Panics
    ///
    /// If the temp directory or the database cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("patterns.db");
        let store = Arc::new(SqliteStore::open(&db_path).expect("Failed to open store"));
        println!("[FIXTURE] Created store: {db_path:?}");
        Self {
            temp_dir,
            db_path,
            store,
        }
    }

    /// Reopen the same database file through a second connection.
    ///
    /// # Panics
    ///
    /// If the database cannot be opened.
    #[must_use]
    pub fn reopen(&self) -> SqliteStore {
        SqliteStore::open(&self.db_path).expect("Failed to reopen store")
    }
}

impl Default for StoreFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Dashboard that keeps everything it is sent.
#[derive(Default)]
pub struct RecordingDashboard {
    rounds: Mutex<Vec<RoundSummary>>,
    predictions: Mutex<Vec<Prediction>>,
}

impl RecordingDashboard {
    #[must_use]
    pub fn rounds(&self) -> Vec<RoundSummary> {
        self.rounds.lock().clone()
    }

    #[must_use]
    pub fn predictions(&self) -> Vec<Prediction> {
        self.predictions.lock().clone()
    }
}

impl Dashboard for RecordingDashboard {
    fn round(&self, summary: &RoundSummary) -> Result<()> {
        self.rounds.lock().push(*summary);
        Ok(())
    }

    fn prediction(&self, prediction: &Prediction) -> Result<()> {
        self.predictions.lock().push(*prediction);
        Ok(())
    }
}

/// Memory store that fails every call touching selected families.
pub struct FlakyStore {
    inner: MemoryStore,
    failing: BTreeSet<Family>,
}

impl FlakyStore {
    #[must_use]
    pub fn failing(families: &[Family]) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: families.iter().copied().collect(),
        }
    }

    /// Every family fails, as if the database were unreachable.
    #[must_use]
    pub fn down() -> Self {
        Self::failing(Family::all())
    }

    #[must_use]
    pub const fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self, family: Family) -> Result<()> {
        if self.failing.contains(&family) {
            return Err(DpeError::StoreUnavailable(format!("{family} rows unreachable")));
        }
        Ok(())
    }
}

impl PatternStore for FlakyStore {
    fn fetch(&self, key: &FeatureKey) -> Result<Option<PatternStat>> {
        self.check(key.family())?;
        self.inner.fetch(key)
    }

    fn upsert(
        &self,
        key: &FeatureKey,
        update: &mut dyn FnMut(Option<PatternStat>) -> PatternStat,
    ) -> Result<PatternStat> {
        self.check(key.family())?;
        self.inner.upsert(key, update)
    }

    fn list(&self, family: Option<Family>) -> Result<Vec<StoredPattern>> {
        self.inner.list(family)
    }

    fn clear(&self) -> Result<usize> {
        self.inner.clear()
    }

    fn ping(&self) -> Result<()> {
        if self.failing.len() == Family::all().len() {
            return Err(DpeError::StoreUnavailable("store down".to_string()));
        }
        Ok(())
    }
}
