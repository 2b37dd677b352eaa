use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::error::{DpeError, Result};
use crate::storage::{MemoryStore, PatternStore, SqliteStore};

pub struct AppContext {
    pub root: PathBuf,
    pub config: Config,
    pub output_format: OutputFormat,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = Self::find_root()?;
        let config = Config::load(cli.config.as_deref(), &root)?;
        debug!(root = %root.display(), "resolved dpe root");

        Ok(Self {
            root,
            config,
            output_format: cli.output_format(),
        })
    }

    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.config.store_path(&self.root)
    }

    /// Open the persistent SQLite store.
    pub fn open_sqlite(&self) -> Result<Arc<SqliteStore>> {
        let path = self.store_path();
        let store = SqliteStore::open(&path).map_err(|err| {
            DpeError::StoreUnavailable(format!("open {}: {err}", path.display()))
        })?;
        Ok(Arc::new(store))
    }

    /// Open the configured store, or an in-memory one.
    pub fn open_store(&self, in_memory: bool) -> Result<Arc<dyn PatternStore>> {
        if in_memory {
            return Ok(Arc::new(MemoryStore::new()));
        }
        let store: Arc<dyn PatternStore> = self.open_sqlite()?;
        Ok(store)
    }

    fn find_root() -> Result<PathBuf> {
        if let Ok(root) = std::env::var("DPE_ROOT") {
            return Ok(PathBuf::from(root));
        }
        let cwd = std::env::current_dir()?;
        if let Some(found) = find_upwards(&cwd, ".dpe") {
            return Ok(found);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| DpeError::MissingConfig("data directory not found".to_string()))?;
        Ok(data_dir.join("dpe"))
    }
}

fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(name);
        if candidate.is_dir() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}
