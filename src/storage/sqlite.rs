//! SQLite pattern store

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::engine::features::{Family, FeatureKey};
use crate::error::{DpeError, Result};
use crate::storage::migrations;
use crate::storage::{PatternStat, PatternStore, StoredPattern};

const SELECT_COLUMNS: &str = "total, win_a, win_b, weight, power, last_update";

/// Durable store backed by a single SQLite connection.
///
/// Every upsert runs in its own `IMMEDIATE` transaction, so the
/// read-modify-write of one row is atomic even across processes sharing the
/// database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    schema_version: u32,
}

impl SqliteStore {
    /// Open database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure_pragmas(&conn)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, mostly for tests and `--memory` runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            schema_version,
        })
    }

    /// Current schema version after migrations.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Number of stored rows.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM patterns", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }

    fn select(conn: &Connection, family: &str, value: &str) -> Result<Option<PatternStat>> {
        let stat = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM patterns WHERE family = ?1 AND value = ?2"),
                params![family, value],
                |row| stat_from_row(row, 0),
            )
            .optional()?;
        Ok(stat)
    }
}

impl PatternStore for SqliteStore {
    fn fetch(&self, key: &FeatureKey) -> Result<Option<PatternStat>> {
        let conn = self.conn.lock();
        Self::select(&conn, key.family().as_str(), &key.value())
    }

    fn upsert(
        &self,
        key: &FeatureKey,
        update: &mut dyn FnMut(Option<PatternStat>) -> PatternStat,
    ) -> Result<PatternStat> {
        let family = key.family().as_str();
        let value = key.value();

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = Self::select(&tx, family, &value)?;
        let next = update(current);

        tx.execute(
            "INSERT INTO patterns (family, value, total, win_a, win_b, weight, power, last_update)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(family, value) DO UPDATE SET
                total = excluded.total,
                win_a = excluded.win_a,
                win_b = excluded.win_b,
                weight = excluded.weight,
                power = excluded.power,
                last_update = excluded.last_update",
            params![
                family,
                value,
                to_sql_count(next.total),
                to_sql_count(next.wins_small),
                to_sql_count(next.wins_big),
                next.weight,
                next.power,
                next.last_update.timestamp(),
            ],
        )?;
        tx.commit()?;

        Ok(next)
    }

    fn list(&self, family: Option<Family>) -> Result<Vec<StoredPattern>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT family, value, {SELECT_COLUMNS} FROM patterns
             WHERE (?1 IS NULL OR family = ?1)
             ORDER BY family, value"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![family.map(Family::as_str)], |row| {
            Ok(StoredPattern {
                family: row.get(0)?,
                value: row.get(1)?,
                stat: stat_from_row(row, 2)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn clear(&self) -> Result<usize> {
        let removed = self.conn.lock().execute("DELETE FROM patterns", [])?;
        Ok(removed)
    }

    fn ping(&self) -> Result<()> {
        let one: i64 = self
            .conn
            .lock()
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|err| DpeError::StoreUnavailable(format!("ping failed: {err}")))?;
        if one == 1 {
            Ok(())
        } else {
            Err(DpeError::StoreUnavailable(format!("ping returned {one}")))
        }
    }
}

fn stat_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<PatternStat> {
    let last_update: i64 = row.get(offset + 5)?;
    Ok(PatternStat {
        total: from_sql_count(row.get(offset)?),
        wins_small: from_sql_count(row.get(offset + 1)?),
        wins_big: from_sql_count(row.get(offset + 2)?),
        weight: row.get(offset + 3)?,
        power: row.get(offset + 4)?,
        last_update: DateTime::<Utc>::from_timestamp(last_update, 0).unwrap_or_default(),
    })
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
