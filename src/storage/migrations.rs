//! Schema migrations, tracked through `PRAGMA user_version`.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[
    (
        1,
        "CREATE TABLE IF NOT EXISTS patterns (
            family TEXT NOT NULL,
            value TEXT NOT NULL,
            total INTEGER NOT NULL DEFAULT 0,
            win_a INTEGER NOT NULL DEFAULT 0,
            win_b INTEGER NOT NULL DEFAULT 0,
            weight REAL NOT NULL DEFAULT 1,
            power REAL NOT NULL DEFAULT 1,
            last_update INTEGER NOT NULL,
            PRIMARY KEY (family, value)
        );",
    ),
    (
        2,
        "CREATE INDEX IF NOT EXISTS idx_patterns_family ON patterns(family);",
    ),
];

/// Apply pending migrations and return the resulting schema version.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    let current: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        tracing::debug!(version, "applying schema migration");
        conn.execute_batch(sql)?;
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(current.max(SCHEMA_VERSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(run_migrations(&conn).unwrap(), SCHEMA_VERSION);
        let version: u32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
