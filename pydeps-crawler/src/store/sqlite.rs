//! SQLite-backed [`PackageStore`].
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so the listing server can read while a crawl writes
//! - `busy_timeout = 5s` to absorb short write-lock contention between processes
//! - `foreign_keys = ON` so edge rows never outlive their package row

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use super::schema::{LATEST_SCHEMA_VERSION, MIGRATIONS};
use super::{PackageStore, UpsertOutcome};
use crate::error::{AppError, AppResult};
use crate::types::{CrawlState, PackageRecord};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply connection pragmas.
    /// Tables are created by [`PackageStore::init_schema`].
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        debug!(path = %path.display(), "Opened package store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::InternalError("store connection lock poisoned".to_string()))
    }

    pub fn schema_version(&self) -> AppResult<u32> {
        let conn = self.conn()?;
        Ok(current_schema_version(&conn)?)
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply pending migrations in ascending order. Each migration's DDL uses
/// `IF NOT EXISTS`, and runs in an immediate transaction so two processes
/// initialising at once serialise instead of failing.
fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Another process may have migrated while we waited for the lock.
        let seen: i64 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if seen < i64::from(*version) {
            tx.execute_batch(sql)?;
            tx.pragma_update(None, "user_version", i64::from(*version))?;
        }
        tx.commit()?;
        current = *version;
    }

    Ok(current)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PackageRecord> {
    let dependencies: String = row.get(2)?;
    let dependencies = serde_json::from_str(&dependencies)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(PackageRecord {
        name: row.get(0)?,
        last_serial: row.get(1)?,
        dependencies,
    })
}

fn sql_offset(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

impl PackageStore for SqliteStore {
    fn init_schema(&self) -> AppResult<()> {
        let mut conn = self.conn()?;
        let version = migrate(&mut conn)?;
        debug!(version, latest = LATEST_SCHEMA_VERSION, "Store schema ready");
        Ok(())
    }

    fn get(&self, name: &str) -> AppResult<Option<PackageRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT name, last_serial, dependencies FROM packages WHERE name = ?1",
                [name],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn last_serial(&self, name: &str) -> AppResult<Option<i64>> {
        let conn = self.conn()?;
        let serial = conn
            .query_row(
                "SELECT last_serial FROM packages WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(serial)
    }

    fn upsert(&self, record: &PackageRecord) -> AppResult<UpsertOutcome> {
        let dependencies_json = serde_json::to_string(&record.dependencies)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored: Option<i64> = tx
            .query_row(
                "SELECT last_serial FROM packages WHERE name = ?1",
                [&record.name],
                |row| row.get(0),
            )
            .optional()?;
        if stored.is_some_and(|serial| serial > record.last_serial) {
            return Ok(UpsertOutcome::Stale);
        }

        tx.execute(
            "INSERT INTO packages (name, last_serial, dependencies) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                 last_serial = excluded.last_serial,
                 dependencies = excluded.dependencies",
            params![record.name, record.last_serial, dependencies_json],
        )?;
        tx.execute(
            "DELETE FROM package_dependencies WHERE package_name = ?1",
            [&record.name],
        )?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT OR IGNORE INTO package_dependencies (package_name, dependency_name)
                 VALUES (?1, ?2)",
            )?;
            for dependency in record.dependencies.iter().filter(|d| !d.is_empty()) {
                insert.execute(params![record.name, dependency])?;
            }
        }
        tx.commit()?;

        Ok(UpsertOutcome::Written)
    }

    fn query(
        &self,
        limit: u32,
        offset: u64,
        dependency_filter: Option<&str>,
    ) -> AppResult<Vec<PackageRecord>> {
        let conn = self.conn()?;
        let offset = sql_offset(offset);

        let records = match dependency_filter {
            Some(dependency) => {
                let mut stmt = conn.prepare_cached(
                    "SELECT p.name, p.last_serial, p.dependencies
                     FROM packages p
                     JOIN package_dependencies d ON d.package_name = p.name
                     WHERE d.dependency_name = ?1
                     ORDER BY p.name
                     LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt.query_map(params![dependency, limit, offset], record_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare_cached(
                    "SELECT name, last_serial, dependencies
                     FROM packages
                     ORDER BY name
                     LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt.query_map(params![limit, offset], record_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok(records)
    }

    fn count(&self, dependency_filter: Option<&str>) -> AppResult<u64> {
        let conn = self.conn()?;
        let count: i64 = match dependency_filter {
            Some(dependency) => conn.query_row(
                "SELECT COUNT(*) FROM package_dependencies WHERE dependency_name = ?1",
                [dependency],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn crawl_state(&self) -> AppResult<CrawlState> {
        let conn = self.conn()?;
        let state = conn
            .query_row(
                "SELECT catalog_serial, last_run_started_at, last_run_finished_at
                 FROM crawl_meta WHERE id = 1",
                [],
                |row| {
                    Ok(CrawlState {
                        catalog_serial: row.get(0)?,
                        last_run_started_at: row.get(1)?,
                        last_run_finished_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_default())
    }

    fn record_run_started(&self, started_at: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE crawl_meta SET last_run_started_at = ?1 WHERE id = 1",
            [started_at],
        )?;
        Ok(())
    }

    fn record_run_finished(&self, catalog_serial: i64, finished_at: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE crawl_meta SET catalog_serial = ?1, last_run_finished_at = ?2 WHERE id = 1",
            params![catalog_serial, finished_at],
        )?;
        Ok(())
    }
}
