//! Persistence for package records.
//!
//! The pipeline and the query facade only see the [`PackageStore`] trait.
//! [`SqliteStore`] is the implementation used by the binary.

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteStore, DEFAULT_BUSY_TIMEOUT};

use crate::error::AppResult;
use crate::types::{CrawlState, PackageRecord};

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record replaced (or created) the stored row.
    Written,
    /// The stored row has a higher serial; nothing changed.
    Stale,
}

/// Keyed table of package records.
///
/// Implementations must make each `upsert` atomic: a concurrent reader sees
/// either the previous record for that name or the new one, never a mix.
pub trait PackageStore: Send + Sync {
    /// Create tables and indexes if missing. Safe to call on every run.
    fn init_schema(&self) -> AppResult<()>;

    fn get(&self, name: &str) -> AppResult<Option<PackageRecord>>;

    fn last_serial(&self, name: &str) -> AppResult<Option<i64>> {
        Ok(self.get(name)?.map(|record| record.last_serial))
    }

    /// Insert or wholesale-replace the record keyed by `record.name`, unless
    /// the stored serial is higher.
    fn upsert(&self, record: &PackageRecord) -> AppResult<UpsertOutcome>;

    /// Records ordered by name. With `dependency_filter`, only records whose
    /// dependency list contains exactly that name.
    fn query(
        &self,
        limit: u32,
        offset: u64,
        dependency_filter: Option<&str>,
    ) -> AppResult<Vec<PackageRecord>>;

    fn count(&self, dependency_filter: Option<&str>) -> AppResult<u64>;

    fn crawl_state(&self) -> AppResult<CrawlState>;

    fn record_run_started(&self, started_at: &str) -> AppResult<()>;

    fn record_run_finished(&self, catalog_serial: i64, finished_at: &str) -> AppResult<()>;
}
