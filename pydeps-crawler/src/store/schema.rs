//! SQLite schema for the dependency snapshot.
//!
//! - `packages` holds one row per canonical name; `dependencies` is the sorted
//!   list serialized as a JSON array
//! - `package_dependencies` mirrors that list one row per edge so "who depends
//!   on X" is an index lookup instead of a scan
//! - `crawl_meta` is a single row of crawl bookkeeping

/// Migration v1: package table, dependency edge table and its reverse index.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS packages (
    name TEXT PRIMARY KEY,
    last_serial INTEGER NOT NULL,
    dependencies TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS package_dependencies (
    package_name TEXT NOT NULL REFERENCES packages(name) ON DELETE CASCADE,
    dependency_name TEXT NOT NULL CHECK (length(dependency_name) > 0),
    PRIMARY KEY (package_name, dependency_name)
);

CREATE INDEX IF NOT EXISTS idx_package_dependencies_dependency
    ON package_dependencies(dependency_name, package_name);
"#;

/// Migration v2: crawl bookkeeping.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS crawl_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    catalog_serial INTEGER,
    last_run_started_at TEXT,
    last_run_finished_at TEXT
);

INSERT OR IGNORE INTO crawl_meta (id) VALUES (1);
"#;

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

pub const MIGRATIONS: &[(u32, &str)] = &[(1, MIGRATION_V1_SQL), (2, MIGRATION_V2_SQL)];
