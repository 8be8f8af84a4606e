//! Shared data types: the persisted [`PackageRecord`] and the transient wire
//! shapes returned by the package index.

use serde::{Deserialize, Serialize};

use crate::normalize::{normalize, normalize_dependencies};

/// Canonical package name and the dependencies it declares, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub last_serial: i64,
    pub dependencies: Vec<String>,
}

impl PackageRecord {
    /// Build the record for a fetched detail document. The name and every
    /// dependency are normalized; dependencies are sorted and unique.
    pub fn from_detail(detail: &PackageDetail) -> Self {
        Self {
            name: normalize(&detail.info.name),
            last_serial: detail.last_serial,
            dependencies: normalize_dependencies(detail.requires_dist()),
        }
    }
}

/// One project as reported by the bulk listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(rename = "_last-serial")]
    pub last_serial: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogMeta {
    #[serde(rename = "api-version")]
    pub api_version: String,
    #[serde(rename = "_last-serial")]
    pub last_serial: i64,
}

/// The full project listing from `GET /simple/` (PEP 691 JSON form).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Catalog {
    pub meta: CatalogMeta,
    pub projects: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    #[serde(default)]
    pub requires_dist: Option<Vec<String>>,
}

/// Per-project metadata from `GET /pypi/{name}/json`. Only the fields the
/// crawler needs are modelled; everything else in the document is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageDetail {
    pub info: PackageInfo,
    pub last_serial: i64,
}

impl PackageDetail {
    pub fn requires_dist(&self) -> &[String] {
        self.info.requires_dist.as_deref().unwrap_or_default()
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub catalog_serial: i64,
    pub listed: usize,
    pub up_to_date: usize,
    pub fetched: usize,
    pub upserted: usize,
    /// Fetched, but the store already held a newer serial.
    pub stale: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Not attempted because the run deadline elapsed.
    pub deferred: usize,
}

/// Crawl bookkeeping kept next to the package table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlState {
    pub catalog_serial: Option<i64>,
    pub last_run_started_at: Option<String>,
    pub last_run_finished_at: Option<String>,
}
