//! # Ingestion Pipeline
//!
//! One crawl: list the catalog, skip entries whose stored serial is current,
//! fetch and normalize the rest, and upsert each record on its own.
//!
//! Failure policy:
//! - the catalog listing failing aborts the run
//! - a single package failing is logged, reported to the observer and skipped;
//!   its stored record (if any) is left untouched
//! - a store failure aborts the run, since it means the database is unusable
//!
//! Every record is committed independently, so an interrupted run keeps
//! whatever it already wrote and the next run resumes from the serials.
//!
//! Per-package work runs inside a `package` span carrying the listed name, so
//! `LOG_TAGS=package:<name>` narrows the log to a single package.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::change::ChangeDetector;
use crate::config::CrawlConfig;
use crate::observer::{CrawlObserver, TracingObserver};
use crate::store::{PackageStore, UpsertOutcome};
use crate::types::{CatalogEntry, CrawlReport, PackageRecord};
use crate::upstream::PackageIndex;
use crate::AppResult;

const PROGRESS_INTERVAL: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackageOutcome {
    UpToDate,
    Upserted,
    Stale,
    NotFound,
    Failed,
    Deferred,
}

impl CrawlReport {
    fn tally(&mut self, outcome: PackageOutcome) {
        match outcome {
            PackageOutcome::UpToDate => self.up_to_date += 1,
            PackageOutcome::Upserted => {
                self.fetched += 1;
                self.upserted += 1;
            }
            PackageOutcome::Stale => {
                self.fetched += 1;
                self.stale += 1;
            }
            PackageOutcome::NotFound => self.not_found += 1,
            PackageOutcome::Failed => self.failed += 1,
            PackageOutcome::Deferred => self.deferred += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.up_to_date + self.fetched + self.not_found + self.failed + self.deferred
    }
}

pub struct Pipeline {
    index: Arc<dyn PackageIndex>,
    store: Arc<dyn PackageStore>,
    detector: ChangeDetector,
    observer: Arc<dyn CrawlObserver>,
    concurrency: usize,
    deadline: Option<Duration>,
}

impl Pipeline {
    pub fn new(index: Arc<dyn PackageIndex>, store: Arc<dyn PackageStore>) -> Self {
        let defaults = CrawlConfig::default();
        Self {
            index,
            detector: ChangeDetector::new(store.clone()),
            store,
            observer: Arc::new(TracingObserver),
            concurrency: defaults.concurrency,
            deadline: defaults.deadline(),
        }
    }

    pub fn from_config(
        config: &CrawlConfig,
        index: Arc<dyn PackageIndex>,
        store: Arc<dyn PackageStore>,
    ) -> Self {
        Self::new(index, store)
            .with_concurrency(config.concurrency)
            .with_deadline(config.deadline())
    }

    /// Maximum detail fetches in flight. Values below 1 are raised to 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run one crawl over the whole catalog.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be listed or the store rejects a write.
    /// Per-package fetch failures are counted in the report instead.
    pub async fn run(&self) -> AppResult<CrawlReport> {
        self.store.init_schema()?;
        self.store.record_run_started(&Utc::now().to_rfc3339())?;

        let catalog = self.index.list_all_packages().await?;
        let deadline = self.deadline.map(|budget| Instant::now() + budget);
        info!(
            projects = catalog.projects.len(),
            serial = catalog.meta.last_serial,
            concurrency = self.concurrency,
            "Starting crawl"
        );

        let initial = CrawlReport {
            catalog_serial: catalog.meta.last_serial,
            listed: catalog.projects.len(),
            ..CrawlReport::default()
        };

        let report = stream::iter(catalog.projects.iter())
            .map(|entry| {
                let span = info_span!("package", package = %entry.name);
                self.process(entry, deadline).instrument(span)
            })
            .buffer_unordered(self.concurrency)
            .try_fold(initial, |mut report, outcome| {
                report.tally(outcome);
                if report.processed() % PROGRESS_INTERVAL == 0 {
                    info!(
                        processed = report.processed(),
                        listed = report.listed,
                        upserted = report.upserted,
                        failed = report.failed,
                        "Crawl progress"
                    );
                }
                future::ready(Ok(report))
            })
            .await?;

        self.store
            .record_run_finished(report.catalog_serial, &Utc::now().to_rfc3339())?;

        info!(
            listed = report.listed,
            up_to_date = report.up_to_date,
            fetched = report.fetched,
            upserted = report.upserted,
            stale = report.stale,
            not_found = report.not_found,
            failed = report.failed,
            deferred = report.deferred,
            "Crawl finished"
        );
        Ok(report)
    }

    async fn process(
        &self,
        entry: &CatalogEntry,
        deadline: Option<Instant>,
    ) -> AppResult<PackageOutcome> {
        if self.detector.is_up_to_date(&entry.name, entry.last_serial)? {
            return Ok(PackageOutcome::UpToDate);
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Ok(PackageOutcome::Deferred);
        }

        let detail = match self.index.get_package_metadata(&entry.name).await {
            Ok(Some(detail)) => detail,
            Ok(None) => {
                debug!(package = %entry.name, "No detail available, skipping");
                return Ok(PackageOutcome::NotFound);
            }
            Err(e) => {
                warn!(package = %entry.name, error = %e, "Failed to fetch package detail");
                self.observer.on_error(&entry.name, &e);
                return Ok(PackageOutcome::Failed);
            }
        };

        let record = PackageRecord::from_detail(&detail);
        match self.store.upsert(&record)? {
            UpsertOutcome::Written => {
                self.observer.on_upsert(&record);
                Ok(PackageOutcome::Upserted)
            }
            UpsertOutcome::Stale => {
                debug!(package = %record.name, serial = record.last_serial, "Stored record is newer, keeping it");
                Ok(PackageOutcome::Stale)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts_fetches() {
        let mut report = CrawlReport::default();
        for outcome in [
            PackageOutcome::UpToDate,
            PackageOutcome::Upserted,
            PackageOutcome::Upserted,
            PackageOutcome::Stale,
            PackageOutcome::NotFound,
            PackageOutcome::Failed,
            PackageOutcome::Deferred,
        ] {
            report.tally(outcome);
        }
        assert_eq!(report.up_to_date, 1);
        assert_eq!(report.fetched, 3);
        assert_eq!(report.upserted, 2);
        assert_eq!(report.stale, 1);
        assert_eq!(report.not_found, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.deferred, 1);
        assert_eq!(report.processed(), 7);
    }
}
