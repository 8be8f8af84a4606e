//! Hooks the crawler calls as it works. Nothing in the crawler depends on
//! what an observer does with them.

use tracing::{debug, trace};

use crate::error::AppError;
use crate::types::PackageRecord;

pub trait CrawlObserver: Send + Sync {
    /// An HTTP attempt against the index is about to be sent.
    fn on_request(&self, _url: &str, _attempt: u32) {}

    /// A package was skipped because fetching it failed.
    fn on_error(&self, _package: &str, _error: &AppError) {}

    /// A record was written to the store.
    fn on_upsert(&self, _record: &PackageRecord) {}
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CrawlObserver for NoopObserver {}

/// Forwards requests and upserts to `tracing`. Failures are already logged
/// by the pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn on_request(&self, url: &str, attempt: u32) {
        trace!(url = %url, attempt, "Index request");
    }

    fn on_upsert(&self, record: &PackageRecord) {
        debug!(
            package = %record.name,
            serial = record.last_serial,
            dependencies = record.dependencies.len(),
            "Stored package"
        );
    }
}
