//! # PyPI Dependency Crawler
//!
//! Walks the PyPI catalog, records each package's declared dependencies in a
//! local SQLite database, and serves a paginated reverse-dependency view of
//! that snapshot.
//!
//! ## Key Modules
//!
//! - [`upstream`]: HTTP client for the index's listing and metadata endpoints
//! - [`retry`]: bounded retry with exponential backoff for index requests
//! - [`normalize`]: PEP 503 names and requirement-string stripping
//! - [`store`]: the package table and its SQLite implementation
//! - [`change`]: serial comparison that decides what needs fetching
//! - [`pipeline`]: one full incremental crawl
//! - [`query`]: validated, paginated reads for the UI and CLI
//! - [`server`]: the listing page and JSON endpoints
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pydeps_crawler::{Config, IndexClient, Pipeline, SqliteStore};
//!
//! # async fn crawl() -> pydeps_crawler::AppResult<()> {
//! let config = Config::default();
//! let index = Arc::new(IndexClient::new(&config.index)?);
//! let store = Arc::new(SqliteStore::open(&config.storage.database_path)?);
//! let report = Pipeline::from_config(&config.crawl, index, store).run().await?;
//! println!("{} packages updated", report.upserted);
//! # Ok(())
//! # }
//! ```

pub mod change;
pub mod config;
pub mod error;
pub mod normalize;
pub mod observer;
pub mod pipeline;
pub mod query;
pub mod retry;
pub mod server;
pub mod state;
pub mod store;
pub mod types;
pub mod ui;
pub mod upstream;

pub use change::ChangeDetector;
pub use config::Config;
pub use error::{ApiErrorResponse, AppError, AppResult, ErrorCode};
pub use normalize::{normalize, normalize_dependencies, strip_version};
pub use observer::{CrawlObserver, NoopObserver, TracingObserver};
pub use pipeline::Pipeline;
pub use query::{PackagePage, QueryFacade, StoreStatus};
pub use retry::RetryPolicy;
pub use server::{router, run_server};
pub use state::AppState;
pub use store::{PackageStore, SqliteStore, UpsertOutcome};
pub use types::{Catalog, CatalogEntry, CrawlReport, CrawlState, PackageDetail, PackageRecord};
pub use upstream::{IndexClient, PackageIndex};
