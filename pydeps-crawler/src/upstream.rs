use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::observer::{CrawlObserver, TracingObserver};
use crate::retry::{is_retryable_status, Fetched, RetryPolicy};
use crate::types::{Catalog, PackageDetail};
use crate::{AppError, AppResult};

/// Content type for the JSON form of the simple repository API (PEP 691).
pub const SIMPLE_JSON_ACCEPT: &str = "application/vnd.pypi.simple.v1+json";

/// Content type requested from the per-project JSON API.
pub const DETAIL_JSON_ACCEPT: &str = "application/json";

/// Read access to a package index.
///
/// The pipeline only talks to the index through this trait, so tests can
/// substitute an in-memory catalog.
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Fetch the full project listing with per-project serials.
    async fn list_all_packages(&self) -> AppResult<Catalog>;

    /// Fetch one project's metadata. `Ok(None)` means the index has no usable
    /// detail for the project right now (any non-success status).
    async fn get_package_metadata(&self, name: &str) -> AppResult<Option<PackageDetail>>;
}

/// HTTP client for a PyPI-compatible index.
///
/// Both requests are plain GETs wrapped in the configured [`RetryPolicy`].
///
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use pydeps_crawler::config::IndexConfig;
/// use pydeps_crawler::upstream::{IndexClient, PackageIndex};
///
/// let client = IndexClient::new(&IndexConfig::default())?;
/// let catalog = client.list_all_packages().await?;
/// if let Some(detail) = client.get_package_metadata(&catalog.projects[0].name).await? {
///     println!("{:?}", detail.requires_dist());
/// }
/// # Ok(())
/// # }
/// ```
pub struct IndexClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    observer: Arc<dyn CrawlObserver>,
}

impl IndexClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be created.
    pub fn new(config: &IndexConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from(&config.retry),
            observer: Arc::new(TracingObserver),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn simple_index_url(&self) -> String {
        format!("{}/simple/", self.base_url)
    }

    pub fn package_json_url(&self, name: &str) -> String {
        format!("{}/pypi/{}/json", self.base_url, name)
    }

    async fn get(&self, url: &str, accept: &'static str) -> AppResult<Fetched> {
        self.retry
            .execute(
                url,
                || self.client.get(url).header(ACCEPT, accept).send(),
                |attempt| self.observer.on_request(url, attempt),
            )
            .await
    }

    fn parse_body<T: DeserializeOwned>(url: &str, fetched: &Fetched) -> AppResult<T> {
        serde_json::from_str(&fetched.body).map_err(|e| AppError::protocol(url, e))
    }
}

#[async_trait]
impl PackageIndex for IndexClient {
    async fn list_all_packages(&self) -> AppResult<Catalog> {
        let url = self.simple_index_url();
        debug!(url = %url, "Fetching package catalog");

        let fetched = self.get(&url, SIMPLE_JSON_ACCEPT).await?;
        let status = fetched.status;
        if !status.is_success() {
            let message = format!("catalog listing answered {status}");
            return Err(if is_retryable_status(status) {
                AppError::network(url, message)
            } else {
                AppError::protocol(url, message)
            });
        }

        let catalog: Catalog = Self::parse_body(&url, &fetched)?;
        info!(
            projects = catalog.projects.len(),
            serial = catalog.meta.last_serial,
            api_version = %catalog.meta.api_version,
            "Fetched package catalog"
        );
        Ok(catalog)
    }

    async fn get_package_metadata(&self, name: &str) -> AppResult<Option<PackageDetail>> {
        let url = self.package_json_url(name);

        let fetched = self.get(&url, DETAIL_JSON_ACCEPT).await?;
        let status = fetched.status;
        if !status.is_success() {
            debug!(package = %name, status = %status, "Package detail unavailable");
            return Ok(None);
        }

        Self::parse_body(&url, &fetched).map(Some)
    }
}
