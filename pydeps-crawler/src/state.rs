//! Shared state handed to every request handler.

use std::sync::Arc;

use crate::config::Config;
use crate::query::QueryFacade;
use crate::store::PackageStore;
use crate::{AppError, AppResult};

/// Cloned into each handler by axum; both fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub facade: QueryFacade,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn PackageStore>, config: Arc<Config>) -> Self {
        Self {
            facade: QueryFacade::new(store),
            config,
        }
    }

    /// Run a facade call on the blocking pool. SQLite calls hold a lock and do
    /// file I/O, which must stay off the async workers.
    pub async fn read<T, F>(&self, query: F) -> AppResult<T>
    where
        F: FnOnce(&QueryFacade) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let facade = self.facade.clone();
        tokio::task::spawn_blocking(move || query(&facade))
            .await
            .map_err(|e| AppError::InternalError(format!("query task failed: {e}")))?
    }
}
