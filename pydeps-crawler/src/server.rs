//! HTTP server for the dependency listing.
//!
//! Read-only: every route goes through [`QueryFacade`](crate::query::QueryFacade),
//! so the same validation applies to the HTML page and the JSON API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::query::{PackagePage, StoreStatus};
use crate::store::PackageStore;
use crate::ui::{self, ListingParams};
use crate::{AppError, AppResult, AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ui::packages_page))
        .route("/api/packages", get(packages_handler))
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

/// Serve the listing until the process is stopped. The schema is created
/// first so the page works against a database no crawl has touched yet.
pub async fn run_server(config: Config, store: Arc<dyn PackageStore>) -> Result<()> {
    store.init_schema()?;

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = AppState::new(store, Arc::new(config));
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse().map_err(|e| {
        error!(host = %host, port = %port, error = %e, "Invalid socket address");
        anyhow::anyhow!("Invalid socket address {}:{}: {}", host, port, e)
    })?;

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!(addr = %addr, error = %e, "Failed to bind to address");
        anyhow::anyhow!("Failed to bind to {}:{}: {}", host, port, e)
    })?;

    info!("Server listening on {}", addr);
    println!("✅ Serving dependency listing on http://{}:{}", host, port);

    axum::serve(listener, app).await.map_err(|e| {
        error!(error = %e, "Server error");
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}

async fn packages_handler(
    State(state): State<AppState>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> AppResult<Json<PackagePage>> {
    let page = ListingParams::from_query(params)?.fetch(&state).await?;
    Ok(Json(page))
}

async fn status_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let status: StoreStatus = state.read(|facade| facade.status()).await?;
    Ok(Json(json!({
        "status": "ok",
        "service": "pydeps",
        "version": env!("CARGO_PKG_VERSION"),
        "index": state.config.index.base_url,
        "store": status,
    })))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

async fn not_found_handler(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
