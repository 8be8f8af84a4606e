use askama::Template;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Html,
};
use serde::Deserialize;
use tracing::error;
use url::form_urlencoded::byte_serialize;

use crate::query::{PackagePage, DEFAULT_LIMIT};
use crate::{AppError, AppResult, AppState};

/// Number of page buttons shown under the table.
const PAGES_TO_DISPLAY: u64 = 9;

#[derive(Debug, Deserialize)]
pub struct ListingParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub search: Option<String>,
}

impl ListingParams {
    /// Unwrap the query extractor, reporting undecodable values such as
    /// `limit=abc` as validation errors rather than axum's plain-text reply.
    pub fn from_query(query: Result<Query<Self>, QueryRejection>) -> AppResult<Self> {
        query
            .map(|Query(params)| params)
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
    }

    /// Fetch the requested page, applying the default limit and offset.
    pub async fn fetch(self, state: &AppState) -> AppResult<PackagePage> {
        state
            .read(move |facade| {
                facade.page(
                    self.limit.unwrap_or(DEFAULT_LIMIT),
                    self.offset.unwrap_or(0),
                    self.search.as_deref(),
                )
            })
            .await
    }
}

#[derive(Template)]
#[template(path = "packages.html")]
struct PackagesTemplate {
    search: String,
    total: u64,
    rows: Vec<PackageRow>,
    pages: Vec<PageLink>,
    version: String,
}

struct PackageRow {
    name: String,
    href: String,
    dependencies: Vec<DependencyLink>,
}

struct DependencyLink {
    name: String,
    href: String,
}

struct PageLink {
    number: u64,
    href: String,
    current: bool,
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

fn search_href(name: &str) -> String {
    format!("/?search={}", encode(name))
}

/// Page buttons centred on the current page: up to four before it, and
/// `PAGES_TO_DISPLAY` in total. Pages past the last result are still shown.
fn page_links(page: &PackagePage) -> Vec<PageLink> {
    let limit = u64::from(page.limit.max(1));
    let current = page.offset / limit + 1;
    let first = current.saturating_sub(PAGES_TO_DISPLAY / 2).max(1);
    let search = page
        .search
        .as_deref()
        .map(|s| format!("&search={}", encode(s)))
        .unwrap_or_default();

    (first..first + PAGES_TO_DISPLAY)
        .map(|number| PageLink {
            number,
            href: format!("/?limit={}&offset={}{}", limit, (number - 1) * limit, search),
            current: number == current,
        })
        .collect()
}

fn render_listing(page: PackagePage) -> AppResult<String> {
    let pages = page_links(&page);
    let rows = page
        .packages
        .into_iter()
        .map(|record| PackageRow {
            href: search_href(&record.name),
            dependencies: record
                .dependencies
                .into_iter()
                .map(|dep| DependencyLink {
                    href: search_href(&dep),
                    name: dep,
                })
                .collect(),
            name: record.name,
        })
        .collect();

    let template = PackagesTemplate {
        search: page.search.unwrap_or_default(),
        total: page.total,
        rows,
        pages,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    template.render().map_err(|e| {
        error!("Template render error: {}", e);
        AppError::Anyhow(anyhow::anyhow!("Template render error: {}", e))
    })
}

/// Render the package table with its search form and page buttons.
pub async fn packages_page(
    State(state): State<AppState>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> AppResult<Html<String>> {
    let page = ListingParams::from_query(params)?.fetch(&state).await?;
    Ok(Html(render_listing(page)?))
}
