//! Read-side facade consumed by the listing server and the CLI.

use std::sync::Arc;

use serde::Serialize;

use crate::normalize::normalize;
use crate::store::PackageStore;
use crate::types::{CrawlState, PackageRecord};
use crate::{AppError, AppResult};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// One page of packages, as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagePage {
    pub packages: Vec<PackageRecord>,
    pub limit: u32,
    pub offset: u64,
    pub search: Option<String>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub packages: u64,
    #[serde(flatten)]
    pub crawl: CrawlState,
}

#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<dyn PackageStore>,
}

struct PageBounds {
    limit: u32,
    offset: u64,
    filter: Option<String>,
}

fn validate(limit: i64, offset: i64, name_filter: Option<&str>) -> AppResult<PageBounds> {
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {limit}"
        )));
    }
    if offset < 0 {
        return Err(AppError::BadRequest(format!(
            "offset must not be negative, got {offset}"
        )));
    }

    let filter = name_filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(normalize);

    Ok(PageBounds {
        limit: u32::try_from(limit).unwrap_or(1),
        offset: u64::try_from(offset).unwrap_or_default(),
        filter,
    })
}

impl QueryFacade {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self { store }
    }

    /// Packages ordered by name. `name_filter` selects packages that depend
    /// on that name; it is normalized first and ignored when blank.
    ///
    /// # Errors
    ///
    /// `BadRequest` when `limit` is outside `1..=100` or `offset` is negative.
    pub fn get_packages(
        &self,
        limit: i64,
        offset: i64,
        name_filter: Option<&str>,
    ) -> AppResult<Vec<PackageRecord>> {
        let bounds = validate(limit, offset, name_filter)?;
        self.store
            .query(bounds.limit, bounds.offset, bounds.filter.as_deref())
    }

    /// Same as [`get_packages`](Self::get_packages) plus the total match count.
    pub fn page(&self, limit: i64, offset: i64, name_filter: Option<&str>) -> AppResult<PackagePage> {
        let bounds = validate(limit, offset, name_filter)?;
        let packages = self
            .store
            .query(bounds.limit, bounds.offset, bounds.filter.as_deref())?;
        let total = self.store.count(bounds.filter.as_deref())?;
        Ok(PackagePage {
            packages,
            limit: bounds.limit,
            offset: bounds.offset,
            search: bounds.filter,
            total,
        })
    }

    pub fn status(&self) -> AppResult<StoreStatus> {
        Ok(StoreStatus {
            packages: self.store.count(None)?,
            crawl: self.store.crawl_state()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn facade() -> QueryFacade {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        for (name, deps) in [
            ("flask", vec!["click", "werkzeug"]),
            ("requests", vec!["certifi", "urllib3"]),
            ("httpie", vec!["requests", "requests-toolbelt"]),
            ("twine", vec!["requests", "rich"]),
        ] {
            store
                .upsert(&PackageRecord {
                    name: name.to_string(),
                    last_serial: 1,
                    dependencies: deps.into_iter().map(String::from).collect(),
                })
                .unwrap();
        }
        QueryFacade::new(Arc::new(store))
    }

    #[test]
    fn test_limit_bounds() {
        let facade = facade();
        assert!(matches!(
            facade.get_packages(0, 0, None),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            facade.get_packages(101, 0, None),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(facade.get_packages(1, 0, None).unwrap().len(), 1);
        assert_eq!(facade.get_packages(100, 0, None).unwrap().len(), 4);
    }

    #[test]
    fn test_negative_offset_rejected() {
        let facade = facade();
        assert!(matches!(
            facade.get_packages(10, -1, None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_filter_is_normalized_and_exact() {
        let facade = facade();
        let names: Vec<String> = facade
            .get_packages(10, 0, Some(" Requests "))
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["httpie", "twine"]);
    }

    #[test]
    fn test_blank_filter_is_ignored() {
        let facade = facade();
        assert_eq!(facade.get_packages(10, 0, Some("")).unwrap().len(), 4);
        assert_eq!(facade.get_packages(10, 0, Some("   ")).unwrap().len(), 4);
    }

    #[test]
    fn test_page_reports_total() {
        let facade = facade();
        let page = facade.page(1, 1, Some("requests")).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.packages.len(), 1);
        assert_eq!(page.packages[0].name, "twine");
        assert_eq!(page.search.as_deref(), Some("requests"));
    }

    #[test]
    fn test_status_counts_packages() {
        let status = facade().status().unwrap();
        assert_eq!(status.packages, 4);
        assert_eq!(status.crawl.catalog_serial, None);
    }
}
