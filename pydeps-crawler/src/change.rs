//! Serial-based change detection.

use std::sync::Arc;

use crate::normalize::normalize;
use crate::store::PackageStore;
use crate::AppResult;

/// Decides whether a catalog entry needs a detail fetch.
#[derive(Clone)]
pub struct ChangeDetector {
    store: Arc<dyn PackageStore>,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self { store }
    }

    /// True iff a record exists for `name` and its stored serial is at least
    /// `remote_serial`. The name is normalized before lookup, so raw catalog
    /// names match their canonical stored key.
    pub fn is_up_to_date(&self, name: &str, remote_serial: i64) -> AppResult<bool> {
        let stored = self.store.last_serial(&normalize(name))?;
        Ok(stored.is_some_and(|serial| serial >= remote_serial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::PackageRecord;

    fn detector_with(records: &[(&str, i64)]) -> ChangeDetector {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        for (name, serial) in records {
            store
                .upsert(&PackageRecord {
                    name: name.to_string(),
                    last_serial: *serial,
                    dependencies: Vec::new(),
                })
                .unwrap();
        }
        ChangeDetector::new(Arc::new(store))
    }

    #[test]
    fn test_missing_record_is_never_up_to_date() {
        let detector = detector_with(&[]);
        assert!(!detector.is_up_to_date("anything", 0).unwrap());
        assert!(!detector.is_up_to_date("anything", i64::MIN).unwrap());
        assert!(!detector.is_up_to_date("anything", 1_000_000).unwrap());
    }

    #[test]
    fn test_equal_serial_is_up_to_date() {
        let detector = detector_with(&[("pkg", 5)]);
        assert!(detector.is_up_to_date("pkg", 5).unwrap());
        assert!(detector.is_up_to_date("pkg", 4).unwrap());
        assert!(!detector.is_up_to_date("pkg", 6).unwrap());
    }

    #[test]
    fn test_raw_catalog_name_matches_canonical_key() {
        let detector = detector_with(&[("zope-interface", 10)]);
        assert!(detector.is_up_to_date("Zope.Interface", 10).unwrap());
        assert!(!detector.is_up_to_date("zope_interface", 11).unwrap());
    }
}
