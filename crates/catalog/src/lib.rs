//! In-memory listing catalog keyed by listing id.
//!
//! Built once at startup from the tabular source (optionally through the
//! snapshot cache) and read-only afterwards. There is no partial-catalog
//! mode: any problem with the source aborts the load.

mod snapshot;
mod source;

use ahash::AHashMap;
use core_serialization::{CatalogSnapshot, SnapshotHeader};
use core_types::config::SnapshotValidation;
use core_types::{ListingId, ListingRecord};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use snapshot::fingerprint;
pub use source::parse_listings;

/// Errors that prevent a catalog from being built. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("listing source {0} does not exist")]
    SourceMissing(PathBuf),
    #[error("malformed listing source: {0}")]
    Malformed(String),
    #[error("listing source io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("listing source csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Where to find the listing table and its optional snapshot cache.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    pub csv_path: PathBuf,
    pub snapshot_path: Option<PathBuf>,
    pub validation: SnapshotValidation,
}

impl CatalogSource {
    pub fn csv(path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: path.into(),
            snapshot_path: None,
            validation: SnapshotValidation::Trust,
        }
    }

    pub fn with_snapshot(mut self, path: impl Into<PathBuf>, validation: SnapshotValidation) -> Self {
        self.snapshot_path = Some(path.into());
        self.validation = validation;
        self
    }
}

/// How the catalog in hand was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    Snapshot,
    Source { snapshot_written: bool },
    Records,
}

#[derive(Debug)]
pub struct ListingCatalog {
    records: AHashMap<ListingId, ListingRecord>,
    order: Vec<ListingId>,
    origin: LoadOrigin,
}

impl ListingCatalog {
    /// Load the catalog, consulting the snapshot cache per `source.validation`.
    pub fn load(source: &CatalogSource) -> Result<Self, CatalogError> {
        snapshot::load_with_cache(source)
    }

    /// Ignore any existing snapshot: parse the source and write a fresh one.
    pub fn rebuild_snapshot(source: &CatalogSource) -> Result<Self, CatalogError> {
        snapshot::refresh(source)
    }

    /// Parse the CSV directly, bypassing any cache.
    pub fn load_csv(path: &Path) -> Result<Self, CatalogError> {
        let bytes = source::read_source(path)?;
        let records = parse_listings(&bytes)?;
        let mut catalog = Self::from_records(records)?;
        catalog.origin = LoadOrigin::Source {
            snapshot_written: false,
        };
        Ok(catalog)
    }

    /// Build from already-parsed records, enforcing one record per non-empty id.
    pub fn from_records(records: Vec<ListingRecord>) -> Result<Self, CatalogError> {
        let mut map = AHashMap::with_capacity(records.len());
        let mut order = Vec::with_capacity(records.len());
        for rec in records {
            if rec.id.as_str().is_empty() {
                return Err(CatalogError::Malformed(format!(
                    "row {} has an empty id",
                    order.len() + 1
                )));
            }
            if map.contains_key(&rec.id) {
                return Err(CatalogError::Malformed(format!("duplicate id {}", rec.id)));
            }
            order.push(rec.id.clone());
            map.insert(rec.id.clone(), rec);
        }
        Ok(Self {
            records: map,
            order,
            origin: LoadOrigin::Records,
        })
    }

    pub fn get(&self, id: &ListingId) -> Option<&ListingRecord> {
        self.records.get(id)
    }

    pub fn description(&self, id: &ListingId) -> Option<&str> {
        self.records.get(id).map(|r| r.description.as_str())
    }

    pub fn contains(&self, id: &ListingId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids in source order.
    pub fn ids(&self) -> &[ListingId] {
        &self.order
    }

    /// Records in source order.
    pub fn records(&self) -> impl Iterator<Item = &ListingRecord> + '_ {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub const fn origin(&self) -> LoadOrigin {
        self.origin
    }

    pub fn to_snapshot(&self, header: SnapshotHeader) -> CatalogSnapshot {
        CatalogSnapshot {
            header,
            records: self.records().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_follow_source_order() -> Result<(), CatalogError> {
        let catalog = ListingCatalog::from_records(vec![
            ListingRecord::new("3", "three"),
            ListingRecord::new("1", "one"),
        ])?;
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.description(&"1".into()), Some("one"));
        assert!(!catalog.contains(&"2".into()));
        let ids: Vec<&str> = catalog.ids().iter().map(ListingId::as_str).collect();
        assert_eq!(ids, vec!["3", "1"]);
        assert_eq!(catalog.records().count(), 2);
        assert_eq!(catalog.origin(), LoadOrigin::Records);
        Ok(())
    }

    #[test]
    fn duplicate_ids_are_malformed() {
        let err = ListingCatalog::from_records(vec![
            ListingRecord::new("1", "a"),
            ListingRecord::new("1", "b"),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::Malformed(msg) if msg.contains("duplicate id 1")));
    }

    #[test]
    fn empty_ids_are_malformed() {
        let err = ListingCatalog::from_records(vec![ListingRecord::new("  ", "a")]).unwrap_err();
        assert!(matches!(err, CatalogError::Malformed(_)));
    }
}
