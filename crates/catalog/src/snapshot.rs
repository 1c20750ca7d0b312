use std::path::Path;

use core_serialization::{CatalogSnapshot, SnapshotHeader};
use core_types::config::SnapshotValidation;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::source::{parse_listings, read_source};
use crate::{CatalogError, CatalogSource, ListingCatalog, LoadOrigin};

/// Hex SHA-256 of the source bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub(crate) fn load_with_cache(source: &CatalogSource) -> Result<ListingCatalog, CatalogError> {
    let Some(snapshot_path) = source.snapshot_path.as_deref() else {
        return ListingCatalog::load_csv(&source.csv_path);
    };

    match source.validation {
        SnapshotValidation::Trust => {
            // Existence alone is enough: no comparison against the source table.
            if let Some(catalog) = try_snapshot(snapshot_path, None) {
                return Ok(catalog);
            }
            let bytes = read_source(&source.csv_path)?;
            rebuild(source, snapshot_path, &bytes)
        }
        SnapshotValidation::Fingerprint => {
            let bytes = read_source(&source.csv_path)?;
            let current = fingerprint(&bytes);
            if let Some(catalog) = try_snapshot(snapshot_path, Some(&current)) {
                return Ok(catalog);
            }
            rebuild(source, snapshot_path, &bytes)
        }
    }
}

/// Reparse the source unconditionally and overwrite the snapshot.
pub(crate) fn refresh(source: &CatalogSource) -> Result<ListingCatalog, CatalogError> {
    let Some(snapshot_path) = source.snapshot_path.as_deref() else {
        return ListingCatalog::load_csv(&source.csv_path);
    };
    let bytes = read_source(&source.csv_path)?;
    rebuild(source, snapshot_path, &bytes)
}

/// Read the snapshot; any failure falls back to the source since the snapshot is only a cache.
fn try_snapshot(path: &Path, expected_fingerprint: Option<&str>) -> Option<ListingCatalog> {
    if !path.exists() {
        return None;
    }
    let snap = match CatalogSnapshot::read_from_path(path) {
        Ok(snap) => snap,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable catalog snapshot");
            return None;
        }
    };

    if let Some(expected) = expected_fingerprint
        && snap.header.fingerprint.as_deref() != Some(expected)
    {
        info!(path = %path.display(), "catalog snapshot is stale; reparsing source");
        return None;
    }

    match ListingCatalog::from_records(snap.records) {
        Ok(mut catalog) => {
            catalog.origin = LoadOrigin::Snapshot;
            info!(path = %path.display(), listings = catalog.len(), "loaded listings from snapshot");
            Some(catalog)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring inconsistent catalog snapshot");
            None
        }
    }
}

fn rebuild(
    source: &CatalogSource,
    snapshot_path: &Path,
    bytes: &[u8],
) -> Result<ListingCatalog, CatalogError> {
    let mut catalog = ListingCatalog::from_records(parse_listings(bytes)?)?;
    let header = SnapshotHeader::new(
        source.csv_path.to_string_lossy(),
        Some(fingerprint(bytes)),
    );
    let snapshot_written = match catalog.to_snapshot(header).write_to_path(snapshot_path) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %snapshot_path.display(), error = %err, "failed to write catalog snapshot");
            false
        }
    };
    catalog.origin = LoadOrigin::Source { snapshot_written };
    info!(
        source = %source.csv_path.display(),
        listings = catalog.len(),
        snapshot_written,
        "loaded listings from source"
    );
    Ok(catalog)
}
