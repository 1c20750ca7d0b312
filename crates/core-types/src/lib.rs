//! Core identifiers and shared lightweight types for HomeMatch.
//!
//! These types intentionally avoid heavy dependencies and aim to be
//! serialization-friendly for bincode snapshots and IPC payloads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub mod config;

/// Listing key as it appears in the tabular source and the embedding index.
///
/// Kept as text: sources mix numeric ids with slugs and the index metadata
/// carries whatever the ingest step wrote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub String);

impl ListingId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListingId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for ListingId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// One row of the listing table. Immutable once the catalog is built.
///
/// Price, room counts and size stay opaque text ("2" vs "Studio").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: ListingId,
    pub description: String,
    pub price: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub house_size: Option<String>,
    pub neighborhood: Option<String>,
    /// Every other column, in source order.
    pub attributes: IndexMap<String, String>,
}

impl ListingRecord {
    pub fn new(id: impl Into<ListingId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            price: None,
            bedrooms: None,
            bathrooms: None,
            house_size: None,
            neighborhood: None,
            attributes: IndexMap::new(),
        }
    }

    pub fn attribute(&self, column: &str) -> Option<&str> {
        self.attributes.get(column).map(String::as_str)
    }
}

/// Structured buyer preferences collected by the presentation layer.
///
/// Transient: built per search request and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceQuery {
    pub budget: String,
    pub bedrooms: String,
    pub neighborhood: String,
    pub features: Vec<String>,
    pub property_type: String,
}

impl PreferenceQuery {
    /// Build from raw form fields where features arrive as one comma-separated string.
    pub fn from_raw(
        budget: &str,
        bedrooms: &str,
        neighborhood: &str,
        features: &str,
        property_type: &str,
    ) -> Self {
        Self {
            budget: budget.to_string(),
            bedrooms: bedrooms.to_string(),
            neighborhood: neighborhood.to_string(),
            features: split_features(features),
            property_type: property_type.to_string(),
        }
    }
}

/// Split a free-form "balcony, garden , garage" list into trimmed, non-empty items.
pub fn split_features(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical text handed to the embedding index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryText(String);

impl QueryText {
    pub fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display asset for a listing; the placeholder variant is an explicit sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetPath {
    Found(PathBuf),
    Placeholder(PathBuf),
}

impl AssetPath {
    pub fn path(&self) -> &Path {
        match self {
            Self::Found(p) | Self::Placeholder(p) => p,
        }
    }

    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// One nearest-neighbor match that survived catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub listing_id: ListingId,
    pub score: f32,
    pub asset: AssetPath,
}

pub const NO_RESULTS_ASSET: &str = "⚠️ No Listings Found";
pub const NO_RESULTS_LABEL: &str = "No properties match your criteria.";
pub const UNAVAILABLE_ASSET: &str = "⚠️ Search Unavailable";
pub const UNAVAILABLE_LABEL: &str = "The listing index is not responding. Please try again.";

/// Entry rendered by the gallery. Sentinels are variants, not magic strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GalleryEntry {
    Listing {
        listing_id: ListingId,
        asset: AssetPath,
        label: String,
    },
    NoResults,
    Unavailable,
}

impl GalleryEntry {
    pub fn listing(listing_id: ListingId, asset: AssetPath) -> Self {
        let label = format!("Listing ID: {listing_id}");
        Self::Listing {
            listing_id,
            asset,
            label,
        }
    }

    /// `(asset_path, label)` pair as the presentation layer consumes it.
    pub fn display_pair(&self) -> (String, String) {
        match self {
            Self::Listing { asset, label, .. } => {
                (asset.path().to_string_lossy().into_owned(), label.clone())
            }
            Self::NoResults => (NO_RESULTS_ASSET.into(), NO_RESULTS_LABEL.into()),
            Self::Unavailable => (UNAVAILABLE_ASSET.into(), UNAVAILABLE_LABEL.into()),
        }
    }

    pub const fn listing_id(&self) -> Option<&ListingId> {
        match self {
            Self::Listing { listing_id, .. } => Some(listing_id),
            _ => None,
        }
    }

    pub const fn is_sentinel(&self) -> bool {
        !matches!(self, Self::Listing { .. })
    }
}

/// The only selection payload the engine accepts: a 0-based result position.
///
/// Signed so that malformed negative positions from clients reach the
/// resolver and are reported as out of range instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEvent {
    pub index: i64,
}

/// Token scoping one logical search/selection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(pub Uuid);

impl SessionKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_id_trims_source_text() {
        assert_eq!(ListingId::new("  42 "), ListingId::from(42));
        assert_eq!(ListingId::from("7").to_string(), "7");
    }

    #[test]
    fn raw_features_drop_blanks() {
        let q = PreferenceQuery::from_raw("", "", "", " balcony, ,garden ,", "");
        assert_eq!(q.features, vec!["balcony", "garden"]);
    }

    #[test]
    fn sentinels_render_fixed_pairs() {
        assert_eq!(
            GalleryEntry::NoResults.display_pair(),
            (NO_RESULTS_ASSET.to_string(), NO_RESULTS_LABEL.to_string())
        );
        assert!(GalleryEntry::Unavailable.is_sentinel());
        assert!(GalleryEntry::Unavailable.listing_id().is_none());
    }

    #[test]
    fn listing_entry_uses_asset_path() {
        let entry = GalleryEntry::listing(
            ListingId::from(3),
            AssetPath::Placeholder(PathBuf::from("default_image.png")),
        );
        let (asset, label) = entry.display_pair();
        assert_eq!(asset, "default_image.png");
        assert_eq!(label, "Listing ID: 3");
        assert!(!entry.is_sentinel());
    }
}
