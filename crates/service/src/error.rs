use catalog::CatalogError;
use core_types::ListingId;
use semantic_index::IndexError;
use thiserror::Error;

/// Startup failures; the process must not serve requests after one of these.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("listing catalog failed to load: {0}")]
    Catalog(#[from] CatalogError),
    #[error("embedding index failed to initialize: {0}")]
    Index(#[from] IndexError),
}

/// Per-search failures, converted to a displayable sentinel at the boundary.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("embedding index unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("search {sequence} was superseded by a newer search")]
    Superseded { sequence: u64 },
}

/// Selection failures, rendered inline instead of propagated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("selection {index} is out of range for {len} result(s)")]
    OutOfRange { index: i64, len: usize },
    #[error("listing {0} is in the session but missing from the catalog")]
    UnknownListing(ListingId),
}

impl SelectionError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "out_of_range",
            Self::UnknownListing(_) => "unknown_listing",
        }
    }
}
