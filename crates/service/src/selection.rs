use std::sync::Arc;

use catalog::ListingCatalog;
use core_types::{ListingRecord, SelectionEvent, SessionKey};
use tracing::{error, warn};

use crate::error::SelectionError;
use crate::metrics::ServiceMetrics;
use crate::session::SessionStore;

pub const SELECTION_ERROR_PREFIX: &str = "Error retrieving description";

/// The listing behind a selected gallery position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedListing {
    pub position: usize,
    pub record: ListingRecord,
}

impl SelectedListing {
    pub fn description(&self) -> &str {
        &self.record.description
    }
}

/// Resolves "user picked result N" through the session, without re-querying the index.
#[derive(Clone)]
pub struct SelectionResolver {
    catalog: Arc<ListingCatalog>,
    sessions: SessionStore,
    metrics: Option<ServiceMetrics>,
}

impl SelectionResolver {
    pub fn new(catalog: Arc<ListingCatalog>, sessions: SessionStore) -> Self {
        Self {
            catalog,
            sessions,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Map `index` to its listing via the committed session for `session`.
    pub fn resolve(&self, session: SessionKey, index: i64) -> Result<SelectedListing, SelectionError> {
        let result = self.sessions.with_session(session, |current| -> Result<_, SelectionError> {
            let id = current.listing_at(index)?;
            let record = self
                .catalog
                .get(id)
                .ok_or_else(|| SelectionError::UnknownListing(id.clone()))?;
            Ok(SelectedListing {
                // listing_at succeeded, so index is a valid non-negative position.
                position: usize::try_from(index).unwrap_or_default(),
                record: record.clone(),
            })
        });

        match &result {
            Ok(_) => {
                if let Some(m) = &self.metrics {
                    m.selections_total.inc();
                }
            }
            Err(err) => {
                match err {
                    SelectionError::OutOfRange { .. } => {
                        warn!(session = %session, index, error = %err, "selection out of range");
                    }
                    SelectionError::UnknownListing(id) => {
                        error!(
                            session = %session,
                            listing_id = %id,
                            "selected listing missing from catalog; catalog and index have diverged"
                        );
                    }
                }
                if let Some(m) = &self.metrics {
                    m.record_selection_error(err.kind());
                }
            }
        }
        result
    }

    /// Description text for a selection event; failures become a labeled error string.
    pub fn describe(&self, session: SessionKey, event: SelectionEvent) -> String {
        match self.resolve(session, event.index) {
            Ok(selected) => selected.record.description,
            Err(err) => format!("{SELECTION_ERROR_PREFIX}: {err}"),
        }
    }
}
