use std::sync::Arc;
use std::time::{Duration, Instant};

use catalog::ListingCatalog;
use core_types::{GalleryEntry, ListingId, PreferenceQuery, SearchHit, SessionKey};
use semantic_index::{EmbeddingIndex, IndexError, Neighbor};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::assets::AssetResolver;
use crate::error::SearchError;
use crate::metrics::ServiceMetrics;
use crate::query_builder;
use crate::session::SessionStore;

pub const DEFAULT_FANOUT: usize = 5;
pub const DEFAULT_INDEX_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of one committed search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub session: SessionKey,
    pub sequence: u64,
    /// What the gallery renders; a single sentinel when no hit survived.
    pub entries: Vec<GalleryEntry>,
    /// Surviving hits, in the same order as the session ids.
    pub hits: Vec<SearchHit>,
    /// Index ids that had no catalog record.
    pub dropped: Vec<ListingId>,
}

/// Query builder → embedding index → asset resolver + catalog → session.
#[derive(Clone)]
pub struct SearchOrchestrator {
    catalog: Arc<ListingCatalog>,
    index: Arc<dyn EmbeddingIndex>,
    assets: AssetResolver,
    sessions: SessionStore,
    fanout: usize,
    index_timeout: Duration,
    metrics: Option<ServiceMetrics>,
}

impl SearchOrchestrator {
    pub fn new(
        catalog: Arc<ListingCatalog>,
        index: Arc<dyn EmbeddingIndex>,
        assets: AssetResolver,
        sessions: SessionStore,
    ) -> Self {
        Self {
            catalog,
            index,
            assets,
            sessions,
            fanout: DEFAULT_FANOUT,
            index_timeout: DEFAULT_INDEX_TIMEOUT,
            metrics: None,
        }
    }

    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout.max(1);
        self
    }

    pub const fn with_index_timeout(mut self, timeout: Duration) -> Self {
        self.index_timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub const fn fanout(&self) -> usize {
        self.fanout
    }

    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Run a search for `session` and commit its ids as that session's selection state.
    pub async fn search(
        &self,
        session: SessionKey,
        prefs: &PreferenceQuery,
    ) -> Result<SearchOutcome, SearchError> {
        let query = query_builder::build_from(prefs);
        let span = info_span!("search", session = %session, query = %query);
        self.run(session, query.as_str().to_string())
            .instrument(span)
            .await
    }

    /// Like [`Self::search`] but never fails: errors become sentinel entries.
    pub async fn search_for_display(
        &self,
        session: SessionKey,
        prefs: &PreferenceQuery,
    ) -> Vec<GalleryEntry> {
        match self.search(session, prefs).await {
            Ok(outcome) => outcome.entries,
            Err(err) => {
                warn!(session = %session, error = %err, "search failed");
                vec![GalleryEntry::Unavailable]
            }
        }
    }

    async fn run(&self, session: SessionKey, query: String) -> Result<SearchOutcome, SearchError> {
        let started = Instant::now();
        let evicted = self.sessions.evict_idle();
        if evicted > 0 {
            debug!(evicted, "swept idle sessions before search");
        }
        let ticket = self.sessions.begin(session);

        let neighbors = match self.query_index(query).await {
            Ok(n) => n,
            Err(err) => {
                // Leave the session empty so a stale selection cannot hit old results.
                self.sessions.commit(ticket, Vec::new());
                if let Some(m) = &self.metrics {
                    m.unavailable_total.inc();
                }
                return Err(err);
            }
        };

        let mut hits = Vec::with_capacity(neighbors.len().min(self.fanout));
        let mut dropped = Vec::new();
        for neighbor in neighbors.into_iter().take(self.fanout) {
            if !self.catalog.contains(&neighbor.id) {
                warn!(
                    kind = "data_integrity",
                    listing_id = %neighbor.id,
                    score = neighbor.score,
                    "index returned a listing missing from the catalog; dropping hit"
                );
                dropped.push(neighbor.id);
                continue;
            }
            let asset = self.assets.resolve(&neighbor.id);
            hits.push(SearchHit {
                listing_id: neighbor.id,
                score: neighbor.score,
                asset,
            });
        }

        let ids: Vec<ListingId> = hits.iter().map(|h| h.listing_id.clone()).collect();
        if !self.sessions.commit(ticket, ids) {
            if let Some(m) = &self.metrics {
                m.superseded_total.inc();
            }
            debug!(sequence = ticket.sequence, "discarding superseded search result");
            return Err(SearchError::Superseded {
                sequence: ticket.sequence,
            });
        }

        let entries = if hits.is_empty() {
            vec![GalleryEntry::NoResults]
        } else {
            hits.iter()
                .map(|h| GalleryEntry::listing(h.listing_id.clone(), h.asset.clone()))
                .collect()
        };

        if let Some(m) = &self.metrics {
            m.observe_search(started.elapsed());
            m.dropped_hits_total.inc_by(dropped.len() as u64);
            if hits.is_empty() {
                m.no_results_total.inc();
            }
            m.active_sessions.set(self.sessions.len() as i64);
        }
        info!(
            hits = hits.len(),
            dropped = dropped.len(),
            sequence = ticket.sequence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search completed"
        );

        Ok(SearchOutcome {
            session,
            sequence: ticket.sequence,
            entries,
            hits,
            dropped,
        })
    }

    /// Blocking k-NN call on the blocking pool, bounded by the index timeout. No retry.
    async fn query_index(&self, query: String) -> Result<Vec<Neighbor>, SearchError> {
        let index = Arc::clone(&self.index);
        let k = self.fanout;
        let task = tokio::task::spawn_blocking(move || index.query(&query, k));
        match tokio::time::timeout(self.index_timeout, task).await {
            Ok(Ok(Ok(neighbors))) => Ok(neighbors),
            Ok(Ok(Err(err))) => Err(unavailable(&err)),
            Ok(Err(join_err)) => Err(SearchError::ServiceUnavailable(format!(
                "index task failed: {join_err}"
            ))),
            Err(_) => Err(SearchError::ServiceUnavailable(format!(
                "index did not answer within {} ms",
                self.index_timeout.as_millis()
            ))),
        }
    }
}

fn unavailable(err: &IndexError) -> SearchError {
    SearchError::ServiceUnavailable(err.to_string())
}
