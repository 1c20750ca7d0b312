//! Startup wiring: catalog → index → orchestrator/resolver sharing one session store.
//!
//! Everything here runs before the first request. Any error is fatal
//! (`BootstrapError`) and the caller must not start serving.

use std::sync::Arc;
use std::time::Duration;

use catalog::{CatalogSource, ListingCatalog};
use core_types::config::AppConfig;
use core_types::{GalleryEntry, PreferenceQuery, SelectionEvent, SessionKey};
use semantic_index::{
    Embedder, EmbeddingIndex, FlatIndex, HashEmbedder, IndexError, IndexHealth, load_vector_file,
};
use tracing::{info, warn};

use crate::assets::AssetResolver;
use crate::error::{BootstrapError, SearchError, SelectionError};
use crate::metrics::ServiceMetrics;
use crate::search_handler::{SearchOrchestrator, SearchOutcome};
use crate::selection::{SelectedListing, SelectionResolver};
use crate::session::SessionStore;

pub fn catalog_source(cfg: &AppConfig) -> CatalogSource {
    let source = CatalogSource::csv(cfg.resolve_path(&cfg.catalog.listings_csv));
    match cfg.resolve_optional(&cfg.catalog.snapshot_path) {
        Some(path) => source.with_snapshot(path, cfg.catalog.snapshot_validation),
        None => source,
    }
}

/// Build the default index: precomputed vectors when configured, otherwise
/// hash-embedded catalog descriptions.
///
/// A vector file must name the same embedder that will embed queries;
/// vectors from any other model live in a different space.
pub fn build_index(
    cfg: &AppConfig,
    catalog: &ListingCatalog,
) -> Result<Arc<dyn EmbeddingIndex>, BootstrapError> {
    let embedder = Arc::new(HashEmbedder::new(cfg.index.dimension));
    let index = match cfg.resolve_optional(&cfg.index.vectors_path) {
        Some(path) => {
            let file = load_vector_file(&path, embedder.dimension())?;
            if file.embedder != embedder.id() {
                return Err(IndexError::EmbedderMismatch {
                    expected: embedder.id().to_string(),
                    found: file.embedder,
                }
                .into());
            }
            let records = file.records;
            let unknown = records
                .iter()
                .filter(|r| !catalog.contains(&r.listing_id()))
                .count();
            if unknown > 0 {
                warn!(
                    kind = "data_integrity",
                    unknown,
                    "vector file references listings missing from the catalog"
                );
            }
            FlatIndex::from_records(embedder, records)?
        }
        None => FlatIndex::from_texts(
            embedder,
            catalog
                .records()
                .map(|r| (r.id.clone(), r.description.as_str())),
        )?,
    };
    Ok(Arc::new(index))
}

/// The assembled engine.
#[derive(Clone)]
pub struct HomeMatch {
    catalog: Arc<ListingCatalog>,
    index: Arc<dyn EmbeddingIndex>,
    health: IndexHealth,
    sessions: SessionStore,
    orchestrator: SearchOrchestrator,
    selection: SelectionResolver,
    metrics: Option<ServiceMetrics>,
}

impl HomeMatch {
    /// Load the catalog and index described by `cfg` and wire the engine.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, BootstrapError> {
        let catalog = ListingCatalog::load(&catalog_source(cfg))?;
        info!(listings = catalog.len(), origin = ?catalog.origin(), "catalog ready");
        let index = build_index(cfg, &catalog)?;
        Self::from_parts(cfg, Arc::new(catalog), index)
    }

    /// Wire an engine around an existing catalog and index; fails fast if the index is unhealthy.
    pub fn from_parts(
        cfg: &AppConfig,
        catalog: Arc<ListingCatalog>,
        index: Arc<dyn EmbeddingIndex>,
    ) -> Result<Self, BootstrapError> {
        let health = index.health()?;
        info!(
            vectors = health.vectors,
            dimension = health.dimension,
            backend = %health.backend,
            "embedding index ready"
        );

        let metrics = if cfg.metrics.enabled {
            match ServiceMetrics::new() {
                Ok(m) => Some(m),
                Err(err) => {
                    warn!(error = %err, "metrics disabled: registry setup failed");
                    None
                }
            }
        } else {
            None
        };

        let sessions = SessionStore::new(Duration::from_secs(cfg.sessions.idle_timeout_secs));
        let assets = AssetResolver::from_config(
            &cfg.assets,
            cfg.resolve_path(&cfg.assets.images_dir),
            cfg.resolve_path(&cfg.assets.default_image),
        );

        let mut orchestrator =
            SearchOrchestrator::new(catalog.clone(), index.clone(), assets, sessions.clone())
                .with_fanout(cfg.search.fanout)
                .with_index_timeout(Duration::from_millis(cfg.index.timeout_ms.max(1)));
        let mut selection = SelectionResolver::new(catalog.clone(), sessions.clone());
        if let Some(m) = &metrics {
            orchestrator = orchestrator.with_metrics(m.clone());
            selection = selection.with_metrics(m.clone());
        }

        Ok(Self {
            catalog,
            index,
            health,
            sessions,
            orchestrator,
            selection,
            metrics,
        })
    }

    pub async fn search(
        &self,
        session: SessionKey,
        prefs: &PreferenceQuery,
    ) -> Result<SearchOutcome, SearchError> {
        self.orchestrator.search(session, prefs).await
    }

    pub async fn search_for_display(
        &self,
        session: SessionKey,
        prefs: &PreferenceQuery,
    ) -> Vec<GalleryEntry> {
        self.orchestrator.search_for_display(session, prefs).await
    }

    pub fn resolve(&self, session: SessionKey, index: i64) -> Result<SelectedListing, SelectionError> {
        self.selection.resolve(session, index)
    }

    pub fn select(&self, session: SessionKey, event: SelectionEvent) -> String {
        self.selection.describe(session, event)
    }

    pub fn end_session(&self, session: SessionKey) -> bool {
        let existed = self.sessions.end(session);
        if let Some(m) = &self.metrics {
            m.active_sessions.set(self.sessions.len() as i64);
        }
        existed
    }

    pub fn evict_idle_sessions(&self) -> usize {
        let evicted = self.sessions.evict_idle();
        if let Some(m) = &self.metrics {
            m.active_sessions.set(self.sessions.len() as i64);
        }
        evicted
    }

    pub fn catalog(&self) -> &ListingCatalog {
        &self.catalog
    }

    pub fn index(&self) -> &Arc<dyn EmbeddingIndex> {
        &self.index
    }

    pub const fn health(&self) -> &IndexHealth {
        &self.health
    }

    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub const fn metrics(&self) -> Option<&ServiceMetrics> {
        self.metrics.as_ref()
    }

    pub const fn fanout(&self) -> usize {
        self.orchestrator.fanout()
    }
}
