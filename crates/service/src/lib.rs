//! HomeMatch engine: query building, index orchestration, selection sessions and the stdio daemon loop.

pub mod assets;
pub mod bootstrap;
pub mod dispatcher;
pub mod error;
mod logging;
pub mod metrics;
pub mod query_builder;
pub mod search_handler;
pub mod selection;
pub mod session;
pub mod status;

pub use bootstrap::{HomeMatch, build_index, catalog_source};
pub use error::{BootstrapError, SearchError, SelectionError};
pub use logging::{init_tracing, init_tracing_with_config};
pub use metrics::ServiceMetrics;
pub use search_handler::{SearchOrchestrator, SearchOutcome};
pub use selection::{SELECTION_ERROR_PREFIX, SelectedListing, SelectionResolver};
pub use session::{SearchTicket, SelectionSession, SessionStore};
