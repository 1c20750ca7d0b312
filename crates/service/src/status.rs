use ipc::StatusResponse;

use crate::bootstrap::HomeMatch;

/// Build a StatusResponse from the live engine.
pub fn make_status_response(app: &HomeMatch) -> StatusResponse {
    let health = app.health();
    StatusResponse {
        listings: app.catalog().len(),
        vectors: health.vectors,
        dimension: health.dimension,
        backend: health.backend.clone(),
        sessions: app.sessions().len(),
    }
}
