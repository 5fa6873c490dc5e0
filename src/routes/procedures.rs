use crate::handlers::procedures::*;
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

/// Transactional operations under /procedures.
pub fn procedure_routes() -> Router<AppState> {
    Router::new()
        .route("/procedures/create-enemy", post(create_enemy))
        .route("/procedures/create-boss", post(create_boss))
        .route("/procedures/create-quest", post(create_quest))
        .route("/procedures/apply-status-effect", post(apply_status_effect))
        .route("/procedures/populate-location", post(populate_location))
        .route("/procedures/transfer-item", post(transfer_item))
        .route("/procedures/chapter-info/:chapter_id", get(chapter_info))
}
