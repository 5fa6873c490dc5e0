//! Routers and the assembled application.

mod common;
mod entity;
mod procedures;
mod read_models;

pub use common::common_routes;
pub use entity::entity_routes;
pub use procedures::procedure_routes;
pub use read_models::{query_routes, view_routes};

use crate::error::AppError;
use crate::settings::Settings;
use crate::state::AppState;
use axum::Router;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Every route with tracing, permissive CORS and the body size cap.
pub fn app(state: AppState, settings: &Settings) -> Router {
    Router::new()
        .merge(common_routes())
        .merge(entity_routes(&state.model.entities))
        .merge(procedure_routes())
        .merge(view_routes())
        .merge(query_routes())
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(settings.body_limit_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("Not Found".into())
}
