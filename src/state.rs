//! Shared application state for all routes.

use crate::config::{ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Resolved once at startup from the embedded catalog.
    pub model: Arc<ResolvedModel>,
}

impl AppState {
    pub fn new(pool: PgPool, model: ResolvedModel) -> Self {
        Self {
            pool,
            model: Arc::new(model),
        }
    }

    pub fn entity(&self, path_segment: &str) -> Result<&ResolvedEntity, AppError> {
        self.model
            .entity_by_path(path_segment)
            .ok_or_else(|| AppError::NotFound(format!("unknown entity '{}'", path_segment)))
    }
}
