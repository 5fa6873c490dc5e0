//! Multi-join read queries.

use crate::error::AppError;
use crate::handlers::procedures::parse_int_id;
use crate::response::ok;
use crate::service::QueryService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

pub async fn enemies_with_details(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(QueryService::enemies_with_details(&state.pool).await?))
}

pub async fn bosses_with_details(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(QueryService::bosses_with_details(&state.pool).await?))
}

pub async fn playable_characters_with_chapters(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(QueryService::playable_characters_with_chapters(&state.pool).await?))
}

pub async fn blocks_with_items_and_locations(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(QueryService::blocks_with_items_and_locations(&state.pool).await?))
}

pub async fn side_quests_full_details(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(QueryService::side_quests_full_details(&state.pool).await?))
}

pub async fn locations_with_everything(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(QueryService::locations_with_everything(&state.pool).await?))
}

pub async fn chapter_summary(
    State(state): State<AppState>,
    Path(chapter_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let chapter_id = parse_int_id(&chapter_id)?;
    Ok(ok(QueryService::chapter_summary(&state.pool, chapter_id).await?))
}
