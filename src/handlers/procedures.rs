//! Transactional operations over HTTP. Each POST maps its body onto one procedure.

use crate::error::AppError;
use crate::extractors::ApiJson;
use crate::response::ok;
use crate::service::procedures::{
    ApplyStatusEffectRequest, CreateBossRequest, CreateEnemyRequest, CreateQuestRequest, PopulateLocationRequest,
    TransferItemRequest,
};
use crate::service::ProcedureService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

pub async fn create_enemy(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateEnemyRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(ProcedureService::create_enemy_with_character(&state.pool, &req).await?))
}

pub async fn create_boss(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateBossRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(ProcedureService::create_boss_with_character(&state.pool, &req).await?))
}

pub async fn create_quest(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateQuestRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(ProcedureService::create_side_quest_with_characters(&state.pool, &req).await?))
}

pub async fn apply_status_effect(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ApplyStatusEffectRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(ProcedureService::apply_status_effect_to_character(&state.pool, &req).await?))
}

pub async fn populate_location(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PopulateLocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(ProcedureService::populate_location_with_blocks(&state.pool, &req).await?))
}

pub async fn transfer_item(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TransferItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(ProcedureService::transfer_item_between_blocks(&state.pool, &req).await?))
}

pub async fn chapter_info(
    State(state): State<AppState>,
    Path(chapter_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let chapter_id = parse_int_id(&chapter_id)?;
    Ok(ok(ProcedureService::get_chapter_complete_info(&state.pool, chapter_id).await?))
}

pub(crate) fn parse_int_id(raw: &str) -> Result<i32, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", raw)))
}
