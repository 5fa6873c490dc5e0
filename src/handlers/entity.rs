//! Entity CRUD handlers. The entity comes from the `EntityKey` extension set on its routes.

use crate::error::AppError;
use crate::extractors::{ApiJson, EntityKey, ListQuery};
use crate::response::{created, no_content, ok};
use crate::service::{CrudService, ListParams};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension,
};
use serde_json::Value;
use std::collections::HashMap;

fn body_to_map(value: Value) -> Result<HashMap<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m.into_iter().collect()),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(EntityKey(key)): Extension<EntityKey>,
    ListQuery(query): ListQuery,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(&key)?;
    let params = ListParams::from_query(entity, &query)?;
    let rows = CrudService::list(&state.pool, &state.model, entity, &params).await?;
    Ok(ok(rows))
}

pub async fn read(
    State(state): State<AppState>,
    Extension(EntityKey(key)): Extension<EntityKey>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(&key)?;
    let id = CrudService::parse_id(entity, &id)?;
    Ok(ok(CrudService::read(&state.pool, entity, &id).await?))
}

pub async fn related(
    State(state): State<AppState>,
    Extension(EntityKey(key)): Extension<EntityKey>,
    Path((id, relation)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(&key)?;
    let id = CrudService::parse_id(entity, &id)?;
    Ok(ok(CrudService::related(&state.pool, &state.model, entity, &id, &relation).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(EntityKey(key)): Extension<EntityKey>,
    ApiJson(body): ApiJson<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(&key)?;
    let row = CrudService::create(&state.pool, entity, body_to_map(body)?).await?;
    Ok(created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(EntityKey(key)): Extension<EntityKey>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(&key)?;
    let id = CrudService::parse_id(entity, &id)?;
    let row = CrudService::update(&state.pool, entity, &id, body_to_map(body)?).await?;
    Ok(ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(EntityKey(key)): Extension<EntityKey>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(&key)?;
    let id = CrudService::parse_id(entity, &id)?;
    let deleted = CrudService::delete(&state.pool, entity, &id).await?;
    tracing::debug!(entity = %entity.path_segment, row = %deleted, "deleted row");
    Ok(no_content())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_objects_are_accepted_as_bodies() {
        assert_eq!(body_to_map(json!({"name": "Mario"})).unwrap().len(), 1);
        assert!(matches!(body_to_map(json!([1, 2])), Err(AppError::BadRequest(_))));
        assert!(matches!(body_to_map(json!("x")), Err(AppError::BadRequest(_))));
    }
}
