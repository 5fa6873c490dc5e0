//! Paged reads over the SQL views.

use crate::error::AppError;
use crate::extractors::ListQuery;
use crate::handlers::procedures::parse_int_id;
use crate::response::ok;
use crate::service::views::{view_by_path, ViewDef};
use crate::service::ViewService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

fn view(name: &str) -> Result<&'static ViewDef, AppError> {
    view_by_path(name).ok_or_else(|| AppError::NotFound(format!("unknown view '{}'", name)))
}

pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    query: ListQuery,
) -> Result<impl IntoResponse, AppError> {
    let view = view(&name)?;
    let (limit, offset) = query.paging()?;
    Ok(ok(ViewService::list(&state.pool, view, limit, offset).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let view = view(&name)?;
    let id = parse_int_id(&id)?;
    Ok(ok(ViewService::get(&state.pool, view, id).await?))
}
