//! Generic CRUD execution against PostgreSQL.

use crate::config::{ColumnKind, FilterOp, IncludeDirection, ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::service::validation::{coerce_query_value, parse_bool, RequestValidator};
use crate::sql::{
    bind_all, delete, exists_by_column, exists_reference, insert, select_by_column, select_by_id, select_list, update, Filter,
    IncludeSelect, PgBindValue, QueryBuf,
};
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};
use std::collections::HashMap;

/// Parsed list query: paging, filters and includes, all checked against the entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListParams {
    pub filters: Vec<Filter>,
    pub limit: Option<u32>,
    pub offset: u32,
    pub include: Vec<String>,
}

impl ListParams {
    /// Build from raw query-string pairs. `skip` and `offset` are synonyms; named filters
    /// (`min_hp`, `has_item`, ...) map onto their column; any column name filters by equality.
    /// Unrecognised keys are ignored.
    pub fn from_query(entity: &ResolvedEntity, raw: &HashMap<String, String>) -> Result<Self, AppError> {
        let mut params = ListParams::default();
        let mut keys: Vec<&String> = raw.keys().collect();
        keys.sort();
        for key in keys {
            let value = &raw[key];
            match key.as_str() {
                "skip" | "offset" => params.offset = parse_u32(key, value)?,
                "limit" => params.limit = Some(parse_u32(key, value)?),
                "include" => {
                    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                        if entity.include(name).is_none() {
                            return Err(AppError::BadRequest(format!(
                                "unknown include '{}' for {}",
                                name, entity.path_segment
                            )));
                        }
                        params.include.push(name.to_string());
                    }
                }
                _ => {
                    if let Some(f) = entity.filters.iter().find(|f| f.param == *key) {
                        let Some(c) = entity.column(&f.column) else { continue };
                        let value = match f.op {
                            FilterOp::NotNull => parse_bool(value).map(Value::Bool).ok_or_else(|| {
                                AppError::BadRequest(format!("{} must be true or false", key))
                            })?,
                            _ => coerce_query_value(c, value)?,
                        };
                        params.filters.push(Filter {
                            column: f.column.clone(),
                            op: f.op,
                            value,
                        });
                    } else if let Some(c) = entity.column(key) {
                        params.filters.push(Filter::eq(key.clone(), coerce_query_value(c, value)?));
                    }
                }
            }
        }
        Ok(params)
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, AppError> {
    value
        .parse::<u32>()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key)))
}

pub struct CrudService;

impl CrudService {
    /// List rows with filters, includes and optional paging. Without a limit every matching row is returned.
    pub async fn list(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        params: &ListParams,
    ) -> Result<Vec<Value>, AppError> {
        let mut includes = Vec::with_capacity(params.include.len());
        for name in &params.include {
            let spec = entity
                .include(name)
                .ok_or_else(|| AppError::BadRequest(format!("unknown include '{}'", name)))?;
            let related = model
                .entity_by_path(&spec.related_path_segment)
                .ok_or_else(|| AppError::NotFound(format!("entity {}", spec.related_path_segment)))?;
            includes.push(IncludeSelect {
                name: &spec.name,
                direction: spec.direction.clone(),
                related,
                our_key: &spec.our_key_column,
                their_key: &spec.their_key_column,
            });
        }
        let q = select_list(entity, &params.filters, params.limit, params.offset, &includes);
        fetch_all_json(pool, &q).await
    }

    /// Fetch one row by primary key; 404 with the entity label when absent.
    pub async fn read(pool: &PgPool, entity: &ResolvedEntity, id: &Value) -> Result<Value, AppError> {
        let mut q = select_by_id(entity);
        q.params.push(id.clone());
        fetch_optional_json(pool, &q)
            .await?
            .ok_or_else(|| not_found(entity, id))
    }

    /// Rows reachable from one row through a foreign key: an object (or null) for to-one relations,
    /// an array for to-many relations.
    pub async fn related(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: &Value,
        relation: &str,
    ) -> Result<Value, AppError> {
        let spec = entity.include(relation).ok_or_else(|| {
            AppError::NotFound(format!("{} has no relation '{}'", entity.label, relation))
        })?;
        let related = model
            .entity_by_path(&spec.related_path_segment)
            .ok_or_else(|| AppError::NotFound(format!("entity {}", spec.related_path_segment)))?;
        let parent = Self::read(pool, entity, id).await?;
        let key = parent.get(&spec.our_key_column).cloned().unwrap_or(Value::Null);
        let mut q = select_by_column(related, &spec.their_key_column);
        match spec.direction {
            IncludeDirection::ToOne => {
                if key.is_null() {
                    return Ok(Value::Null);
                }
                q.params.push(key);
                Ok(fetch_optional_json(pool, &q).await?.unwrap_or(Value::Null))
            }
            IncludeDirection::ToMany => {
                q.params.push(key);
                Ok(Value::Array(fetch_all_json(pool, &q).await?))
            }
        }
    }

    /// Insert one row after validation, reference and uniqueness checks. Returns created row.
    pub async fn create(
        pool: &PgPool,
        entity: &ResolvedEntity,
        body: HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let body = RequestValidator::writable_fields(entity, body);
        RequestValidator::validate(entity, &body)?;
        let mut tx = pool.begin().await?;
        check_references(&mut tx, entity, &body).await?;
        check_unique(&mut tx, entity, &body, None).await?;
        if !entity.pk_serial && !entity.has_composite_pk() {
            if let Some(id) = body.get(entity.pk()) {
                if exists(&mut *tx, &exists_by_column(entity, entity.pk(), false), &[id.clone()]).await? {
                    return Err(AppError::Conflict(format!(
                        "{} with id {} already exists",
                        entity.label,
                        display_value(id)
                    )));
                }
            }
        }
        let q = insert(entity, &body);
        let row = fetch_optional_json(&mut *tx, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        tx.commit().await?;
        tracing::debug!(entity = %entity.path_segment, "created row");
        Ok(row)
    }

    /// Partial update of the provided fields. Returns updated row.
    pub async fn update(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: &Value,
        body: HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let mut body = RequestValidator::writable_fields(entity, body);
        body.remove(entity.pk());
        RequestValidator::validate_partial(entity, &body)?;
        let mut tx = pool.begin().await?;
        let mut existing = select_by_id(entity);
        existing.params.push(id.clone());
        if fetch_optional_json(&mut *tx, &existing).await?.is_none() {
            return Err(not_found(entity, id));
        }
        check_references(&mut tx, entity, &body).await?;
        check_unique(&mut tx, entity, &body, Some(id)).await?;
        let q = update(entity, id, &body);
        let row = fetch_optional_json(&mut *tx, &q)
            .await?
            .ok_or_else(|| not_found(entity, id))?;
        tx.commit().await?;
        Ok(row)
    }

    /// Delete one row by id. Returns the deleted row.
    pub async fn delete(pool: &PgPool, entity: &ResolvedEntity, id: &Value) -> Result<Value, AppError> {
        let mut q = delete(entity);
        q.params.push(id.clone());
        fetch_optional_json(pool, &q)
            .await?
            .ok_or_else(|| not_found(entity, id))
    }

    /// Parse a path id into the JSON shape of the primary key column.
    /// An integer too large for the key column cannot name a row, so it is a 404.
    pub fn parse_id(entity: &ResolvedEntity, raw: &str) -> Result<Value, AppError> {
        match entity.column(entity.pk()) {
            Some(c) if c.kind == ColumnKind::Integer => match raw.parse::<i64>() {
                Ok(n) if i32::try_from(n).is_err() => Err(not_found(entity, &Value::from(n))),
                _ => coerce_query_value(c, raw),
            },
            Some(c) => coerce_query_value(c, raw),
            None => Ok(Value::String(raw.to_string())),
        }
    }
}

fn not_found(entity: &ResolvedEntity, id: &Value) -> AppError {
    AppError::NotFound(format!("{} with id {} not found", entity.label, display_value(id)))
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every foreign key present in the body must point at an existing row.
async fn check_references(
    conn: &mut sqlx::PgConnection,
    entity: &ResolvedEntity,
    body: &HashMap<String, Value>,
) -> Result<(), AppError> {
    for r in &entity.references {
        let Some(v) = body.get(&r.column).filter(|v| !v.is_null()) else { continue };
        let q = exists_reference(r);
        if !exists(&mut *conn, &q, &[v.clone()]).await? {
            return Err(AppError::NotFound(format!(
                "{} with id {} not found",
                r.related_label,
                display_value(v)
            )));
        }
    }
    Ok(())
}

/// Single-column unique values must be free (ignoring the row being updated).
async fn check_unique(
    conn: &mut sqlx::PgConnection,
    entity: &ResolvedEntity,
    body: &HashMap<String, Value>,
    exclude_id: Option<&Value>,
) -> Result<(), AppError> {
    for col in &entity.unique_columns {
        let Some(v) = body.get(col).filter(|v| !v.is_null()) else { continue };
        let q = exists_by_column(entity, col, exclude_id.is_some());
        let mut params = vec![v.clone()];
        params.extend(exclude_id.cloned());
        if exists(&mut *conn, &q, &params).await? {
            return Err(AppError::Conflict(format!(
                "{} with {} '{}' already exists",
                entity.label,
                col,
                display_value(v)
            )));
        }
    }
    Ok(())
}

async fn exists<'c, E: PgExecutor<'c>>(ex: E, q: &QueryBuf, params: &[Value]) -> Result<bool, AppError> {
    tracing::debug!(sql = %q.sql, params = ?params, "query");
    let mut query = sqlx::query_scalar::<_, bool>(&q.sql);
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    Ok(query.fetch_one(ex).await?)
}

pub(crate) async fn fetch_optional_json<'c, E: PgExecutor<'c>>(ex: E, q: &QueryBuf) -> Result<Option<Value>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_all(sqlx::query(&q.sql), &q.params).fetch_optional(ex).await?;
    Ok(row.map(|r| row_to_json(&r)))
}

pub(crate) async fn fetch_all_json<'c, E: PgExecutor<'c>>(ex: E, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = bind_all(sqlx::query(&q.sql), &q.params).fetch_all(ex).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

pub(crate) fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        map.insert(name.to_string(), v);
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
