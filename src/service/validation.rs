//! Request validation from catalog rules and column kinds.

use crate::config::{ColumnInfo, ColumnKind, ResolvedEntity, ValidationRule};
use crate::error::AppError;
use serde_json::Value;
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate body against per-column rules. All required fields must be present.
    pub fn validate(entity: &ResolvedEntity, body: &HashMap<String, Value>) -> Result<(), AppError> {
        // Stable order so the first reported problem does not depend on hashing.
        for c in &entity.columns {
            let Some(rule) = entity.validation.get(&c.name) else { continue };
            let val = body.get(&c.name);
            if rule.required == Some(true) && val.map_or(true, Value::is_null) {
                return Err(AppError::Validation(format!("{} is required", c.name)));
            }
            if let Some(v) = val {
                validate_field(c, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (for PUT). Required is not enforced for missing fields.
    pub fn validate_partial(entity: &ResolvedEntity, body: &HashMap<String, Value>) -> Result<(), AppError> {
        for c in &entity.columns {
            let (Some(rule), Some(v)) = (entity.validation.get(&c.name), body.get(&c.name)) else {
                continue;
            };
            validate_field(c, v, rule)?;
        }
        Ok(())
    }

    /// Keep only columns the caller may write: unknown keys and generated keys are dropped.
    /// Timestamps with an offset are rewritten as naive UTC; unparseable ones are left for `validate`.
    pub fn writable_fields(entity: &ResolvedEntity, body: HashMap<String, Value>) -> HashMap<String, Value> {
        body.into_iter()
            .filter_map(|(k, v)| {
                let c = entity.column(&k)?;
                if c.is_pk && entity.pk_serial {
                    return None;
                }
                let v = match (&c.kind, v.as_str().and_then(parse_timestamp)) {
                    (ColumnKind::Timestamp, Some(ts)) => Value::String(format_timestamp(&ts)),
                    _ => v,
                };
                Some((k, v))
            })
            .collect()
    }
}

fn validate_field(c: &ColumnInfo, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    let col = c.name.as_str();
    if v.is_null() {
        if !c.nullable {
            return Err(AppError::Validation(format!("{} may not be null", col)));
        }
        return Ok(());
    }
    check_kind(c, v)?;
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| a == v) {
            let names: Vec<&str> = allowed.iter().filter_map(Value::as_str).collect();
            return Err(AppError::Validation(format!(
                "{} must be one of: {}",
                col,
                names.join(", ")
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn check_kind(c: &ColumnInfo, v: &Value) -> Result<(), AppError> {
    let ok = match c.kind {
        ColumnKind::Integer => v.as_i64().map_or(false, |n| i32::try_from(n).is_ok()),
        ColumnKind::Boolean => v.is_boolean(),
        ColumnKind::Text | ColumnKind::Enum => v.is_string(),
        ColumnKind::Timestamp => v.as_str().map_or(false, |s| parse_timestamp(s).is_some()),
    };
    if ok {
        Ok(())
    } else {
        let expected = match c.kind {
            ColumnKind::Integer => "an integer",
            ColumnKind::Boolean => "a boolean",
            ColumnKind::Text | ColumnKind::Enum => "a string",
            ColumnKind::Timestamp => "an ISO 8601 timestamp",
        };
        Err(AppError::Validation(format!("{} must be {}", c.name, expected)))
    }
}

/// Accepts `2024-05-01T12:00:00`, with fractional seconds, a space separator, or an RFC 3339 offset
/// (converted to UTC).
pub fn parse_timestamp(s: &str) -> Option<chrono::NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
}

pub fn format_timestamp(ts: &chrono::NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Coerce a query-string value to the JSON shape of the column so it binds with the right type.
pub fn coerce_query_value(c: &ColumnInfo, raw: &str) -> Result<Value, AppError> {
    match c.kind {
        ColumnKind::Integer => {
            let n = raw
                .parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("{} must be an integer", c.name)))?;
            i32::try_from(n)
                .map(Value::from)
                .map_err(|_| AppError::BadRequest(format!("{} is out of range", c.name)))
        }
        ColumnKind::Boolean => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| AppError::BadRequest(format!("{} must be true or false", c.name))),
        ColumnKind::Timestamp => parse_timestamp(raw)
            .map(|ts| Value::String(format_timestamp(&ts)))
            .ok_or_else(|| AppError::BadRequest(format!("{} must be an ISO 8601 timestamp", c.name))),
        ColumnKind::Text | ColumnKind::Enum => Ok(Value::String(raw.to_string())),
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_embedded, resolve, ResolvedModel};
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&load_embedded().unwrap()).unwrap()
    }

    fn body(v: Value) -> HashMap<String, Value> {
        serde_json::from_value(v).unwrap()
    }

    fn message(r: Result<(), AppError>) -> String {
        match r {
            Err(AppError::Validation(m)) => m,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn accepts_complete_enemy() {
        let m = model();
        let enemies = m.entity_by_path("enemies").unwrap();
        let b = body(json!({"character_id": 1, "hp": 10, "attack": 2, "defense": 0}));
        assert!(RequestValidator::validate(enemies, &b).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let m = model();
        let chapters = m.entity_by_path("chapters").unwrap();
        let b = body(json!({"name": "Lineland"}));
        assert_eq!(message(RequestValidator::validate(chapters, &b)), "world_number is required");
    }

    #[test]
    fn rejects_check_violations() {
        let m = model();
        let enemies = m.entity_by_path("enemies").unwrap();
        let b = body(json!({"character_id": 1, "hp": 0, "attack": 2, "defense": 1}));
        assert_eq!(message(RequestValidator::validate(enemies, &b)), "hp must be at least 1");
        let b = body(json!({"card_score": -5}));
        assert!(RequestValidator::validate_partial(enemies, &b).is_err());
    }

    #[test]
    fn rejects_wrong_types() {
        let m = model();
        let items = m.entity_by_path("items").unwrap();
        let b = body(json!({"name": "Shroom", "is_key_item": "yes"}));
        assert_eq!(message(RequestValidator::validate(items, &b)), "is_key_item must be a boolean");
        let b = body(json!({"name": 5}));
        assert_eq!(message(RequestValidator::validate_partial(items, &b)), "name must be a string");
    }

    #[test]
    fn rejects_over_long_strings() {
        let m = model();
        let pixls = m.entity_by_path("pixls").unwrap();
        let b = body(json!({"name": "x".repeat(51)}));
        assert_eq!(
            message(RequestValidator::validate(pixls, &b)),
            "name must be at most 50 characters"
        );
    }

    #[test]
    fn rejects_unknown_enum_value() {
        let m = model();
        let blocks = m.entity_by_path("blocks").unwrap();
        let b = body(json!({"location_id": 1, "block_type": "golden"}));
        assert!(message(RequestValidator::validate(blocks, &b)).starts_with("block_type must be one of"));
    }

    #[test]
    fn partial_update_rejects_null_for_required_column() {
        let m = model();
        let characters = m.entity_by_path("characters").unwrap();
        let b = body(json!({"name": null}));
        assert_eq!(
            message(RequestValidator::validate_partial(characters, &b)),
            "name may not be null"
        );
        let b = body(json!({"description": null}));
        assert!(RequestValidator::validate_partial(characters, &b).is_ok());
    }

    #[test]
    fn writable_fields_drop_serial_keys_and_unknown_keys() {
        let m = model();
        let characters = m.entity_by_path("characters").unwrap();
        let b = RequestValidator::writable_fields(
            characters,
            body(json!({"character_id": 9, "name": "Mario", "favourite_colour": "red"})),
        );
        assert_eq!(b.len(), 1);
        assert!(b.contains_key("name"));

        let playable = m.entity_by_path("playable-characters").unwrap();
        let b = RequestValidator::writable_fields(playable, body(json!({"character_id": 1})));
        assert!(b.contains_key("character_id"));
    }

    #[test]
    fn timestamps_accept_common_shapes() {
        assert!(parse_timestamp("2024-05-01T12:00:00").is_some());
        assert!(parse_timestamp("2024-05-01 12:00:00.25").is_some());
        assert!(parse_timestamp("2024-05-01T12:00:00+02:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn query_values_are_coerced_by_kind() {
        let m = model();
        let items = m.entity_by_path("items").unwrap();
        let key = items.column("is_key_item").unwrap();
        assert_eq!(coerce_query_value(key, "true").unwrap(), json!(true));
        assert!(coerce_query_value(key, "maybe").is_err());
        let id = items.column("item_id").unwrap();
        assert_eq!(coerce_query_value(id, "12").unwrap(), json!(12));
    }

    #[test]
    fn offset_timestamps_are_written_as_utc() {
        let m = model();
        let effects = m.entity_by_path("character-status-effects").unwrap();
        let b = RequestValidator::writable_fields(
            effects,
            body(json!({"character_id": 1, "status_id": 2, "expires_at": "2024-05-01T12:00:00+02:00"})),
        );
        assert_eq!(b["expires_at"], json!("2024-05-01T10:00:00"));
        let b = RequestValidator::writable_fields(effects, body(json!({"expires_at": "2024-05-01 08:30:00.5"})));
        assert_eq!(b["expires_at"], json!("2024-05-01T08:30:00.500"));
        let b = RequestValidator::writable_fields(effects, body(json!({"expires_at": "tomorrow"})));
        assert!(RequestValidator::validate_partial(effects, &b).is_err());
    }

    #[test]
    fn query_values_are_normalized_and_range_checked() {
        let m = model();
        let effects = m.entity_by_path("character-status-effects").unwrap();
        let expires = effects.column("expires_at").unwrap();
        assert_eq!(
            coerce_query_value(expires, "2024-05-01T00:30:00-01:00").unwrap(),
            json!("2024-05-01T01:30:00")
        );
        let id = effects.column("character_id").unwrap();
        assert!(matches!(coerce_query_value(id, "99999999999"), Err(AppError::BadRequest(_))));
    }
}
