use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use std::collections::HashMap;

/// Raw query-string pairs; interpretation is left to the entity or view being listed.
#[derive(Debug, Clone, Default)]
pub struct ListQuery(pub HashMap<String, String>);

#[async_trait]
impl<S> FromRequestParts<S> for ListQuery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(map) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(ListQuery(map))
    }
}

impl ListQuery {
    /// `skip`/`offset` and `limit` only, for surfaces without filters.
    pub fn paging(&self) -> Result<(Option<u32>, u32), AppError> {
        let parse = |key: &str| -> Result<Option<u32>, AppError> {
            match self.0.get(key) {
                Some(v) => v
                    .parse::<u32>()
                    .map(Some)
                    .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key))),
                None => Ok(None),
            }
        };
        let offset = match parse("skip")? {
            Some(n) => n,
            None => parse("offset")?.unwrap_or(0),
        };
        Ok((parse("limit")?, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        ListQuery(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn paging_defaults_and_aliases() {
        assert_eq!(query(&[]).paging().unwrap(), (None, 0));
        assert_eq!(query(&[("skip", "5"), ("limit", "10")]).paging().unwrap(), (Some(10), 5));
        assert_eq!(query(&[("offset", "3")]).paging().unwrap(), (None, 3));
    }

    #[test]
    fn negative_paging_is_rejected() {
        assert!(matches!(query(&[("limit", "-1")]).paging(), Err(AppError::BadRequest(_))));
    }
}
