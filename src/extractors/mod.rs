//! Request extractors whose rejections use the JSON error body.

mod json;
mod query;

pub use json::ApiJson;
pub use query::ListQuery;

/// Path segment of the catalog entity a route was registered for.
#[derive(Clone, Debug)]
pub struct EntityKey(pub String);
