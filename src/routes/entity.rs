//! Entity CRUD routes built from the resolved model.
//! Each entity gets literal paths plus an `EntityKey` extension, so static surfaces such as
//! `/procedures` never collide with a `/:path_segment` capture.

use crate::config::ResolvedEntity;
use crate::extractors::EntityKey;
use crate::handlers::entity::{create, delete, list, read, related, update};
use crate::state::AppState;
use axum::{routing::MethodRouter, Extension, Router};

fn collection_methods(entity: &ResolvedEntity) -> Option<MethodRouter<AppState>> {
    let mut m: Option<MethodRouter<AppState>> = None;
    if entity.allows("list") {
        m = Some(axum::routing::get(list));
    }
    if entity.allows("create") {
        m = Some(match m {
            Some(m) => m.post(create),
            None => axum::routing::post(create),
        });
    }
    m
}

fn item_methods(entity: &ResolvedEntity) -> Option<MethodRouter<AppState>> {
    if entity.has_composite_pk() {
        return None;
    }
    let mut m: Option<MethodRouter<AppState>> = None;
    if entity.allows("read") {
        m = Some(axum::routing::get(read));
    }
    if entity.allows("update") {
        m = Some(match m {
            Some(m) => m.put(update),
            None => axum::routing::put(update),
        });
    }
    if entity.allows("delete") {
        m = Some(match m {
            Some(m) => m.delete(delete),
            None => axum::routing::delete(delete),
        });
    }
    m
}

pub fn entity_routes(entities: &[ResolvedEntity]) -> Router<AppState> {
    let mut router = Router::new();
    for entity in entities {
        let base = format!("/{}", entity.path_segment);
        let mut r: Router<AppState> = Router::new();
        if let Some(m) = collection_methods(entity) {
            r = r.route(&base, m);
        }
        if let Some(m) = item_methods(entity) {
            r = r.route(&format!("{}/:id", base), m);
            if entity.allows("read") && !entity.includes.is_empty() {
                r = r.route(&format!("{}/:id/:relation", base), axum::routing::get(related));
            }
        }
        router = router.merge(r.layer(Extension(EntityKey(entity.path_segment.clone()))));
    }
    router
}
