use crate::handlers::{queries, views};
use crate::state::AppState;
use axum::{routing::get, Router};

/// GET /views/:name and /views/:name/:id.
pub fn view_routes() -> Router<AppState> {
    Router::new()
        .route("/views/:name", get(views::list))
        .route("/views/:name/:id", get(views::get))
}

/// GET /queries/*.
pub fn query_routes() -> Router<AppState> {
    Router::new()
        .route("/queries/enemies-with-details", get(queries::enemies_with_details))
        .route("/queries/bosses-with-details", get(queries::bosses_with_details))
        .route(
            "/queries/playable-characters-with-chapters",
            get(queries::playable_characters_with_chapters),
        )
        .route(
            "/queries/blocks-with-items-and-locations",
            get(queries::blocks_with_items_and_locations),
        )
        .route("/queries/side-quests-full-details", get(queries::side_quests_full_details))
        .route("/queries/locations-with-everything", get(queries::locations_with_everything))
        .route("/queries/chapter-summary/:chapter_id", get(queries::chapter_summary))
}
