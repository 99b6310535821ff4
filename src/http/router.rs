use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{core, records, upload};
use super::types::AppState;

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(core::index))
        .route("/health", get(core::health))
        .route(
            "/upload",
            post(upload::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/data", get(records::list))
        .route("/authenticate", get(records::authenticate))
        .route("/update/{id}", put(records::update))
        .route("/delete/{id}", delete(records::delete_one))
        .route("/delete", delete(records::delete_many))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
