//! API route definitions.

use super::handlers;
use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Maximum accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Capture state
        // ====================================================================
        .route("/api/v1/capture_state", get(handlers::capture_state))
        // ====================================================================
        // Attention items
        // ====================================================================
        .route(
            "/api/v1/attention/items",
            get(handlers::list_attention_items).post(handlers::raise_attention_item),
        )
        .route(
            "/api/v1/attention/items/{id}/resolve",
            post(handlers::resolve_attention_item),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
