use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/health/redis", get(handlers::health_redis))
        // Sessions
        .route("/sessions/create", post(handlers::create_session))
        // Feed
        .route("/feed", get(handlers::get_feed))
        .route("/feed/stream", get(handlers::stream_updates))
        // Engagement
        .route("/like", post(handlers::like))
        .route("/dislike", post(handlers::dislike))
        // Catalog
        .route("/items", post(handlers::create_item))
        .route("/items/top", get(handlers::top_items))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
