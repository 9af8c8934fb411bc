use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let status_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/config", get(handlers::get_config))
        .route("/stream/status", get(handlers::stream_status));

    // Stream endpoints (typically embedded in pages as <img src>)
    let stream_routes = Router::new()
        .route("/stream", get(handlers::mjpeg_stream))
        .route("/stream/mjpeg", get(handlers::mjpeg_stream))
        .route("/snapshot", get(handlers::snapshot));

    let api_routes = Router::new().merge(status_routes).merge(stream_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
