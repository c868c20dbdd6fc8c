//! Route table (§6). Handlers delegate to the shared [`Gateway`] facade.

use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::http::health))
        .route("/api/v1/vce/ws", get(handlers::ws::ws_handler))
        .route("/api/v1/vce/coze/chat/tts", get(handlers::http::pull_tts))
        .route(
            "/api/v1/vce/coze/audio/text_to_speech",
            post(handlers::http::text_to_speech),
        )
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .with_state(state)
}
