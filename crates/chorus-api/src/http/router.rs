//! Axum router configuration with middleware.
//!
//! Routes: `/ws` (chat), `/speech/local/{file}`, `/speech/remote/{id}`,
//! `/health`. Middleware: CORS and request tracing.

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/speech/local/{file}", get(handlers::speech::local_speech))
        .route("/speech/remote/{id}", get(handlers::speech::remote_speech))
        .route("/health", get(handlers::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
