//! HTTP API assembly

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;
use crate::realtime::bridge;

pub mod health;
pub mod offers;
pub mod orders;

/// All routes, no middleware or state.
pub fn build_router() -> Router<ServerState> {
    Router::new()
        // Public storefront API
        .merge(orders::router())
        .merge(offers::router())
        // Bridge + introspection (secret-gated inside the handler)
        .merge(bridge::router())
        // Health - public route
        .merge(health::router())
}

/// Fully configured application with middleware.
pub fn build_app() -> Router<ServerState> {
    build_router()
        // CORS - browser checkout and dashboard run on other origins
        .layer(CorsLayer::permissive())
        // Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
}
