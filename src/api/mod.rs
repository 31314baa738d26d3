//! API Layer - HTTP surface for the chat backend

pub mod rest;
pub mod middleware;

use std::sync::Arc;
use axum::{Router, routing::get, Extension};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;

use crate::message::MessageRouter;
use crate::presence::PresenceManager;

/// Create the main API router
pub fn router(presence: Arc<PresenceManager>, messages: Arc<MessageRouter>) -> Router {
    rest::routes()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(Extension(presence))
        .layer(Extension(messages))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics_handler() -> String {
    // Prometheus-format metrics
    let mut output = String::new();
    output.push_str("# HELP batepapo_up Chat backend is running\n");
    output.push_str("# TYPE batepapo_up gauge\n");
    output.push_str("batepapo_up 1\n");
    output
}
