//! HTTP router for sqstack

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use sqstack_sqs::{handle_request, Sqs};

/// Create the main application router.
///
/// SDKs post either to the service root or to the queue URL itself, so every
/// path shape a queue URL can take routes to the SQS handler.
pub fn create_router(sqs: Arc<Sqs>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/", any(handle_request))
        .route("/:account", any(handle_request))
        .route("/queue/:queue", any(handle_request))
        .route("/:account/:queue", any(handle_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(sqs)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
