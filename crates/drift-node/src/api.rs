//! Router assembly and shared state.

use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use drift_signal::SignalingHub;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::signal_api::signal_routes;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Signaling session registry.
    pub hub: Arc<SignalingHub>,
}

impl AppState {
    /// Creates state around a fresh hub with the given client queue capacity.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            hub: Arc::new(SignalingHub::with_queue_capacity(queue_capacity)),
        }
    }
}

/// Creates the node router.
///
/// `cors_origin` restricts cross-origin requests to one origin; `None`
/// allows any origin.
pub fn create_router(state: AppState, cors_origin: Option<&str>) -> Router {
    Router::new()
        .route("/", get(root))
        .merge(signal_routes())
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);
    match origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        Some(value) => layer.allow_origin(value),
        None => layer.allow_origin(Any),
    }
}

/// Liveness endpoint.
async fn root() -> &'static str {
    "Hello, World!"
}
