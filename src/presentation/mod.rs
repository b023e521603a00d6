// Presentation layer - HTTP API
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_charts, health_check, refresh, select_range, stream_charts, watcher_states,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Compression is handled in the response builders, so no CompressionLayer here
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/charts", get(get_charts))
        .route("/charts/range/:range", post(select_range))
        .route("/charts/refresh", post(refresh))
        .route("/charts/stream", get(stream_charts))
        .route("/charts/watchers", get(watcher_states))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
