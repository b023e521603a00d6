// HTTP request handlers
use crate::domain::chart::Dashboard;
use crate::domain::time_range::TimeRange;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::infrastructure::snapshot_events::dashboard_events;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct RangeQuery {
    pub range: Option<String>,
}

#[derive(Serialize)]
struct WatcherStatus {
    metric: String,
    state: crate::application::live_update_watcher::WatcherState,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current charts, optionally switching range first
pub async fn get_charts(
    Query(query): Query<RangeQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);

    let dashboard = match query.range {
        Some(raw) => match raw.parse::<TimeRange>() {
            Ok(range) => change_range(&state, range).await,
            Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
        },
        None => Ok(state.screen.dashboard()),
    };

    respond(dashboard, compress).await
}

/// Switch the displayed range and return the settled charts
pub async fn select_range(
    Path(raw): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);
    let range = match raw.parse::<TimeRange>() {
        Ok(range) => range,
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };

    respond(change_range(&state, range).await, compress).await
}

/// Re-run every metric query for the current range
pub async fn refresh(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let compress = accepts_brotli(&headers);
    let before = state.screen.dashboard().revision;

    let result = match state.screen.refresh().await {
        Ok(()) => Ok(settled_after(&state, before, None).await),
        Err(e) => Err(e),
    };
    respond(result, compress).await
}

/// Push every settled snapshot as a server-sent event
pub async fn stream_charts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    dashboard_events(state.screen.subscribe())
}

/// Subscription state of each live-update watcher
pub async fn watcher_states(State(state): State<Arc<AppState>>) -> Response {
    match state.screen.watcher_states().await {
        Ok(states) => {
            let body: Vec<WatcherStatus> = states
                .into_iter()
                .map(|(metric, state)| WatcherStatus {
                    metric: metric.identifier().to_string(),
                    state,
                })
                .collect();
            axum::Json(body).into_response()
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

async fn change_range(
    state: &AppState,
    range: TimeRange,
) -> Result<Dashboard, crate::application::mobility_screen::ScreenClosed> {
    let before = state.screen.dashboard().revision;
    state.screen.select_range(range).await?;
    Ok(settled_after(state, before, Some(range)).await)
}

/// First settled snapshot newer than `before`, or the latest one on timeout.
async fn settled_after(state: &AppState, before: u64, range: Option<TimeRange>) -> Dashboard {
    let mut rx = state.screen.subscribe();
    let waited = tokio::time::timeout(
        state.settle_timeout,
        rx.wait_for(|d| d.revision > before && d.is_settled() && range.is_none_or(|r| d.range == r)),
    )
    .await;

    match waited {
        Ok(Ok(dashboard)) => dashboard.clone(),
        _ => {
            tracing::warn!("Charts did not settle in {:?}, returning latest", state.settle_timeout);
            state.screen.dashboard()
        }
    }
}

async fn respond(
    dashboard: Result<Dashboard, crate::application::mobility_screen::ScreenClosed>,
    compress: bool,
) -> Response {
    match dashboard {
        Ok(dashboard) => match json_response(&dashboard, compress).await {
            Ok(response) => response,
            Err(status) => status.into_response(),
        },
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}
