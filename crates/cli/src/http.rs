//! HTTP surface: health probes, metrics, and a manual trigger.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use configurator::EngagementUuid;
use listener::Readiness;

use crate::engagement_listener::EngagementListener;

#[derive(Clone)]
pub struct AppState {
    pub readiness: Readiness,
    pub listener: Arc<EngagementListener>,
    pub metrics: Option<PrometheusHandle>,
}

/// Application-specific routes. There are none yet; the probes, metrics and
/// trigger routes are mounted next to it by [`router`].
fn app_router() -> Router {
    Router::new()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route("/metrics", get(render_metrics))
        .route("/trigger/engagement/{uuid}", post(trigger_engagement))
        .with_state(state)
        .merge(app_router())
}

async fn live() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(state): State<AppState>) -> Response {
    if state.readiness.is_ready() {
        (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "reason": "AMQP connection is down" })),
        )
            .into_response()
    }
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Re-runs the job function rule for one engagement, outside the queue.
async fn trigger_engagement(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> Response {
    match state.listener.process(EngagementUuid::new(uuid)).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => {
            warn!(engagement_uuid = %uuid, error = %err, "Manual trigger failed");
            let status = if err.retry_policy().is_retryable() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}
