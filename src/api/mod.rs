//! HTTP surface of the bridge
//!
//! - `POST /write` - Prometheus remote write
//! - `POST /read` - Prometheus remote read
//! - `GET /metrics` - bridge counters
//! - `GET /ready` - database reachability

pub mod remote;
mod telemetry;

use crate::gateway::Gateway;
use crate::ingester::Writer;
use crate::metrics::BridgeMetrics;
use crate::query::{MatcherTranslator, Reader};
use crate::schema::TableName;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;
use tracing::warn;

/// Content type of the metrics exposition
const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub writer: Writer,
    pub reader: Reader,
    pub gateway: Arc<dyn Gateway>,
    pub metrics: Arc<BridgeMetrics>,
}

impl ApiState {
    pub fn new(gateway: Arc<dyn Gateway>, table: TableName, translator: MatcherTranslator) -> Self {
        Self {
            writer: Writer::new(gateway.clone(), table.clone()),
            reader: Reader::new(gateway.clone(), table, translator),
            gateway,
            metrics: Arc::new(BridgeMetrics::new()),
        }
    }
}

/// Build the HTTP API router
pub fn build_http_router(state: ApiState, max_body_size: usize) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    Router::new()
        .route("/", get(root))
        .route("/write", post(remote::handle_write))
        .route("/read", post(remote::handle_read))
        .route("/metrics", get(metrics))
        .route("/ready", get(ready_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(middleware::from_fn(telemetry::http_observability_middleware))
}

async fn root() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "tsbridge")
}

async fn metrics(State(state): State<ApiState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response(),
    }
}

/// Readiness check endpoint
async fn ready_check(State(state): State<ApiState>) -> Response {
    match state.gateway.ping().await {
        Ok(()) => (StatusCode::OK, "READY").into_response(),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}
