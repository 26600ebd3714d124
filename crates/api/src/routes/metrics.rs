//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use hub::EventHub;
use metrics_exporter_prometheus::PrometheusHandle;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// State of the metrics router.
#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
    pub hub: EventHub,
}

/// GET /metrics: Prometheus text exposition. The live connection gauge is
/// refreshed on every scrape.
pub async fn get(State(state): State<MetricsState>) -> impl IntoResponse {
    let live = state.hub.connection_count().await;
    metrics::gauge!("hub_connections").set(live as f64);

    (
        StatusCode::OK,
        [(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.handle.render(),
    )
}
