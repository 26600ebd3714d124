//! HTTP API server for the order fulfillment backend.
//!
//! Provides REST endpoints for placing and managing orders, a WebSocket
//! endpoint for live events, structured logging (tracing) and Prometheus
//! metrics.

pub mod caller;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use fulfillment::{EngineConfig, OrderEngine};
use hub::EventHub;
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::metrics::MetricsState;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(MetricsState {
            handle: metrics_handle,
            hub: state.hub.clone(),
        });

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", get(routes::orders::status::<S>))
        .route("/orders/{id}/cancel", put(routes::orders::cancel::<S>))
        .route(
            "/admin/orders/{id}/status",
            put(routes::orders::update_status::<S>),
        )
        .route("/ws", get(routes::ws::upgrade::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around a store.
pub fn create_state<S: Store + Clone>(store: S, engine_config: EngineConfig) -> Arc<AppState<S>> {
    let hub = EventHub::new();
    let engine = OrderEngine::new(store, hub.clone(), engine_config);
    Arc::new(AppState { engine, hub })
}
