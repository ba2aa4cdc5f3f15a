//! ParcelViz HTTP API service library.
//!
//! Exposes the router and handlers so they can be exercised in tests.

pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use state::AppState;

/// Build the service router.
///
/// `/metrics` is only mounted when a Prometheus recorder is installed.
pub fn build_router(state: Arc<AppState>, prometheus: Option<PrometheusHandle>) -> Router {
    let outputs = ServeDir::new(state.pipeline.output_store().root());

    let mut app = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/render", post(handlers::render_handler))
        .nest_service("/outputs", outputs);

    if let Some(handle) = prometheus {
        app = app
            .route("/metrics", get(handlers::metrics_handler))
            .layer(Extension(handle));
    }

    app.layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
