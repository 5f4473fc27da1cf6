//! HTTP routes for Omnibridge
//!
//! This module defines all HTTP endpoints exposed by the gateway.

pub mod describe_photo;
pub mod health;
pub mod metrics;
pub mod upload;
pub mod voice_mimic;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.static_dir.clone();

    // Job endpoints take media uploads; the global 2 MB default is replaced
    // by the configured limit
    let job_routes = Router::new()
        .route("/voice-mimic/process_audio", post(voice_mimic::process_audio))
        .route(
            "/describe-photo/process_photo",
            post(describe_photo::process_photo),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_bytes));

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/favicon.ico", get(favicon))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir));

    Router::new()
        .merge(public_routes)
        .merge(job_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the favicon from the static directory, or 204 when there is none
async fn favicon(State(state): State<Arc<AppState>>) -> Response {
    let path = state.config.static_dir.join("favicon.ico");
    match tokio::fs::read(&path).await {
        Ok(icon) => ([(header::CONTENT_TYPE, "image/x-icon")], icon).into_response(),
        Err(_) => StatusCode::NO_CONTENT.into_response(),
    }
}
