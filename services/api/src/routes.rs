use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use school_records::api_router;
use school_records::clock::Clock;
use school_records::store::Database;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::warn;

/// Component routers plus the operational endpoints.
pub(crate) fn with_core_routes(database: Database, clock: Arc<dyn Clock>) -> Router {
    api_router(database, clock)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready once the listener is bound and the schema can be read.
pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if !state.readiness.load(Ordering::Acquire) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        );
    }

    match state.database.schema_version() {
        Ok(version) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "schema_version": version })),
        ),
        Err(err) => {
            warn!(error = %err, "readiness probe could not reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded" })),
            )
        }
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
