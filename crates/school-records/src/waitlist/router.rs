use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::allocator::{WaitlistAllocator, WaitlistError};
use crate::http::{error_response, run_blocking};
use crate::ids::{ClassId, SchoolId, StudentId, WaitlistEntryId};

#[derive(Debug, Deserialize)]
pub(crate) struct EnqueueRequest {
    pub(crate) student_id: StudentId,
    #[serde(default)]
    pub(crate) preferred_school_id: Option<SchoolId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AllocateRequest {
    pub(crate) class_id: ClassId,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueueQuery {
    #[serde(default)]
    pub(crate) school_id: Option<SchoolId>,
}

/// Router exposing waitlist registration, allocation and cancellation.
pub fn waitlist_router(allocator: Arc<WaitlistAllocator>) -> Router {
    Router::new()
        .route("/api/v1/waitlist", post(enqueue_handler).get(queue_handler))
        .route("/api/v1/waitlist/:entry_id", delete(remove_handler))
        .route("/api/v1/waitlist/:entry_id/allocate", post(allocate_handler))
        .route("/api/v1/waitlist/:entry_id/cancel", post(cancel_handler))
        .route(
            "/api/v1/classes/:class_id/allocate-next",
            post(allocate_next_handler),
        )
        .route("/api/v1/students/:student_id/zoning", get(zoning_handler))
        .with_state(allocator)
}

pub(crate) async fn enqueue_handler(
    State(allocator): State<Arc<WaitlistAllocator>>,
    Json(request): Json<EnqueueRequest>,
) -> Response {
    match run_blocking(move || {
        allocator.enqueue(request.student_id, request.preferred_school_id)
    })
    .await
    {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn queue_handler(
    State(allocator): State<Arc<WaitlistAllocator>>,
    Query(query): Query<QueueQuery>,
) -> Response {
    match run_blocking(move || allocator.list_queue(query.school_id)).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn zoning_handler(
    State(allocator): State<Arc<WaitlistAllocator>>,
    Path(student_id): Path<i64>,
) -> Response {
    match run_blocking(move || allocator.resolve_zoning(StudentId(student_id))).await {
        Ok(school) => (StatusCode::OK, Json(school)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn allocate_handler(
    State(allocator): State<Arc<WaitlistAllocator>>,
    Path(entry_id): Path<i64>,
    Json(request): Json<AllocateRequest>,
) -> Response {
    match run_blocking(move || {
        allocator.allocate(WaitlistEntryId(entry_id), request.class_id)
    })
    .await
    {
        Ok(allocation) => (StatusCode::OK, Json(allocation)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn allocate_next_handler(
    State(allocator): State<Arc<WaitlistAllocator>>,
    Path(class_id): Path<i64>,
) -> Response {
    match run_blocking(move || allocator.allocate_next(ClassId(class_id))).await {
        Ok(Some(allocation)) => (StatusCode::OK, Json(allocation)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn cancel_handler(
    State(allocator): State<Arc<WaitlistAllocator>>,
    Path(entry_id): Path<i64>,
) -> Response {
    match run_blocking(move || allocator.cancel(WaitlistEntryId(entry_id))).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn remove_handler(
    State(allocator): State<Arc<WaitlistAllocator>>,
    Path(entry_id): Path<i64>,
) -> Response {
    match run_blocking(move || allocator.remove(WaitlistEntryId(entry_id))).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

impl WaitlistError {
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            _ if self.is_not_found() => StatusCode::NOT_FOUND,
            WaitlistError::NoZoningMatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WaitlistError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WaitlistError::Ledger(err) => err.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WaitlistError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "waitlist allocator failure");
        }
        if let WaitlistError::NoZoningMatch { neighborhood, .. } = &self {
            let payload = json!({
                "error": self.to_string(),
                "neighborhood": neighborhood,
            });
            return (status, Json(payload)).into_response();
        }
        error_response(status, self)
    }
}
