use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::error;

use super::domain::{EnrollmentFilter, EnrollmentStatus};
use super::ledger::{EnrollmentLedger, LedgerError};
use crate::http::{error_response, run_blocking};
use crate::ids::{ClassId, EnrollmentId, StudentId};

#[derive(Debug, Deserialize)]
pub(crate) struct CreateEnrollmentRequest {
    pub(crate) student_id: StudentId,
    pub(crate) class_id: ClassId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionRequest {
    pub(crate) status: EnrollmentStatus,
}

/// Router exposing the ledger operations.
pub fn enrollment_router(ledger: Arc<EnrollmentLedger>) -> Router {
    Router::new()
        .route(
            "/api/v1/enrollments",
            post(create_handler).get(list_handler),
        )
        .route("/api/v1/enrollments/:enrollment_id", get(get_handler))
        .route(
            "/api/v1/enrollments/:enrollment_id/status",
            post(transition_handler),
        )
        .route("/api/v1/classes/:class_id/roster", get(roster_handler))
        .with_state(ledger)
}

pub(crate) async fn create_handler(
    State(ledger): State<Arc<EnrollmentLedger>>,
    Json(request): Json<CreateEnrollmentRequest>,
) -> Response {
    match run_blocking(move || {
        ledger.create_enrollment(request.student_id, request.class_id)
    })
    .await
    {
        Ok(enrollment) => (StatusCode::CREATED, Json(enrollment)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_handler(
    State(ledger): State<Arc<EnrollmentLedger>>,
    Query(filter): Query<EnrollmentFilter>,
) -> Response {
    match run_blocking(move || ledger.list_enrollments(&filter)).await {
        Ok(enrollments) => (StatusCode::OK, Json(enrollments)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn get_handler(
    State(ledger): State<Arc<EnrollmentLedger>>,
    Path(enrollment_id): Path<i64>,
) -> Response {
    match run_blocking(move || ledger.get_enrollment(EnrollmentId(enrollment_id))).await {
        Ok(enrollment) => (StatusCode::OK, Json(enrollment)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn transition_handler(
    State(ledger): State<Arc<EnrollmentLedger>>,
    Path(enrollment_id): Path<i64>,
    Json(request): Json<TransitionRequest>,
) -> Response {
    match run_blocking(move || {
        ledger.transition_status(EnrollmentId(enrollment_id), request.status)
    })
    .await
    {
        Ok(enrollment) => (StatusCode::OK, Json(enrollment)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn roster_handler(
    State(ledger): State<Arc<EnrollmentLedger>>,
    Path(class_id): Path<i64>,
) -> Response {
    match run_blocking(move || ledger.list_active_roster(ClassId(class_id))).await {
        Ok(roster) => (StatusCode::OK, Json(roster)).into_response(),
        Err(err) => err.into_response(),
    }
}

impl LedgerError {
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            _ if self.is_not_found() => StatusCode::NOT_FOUND,
            LedgerError::EnrollmentConflict { .. } | LedgerError::DuplicateEnrollment { .. } => {
                StatusCode::CONFLICT
            }
            LedgerError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "enrollment ledger failure");
        }
        error_response(status, self)
    }
}
