use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::error;

use super::aggregator::{AggregationError, AssessmentAggregator};
use super::domain::{AttendanceInput, GradeInput, NewAssessment};
use super::gradebook::{Gradebook, GradebookError};
use crate::http::{error_response, run_blocking};
use crate::ids::{AssessmentId, ClassId, EnrollmentId, SessionId, StudentId};

/// Shared state for the gradebook and aggregation endpoints.
#[derive(Clone)]
pub struct AssessmentState {
    pub gradebook: Arc<Gradebook>,
    pub aggregator: Arc<AssessmentAggregator>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenSessionRequest {
    pub(crate) class_id: ClassId,
    pub(crate) held_on: NaiveDate,
    #[serde(default)]
    pub(crate) content: String,
}

pub fn assessment_router(state: AssessmentState) -> Router {
    Router::new()
        .route("/api/v1/classes/:class_id/council", get(council_handler))
        .route(
            "/api/v1/enrollments/:enrollment_id/attendance",
            get(attendance_handler),
        )
        .route("/api/v1/students/:student_id/record", get(record_handler))
        .route("/api/v1/assessments", post(create_assessment_handler))
        .route(
            "/api/v1/assessments/:assessment_id/grades",
            get(grade_sheet_handler).put(record_grades_handler),
        )
        .route("/api/v1/sessions", post(open_session_handler))
        .route(
            "/api/v1/sessions/:session_id/attendance",
            put(record_attendance_handler),
        )
        .with_state(state)
}

pub(crate) async fn council_handler(
    State(state): State<AssessmentState>,
    Path(class_id): Path<i64>,
) -> Response {
    match run_blocking(move || state.aggregator.aggregate_for_council(ClassId(class_id))).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn attendance_handler(
    State(state): State<AssessmentState>,
    Path(enrollment_id): Path<i64>,
) -> Response {
    match run_blocking(move || {
        state.aggregator.aggregate_attendance(EnrollmentId(enrollment_id))
    })
    .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn record_handler(
    State(state): State<AssessmentState>,
    Path(student_id): Path<i64>,
) -> Response {
    match run_blocking(move || {
        state.aggregator.aggregate_personal_record(StudentId(student_id))
    })
    .await
    {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_assessment_handler(
    State(state): State<AssessmentState>,
    Json(request): Json<NewAssessment>,
) -> Response {
    match run_blocking(move || state.gradebook.create_assessment(request)).await {
        Ok(assessment) => (StatusCode::CREATED, Json(assessment)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn grade_sheet_handler(
    State(state): State<AssessmentState>,
    Path(assessment_id): Path<i64>,
) -> Response {
    match run_blocking(move || state.gradebook.grade_sheet(AssessmentId(assessment_id))).await {
        Ok(sheet) => (StatusCode::OK, Json(sheet)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn record_grades_handler(
    State(state): State<AssessmentState>,
    Path(assessment_id): Path<i64>,
    Json(grades): Json<Vec<GradeInput>>,
) -> Response {
    match run_blocking(move || {
        state.gradebook.record_grades(AssessmentId(assessment_id), &grades)
    })
    .await
    {
        Ok(recorded) => (StatusCode::OK, Json(recorded)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn open_session_handler(
    State(state): State<AssessmentState>,
    Json(request): Json<OpenSessionRequest>,
) -> Response {
    match run_blocking(move || {
        state.gradebook.open_session(request.class_id, request.held_on, request.content)
    })
    .await
    {
        Ok(session) => (StatusCode::CREATED, Json(session)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn record_attendance_handler(
    State(state): State<AssessmentState>,
    Path(session_id): Path<i64>,
    Json(marks): Json<Vec<AttendanceInput>>,
) -> Response {
    match run_blocking(move || {
        state.gradebook.record_attendance(SessionId(session_id), &marks)
    })
    .await
    {
        Ok(recorded) => (StatusCode::OK, Json(recorded)).into_response(),
        Err(err) => err.into_response(),
    }
}

impl GradebookError {
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            _ if self.is_not_found() => StatusCode::NOT_FOUND,
            GradebookError::EnrollmentOutsideClass { .. }
            | GradebookError::InvalidGrade { .. }
            | GradebookError::InvalidMaxValue(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GradebookError::Ledger(err) => err.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GradebookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "gradebook failure");
        }
        error_response(status, self)
    }
}

impl AggregationError {
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            _ if self.is_not_found() => StatusCode::NOT_FOUND,
            AggregationError::Ledger(err) => err.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AggregationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "assessment aggregation failure");
        }
        error_response(status, self)
    }
}
