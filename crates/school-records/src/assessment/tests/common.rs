use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::assessment::{
    Assessment, AssessmentAggregator, AssessmentState, GradeInput, Gradebook, NewAssessment,
};
use crate::enrollment::{EnrollmentLedger, EnrollmentView};
pub(super) use crate::fixtures::{date, Network};
use crate::ids::{ClassId, EnrollmentId, SubjectId};

pub(super) fn gradebook(network: &Network) -> Gradebook {
    Gradebook::new(network.db.clone())
}

pub(super) fn aggregator(network: &Network) -> AssessmentAggregator {
    AssessmentAggregator::new(network.db.clone())
}

pub(super) fn state(network: &Network) -> AssessmentState {
    AssessmentState {
        gradebook: Arc::new(gradebook(network)),
        aggregator: Arc::new(aggregator(network)),
    }
}

pub(super) fn enroll(network: &Network, student: &crate::reference::Student, class_id: ClassId) -> EnrollmentView {
    EnrollmentLedger::with_clock(network.db.clone(), network.clock.clone())
        .create_enrollment(student.id, class_id)
        .expect("enrollment created")
}

pub(super) fn assessment(
    network: &Network,
    class_id: ClassId,
    subject_id: Option<SubjectId>,
    name: &str,
    held_on: NaiveDate,
    max_value: f64,
) -> Assessment {
    gradebook(network)
        .create_assessment(NewAssessment {
            class_id,
            subject_id,
            name: name.to_string(),
            held_on,
            max_value,
        })
        .expect("assessment created")
}

pub(super) fn grade(enrollment_id: EnrollmentId, value: Option<f64>) -> GradeInput {
    GradeInput {
        enrollment_id,
        value,
    }
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request builds")
}

pub(super) fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
