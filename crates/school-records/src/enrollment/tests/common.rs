use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use serde_json::Value;

pub(super) use crate::fixtures::Network;
use crate::enrollment::EnrollmentLedger;

pub(super) fn ledger(network: &Network) -> EnrollmentLedger {
    EnrollmentLedger::with_clock(network.db.clone(), network.clock.clone())
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

pub(super) fn count_enrollments(network: &Network) -> i64 {
    network
        .db
        .read(|conn| {
            conn.query_row("SELECT COUNT(*) FROM enrollments", [], |row| row.get(0))
                .map_err(crate::store::StoreError::from)
        })
        .expect("count enrollments")
}
