use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::clock::FixedClock;
use crate::enrollment::EnrollmentLedger;
pub(super) use crate::fixtures::{date, Network};
use crate::waitlist::WaitlistAllocator;

pub(super) fn allocator(network: &Network) -> WaitlistAllocator {
    WaitlistAllocator::with_clock(network.db.clone(), network.clock.clone())
}

/// Allocator whose clock reads `day`, for entries registered on different dates.
pub(super) fn allocator_on(network: &Network, day: NaiveDate) -> WaitlistAllocator {
    WaitlistAllocator::with_clock(network.db.clone(), Arc::new(FixedClock(day)))
}

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

pub(super) fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
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
