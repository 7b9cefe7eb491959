//! Transactional core of a municipal school secretariat: enrollments, the
//! placement waitlist and the academic roll-ups built on top of them.

use std::sync::Arc;

use axum::Router;

pub mod assessment;
pub mod clock;
pub mod config;
pub mod enrollment;
pub mod error;
pub(crate) mod http;
pub mod ids;
pub mod reference;
pub mod store;
pub mod telemetry;
pub mod waitlist;

#[cfg(test)]
pub(crate) mod fixtures;

use assessment::{assessment_router, AssessmentAggregator, AssessmentState, Gradebook};
use clock::Clock;
use enrollment::{enrollment_router, EnrollmentLedger};
use store::Database;
use waitlist::{waitlist_router, WaitlistAllocator};

/// Every component router over one shared database.
pub fn api_router(db: Database, clock: Arc<dyn Clock>) -> Router {
    let ledger = Arc::new(EnrollmentLedger::with_clock(db.clone(), clock.clone()));
    let allocator = Arc::new(WaitlistAllocator::with_clock(db.clone(), clock));
    let assessments = AssessmentState {
        gradebook: Arc::new(Gradebook::new(db.clone())),
        aggregator: Arc::new(AssessmentAggregator::new(db)),
    };

    enrollment_router(ledger)
        .merge(waitlist_router(allocator))
        .merge(assessment_router(assessments))
}
