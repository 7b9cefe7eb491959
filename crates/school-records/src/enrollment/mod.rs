//! Enrollment Ledger: owns enrollment records and enforces that a student holds
//! at most one ACTIVE enrollment per academic year.

pub mod domain;
pub mod ledger;
pub mod router;

#[cfg(test)]
mod tests;

pub use domain::{EnrollmentFilter, EnrollmentStatus, EnrollmentView, RosterEntry};
pub use ledger::{EnrollmentLedger, LedgerError};
pub use router::enrollment_router;
