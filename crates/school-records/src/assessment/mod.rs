//! Assessment Aggregator and the gradebook writers it reads from.
//!
//! Grades and attendance hang off enrollments; the aggregator rolls them up for
//! the class council and the per-student digest.

pub mod aggregator;
pub mod domain;
pub mod gradebook;
pub mod router;

#[cfg(test)]
mod tests;

pub use aggregator::{AggregationError, AssessmentAggregator};
pub use domain::{
    Assessment, AttendanceInput, AttendanceRecord, AttendanceSummary, ClassSession, CouncilRow,
    GradeEntry, GradeInput, GradeRow, GradeSheetRow, NewAssessment, PersonalRecord, SubjectTotal,
    GENERAL_SUBJECT_LABEL,
};
pub use gradebook::{Gradebook, GradebookError};
pub use router::{assessment_router, AssessmentState};
