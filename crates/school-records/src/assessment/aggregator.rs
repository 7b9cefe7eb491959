//! Read-only roll-ups for academic review and personal digests.
//!
//! Nothing here takes a write lock. Missing grades or attendance degrade to the
//! documented defaults (total 0.0, attendance 100.0) instead of failing.

use std::collections::HashMap;

use rusqlite::{params, Connection};
use tracing::debug;

use super::domain::{
    AttendanceSummary, CouncilRow, GradeRow, PersonalRecord, SubjectTotal, GENERAL_SUBJECT_LABEL,
};
use crate::enrollment::ledger::{active_roster_in, current_active_enrollment, fetch_enrollment};
use crate::enrollment::LedgerError;
use crate::ids::{ClassId, EnrollmentId, StudentId, SubjectId};
use crate::reference::repository::ReferenceReader;
use crate::reference::ReferenceError;
use crate::store::{Database, StoreError};

#[derive(Clone)]
pub struct AssessmentAggregator {
    db: Database,
}

impl AssessmentAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// One row per ACTIVE enrollment (roster order), one total per matrix
    /// subject (matrix order). Assessments without a subject are left out.
    pub fn aggregate_for_council(&self, class_id: ClassId) -> Result<Vec<CouncilRow>, AggregationError> {
        self.db.read(|conn| {
            let reader = ReferenceReader::new(conn);
            let class = reader.class(class_id)?;
            let subjects = reader.matrix_subjects(class.matrix_id)?;
            let roster = active_roster_in(conn, class_id)?;
            let totals = index_grade_totals(graded_subject_entries(conn, class_id)?);

            let rows: Vec<CouncilRow> = roster
                .into_iter()
                .map(|entry| CouncilRow {
                    subject_totals: subjects
                        .iter()
                        .map(|subject| SubjectTotal {
                            subject_id: subject.id,
                            subject_name: subject.name.clone(),
                            total: totals
                                .get(&(entry.enrollment_id, subject.id))
                                .copied()
                                .unwrap_or(0.0),
                        })
                        .collect(),
                    enrollment_id: entry.enrollment_id,
                    student_id: entry.student_id,
                    student_name: entry.student_name,
                })
                .collect();

            debug!(%class_id, students = rows.len(), subjects = subjects.len(), "council aggregation");
            Ok(rows)
        })
    }

    pub fn aggregate_attendance(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<AttendanceSummary, AggregationError> {
        self.db.read(|conn| {
            fetch_enrollment(conn, enrollment_id)?
                .ok_or(AggregationError::EnrollmentNotFound(enrollment_id))?;
            attendance_for(conn, enrollment_id)
        })
    }

    /// Digest of the student's current ACTIVE enrollment.
    ///
    /// Without one, the digest has no class, no grade rows and the empty
    /// attendance default.
    pub fn aggregate_personal_record(
        &self,
        student_id: StudentId,
    ) -> Result<PersonalRecord, AggregationError> {
        self.db.read(|conn| {
            let student = ReferenceReader::new(conn).student(student_id)?;

            let Some(enrollment) = current_active_enrollment(conn, student_id)? else {
                return Ok(PersonalRecord {
                    student_id,
                    student_name: student.name,
                    enrollment_id: None,
                    class_name: None,
                    grade_rows: Vec::new(),
                    attendance: AttendanceSummary::from_counts(0, 0),
                });
            };

            Ok(PersonalRecord {
                student_id,
                student_name: student.name,
                enrollment_id: Some(enrollment.id),
                class_name: Some(enrollment.class_name),
                grade_rows: grade_rows_for(conn, enrollment.id)?,
                attendance: attendance_for(conn, enrollment.id)?,
            })
        })
    }
}

/// Sums graded values per (enrollment, subject) in a single pass.
pub(crate) fn index_grade_totals(
    entries: impl IntoIterator<Item = (EnrollmentId, SubjectId, f64)>,
) -> HashMap<(EnrollmentId, SubjectId), f64> {
    let mut totals = HashMap::new();
    for (enrollment_id, subject_id, value) in entries {
        *totals.entry((enrollment_id, subject_id)).or_insert(0.0) += value;
    }
    totals
}

/// Graded (non-null) entries of the class's enrollments on subject-bound assessments.
fn graded_subject_entries(
    conn: &Connection,
    class_id: ClassId,
) -> Result<Vec<(EnrollmentId, SubjectId, f64)>, AggregationError> {
    let mut stmt = conn.prepare(
        "SELECT g.enrollment_id, a.subject_id, g.value
         FROM grade_entries g
         JOIN assessments a ON a.id = g.assessment_id
         JOIN enrollments e ON e.id = g.enrollment_id
         WHERE e.class_id = ?1
           AND a.subject_id IS NOT NULL
           AND g.value IS NOT NULL",
    )?;
    let entries = stmt
        .query_map(params![class_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

fn attendance_for(
    conn: &Connection,
    enrollment_id: EnrollmentId,
) -> Result<AttendanceSummary, AggregationError> {
    let (total, present): (u32, u32) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(present), 0)
         FROM attendance_records
         WHERE enrollment_id = ?1",
        params![enrollment_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(AttendanceSummary::from_counts(present, total))
}

fn grade_rows_for(
    conn: &Connection,
    enrollment_id: EnrollmentId,
) -> Result<Vec<GradeRow>, AggregationError> {
    let mut stmt = conn.prepare(
        "SELECT s.name, a.name, g.value
         FROM grade_entries g
         JOIN assessments a ON a.id = g.assessment_id
         LEFT JOIN subjects s ON s.id = a.subject_id
         WHERE g.enrollment_id = ?1
         ORDER BY a.held_on ASC, a.id ASC",
    )?;
    let rows = stmt
        .query_map(params![enrollment_id], |row| {
            let subject_name: Option<String> = row.get(0)?;
            let value: Option<f64> = row.get(2)?;
            Ok(GradeRow {
                subject_name: subject_name.unwrap_or_else(|| GENERAL_SUBJECT_LABEL.to_string()),
                assessment_name: row.get(1)?,
                value: value.unwrap_or(0.0),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for AggregationError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(value))
    }
}

impl AggregationError {
    pub fn is_not_found(&self) -> bool {
        match self {
            AggregationError::EnrollmentNotFound(_)
            | AggregationError::Reference(ReferenceError::NotFound { .. }) => true,
            AggregationError::Ledger(err) => err.is_not_found(),
            _ => false,
        }
    }
}
