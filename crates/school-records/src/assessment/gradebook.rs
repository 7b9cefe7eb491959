//! Grade and attendance writers. Each batch is applied in one transaction;
//! a single bad row rejects the whole batch.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::domain::{
    Assessment, AttendanceInput, AttendanceRecord, ClassSession, GradeEntry, GradeInput,
    GradeSheetRow, NewAssessment,
};
use crate::enrollment::ledger::active_roster_in;
use crate::enrollment::LedgerError;
use crate::ids::{AssessmentId, ClassId, EnrollmentId, GradeEntryId, SessionId};
use crate::reference::repository::ReferenceReader;
use crate::reference::ReferenceError;
use crate::store::{Database, StoreError};

#[derive(Clone)]
pub struct Gradebook {
    db: Database,
}

impl Gradebook {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create_assessment(&self, new: NewAssessment) -> Result<Assessment, GradebookError> {
        if !(new.max_value.is_finite() && new.max_value > 0.0) {
            return Err(GradebookError::InvalidMaxValue(new.max_value));
        }

        let assessment = self.db.write(|tx| -> Result<_, GradebookError> {
            let reader = ReferenceReader::new(tx);
            reader.class(new.class_id)?;
            if let Some(subject_id) = new.subject_id {
                reader.subject(subject_id)?;
            }

            tx.execute(
                "INSERT INTO assessments (class_id, subject_id, name, held_on, max_value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![new.class_id, new.subject_id, new.name, new.held_on, new.max_value],
            )?;
            Ok(Assessment {
                id: AssessmentId(tx.last_insert_rowid()),
                class_id: new.class_id,
                subject_id: new.subject_id,
                name: new.name,
                held_on: new.held_on,
                max_value: new.max_value,
            })
        })?;

        info!(assessment_id = %assessment.id, class_id = %assessment.class_id, "assessment created");
        Ok(assessment)
    }

    /// Upserts a batch of grades for one assessment.
    pub fn record_grades(
        &self,
        assessment_id: AssessmentId,
        grades: &[GradeInput],
    ) -> Result<Vec<GradeEntry>, GradebookError> {
        let recorded = self.db.write(|tx| {
            let assessment = fetch_assessment(tx, assessment_id)?;
            let mut recorded = Vec::with_capacity(grades.len());

            for grade in grades {
                ensure_enrolled_in(tx, grade.enrollment_id, assessment.class_id)?;
                if let Some(value) = grade.value {
                    if !(value.is_finite() && (0.0..=assessment.max_value).contains(&value)) {
                        return Err(GradebookError::InvalidGrade {
                            enrollment_id: grade.enrollment_id,
                            value,
                            max_value: assessment.max_value,
                        });
                    }
                }

                let id: GradeEntryId = tx.query_row(
                    "INSERT INTO grade_entries (assessment_id, enrollment_id, value)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (assessment_id, enrollment_id)
                     DO UPDATE SET value = excluded.value
                     RETURNING id",
                    params![assessment_id, grade.enrollment_id, grade.value],
                    |row| row.get(0),
                )?;
                recorded.push(GradeEntry {
                    id,
                    assessment_id,
                    enrollment_id: grade.enrollment_id,
                    value: grade.value,
                });
            }

            Ok(recorded)
        })?;

        info!(%assessment_id, count = recorded.len(), "grades recorded");
        Ok(recorded)
    }

    /// Active roster of the assessment's class joined with existing grades.
    pub fn grade_sheet(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<GradeSheetRow>, GradebookError> {
        self.db.read(|conn| {
            let assessment = fetch_assessment(conn, assessment_id)?;
            let mut grade_stmt = conn.prepare(
                "SELECT id, value FROM grade_entries WHERE assessment_id = ?1 AND enrollment_id = ?2",
            )?;

            let mut sheet = Vec::new();
            for entry in active_roster_in(conn, assessment.class_id)? {
                let existing: Option<(GradeEntryId, Option<f64>)> = grade_stmt
                    .query_row(params![assessment_id, entry.enrollment_id], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })
                    .optional()?;
                sheet.push(GradeSheetRow {
                    enrollment_id: entry.enrollment_id,
                    student_name: entry.student_name,
                    grade_id: existing.map(|(id, _)| id),
                    value: existing.and_then(|(_, value)| value),
                });
            }
            Ok(sheet)
        })
    }

    pub fn open_session(
        &self,
        class_id: ClassId,
        held_on: NaiveDate,
        content: impl Into<String>,
    ) -> Result<ClassSession, GradebookError> {
        let content = content.into();
        self.db.write(|tx| {
            ReferenceReader::new(tx).class(class_id)?;
            tx.execute(
                "INSERT INTO class_sessions (class_id, held_on, content) VALUES (?1, ?2, ?3)",
                params![class_id, held_on, content],
            )?;
            Ok(ClassSession {
                id: SessionId(tx.last_insert_rowid()),
                class_id,
                held_on,
                content,
            })
        })
    }

    /// Upserts presence flags for one session.
    pub fn record_attendance(
        &self,
        session_id: SessionId,
        marks: &[AttendanceInput],
    ) -> Result<Vec<AttendanceRecord>, GradebookError> {
        let recorded = self.db.write(|tx| -> Result<_, GradebookError> {
            let class_id: ClassId = tx
                .query_row(
                    "SELECT class_id FROM class_sessions WHERE id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(GradebookError::SessionNotFound(session_id))?;

            let mut recorded = Vec::with_capacity(marks.len());
            for mark in marks {
                ensure_enrolled_in(tx, mark.enrollment_id, class_id)?;
                tx.execute(
                    "INSERT INTO attendance_records (session_id, enrollment_id, present)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (session_id, enrollment_id)
                     DO UPDATE SET present = excluded.present",
                    params![session_id, mark.enrollment_id, mark.present],
                )?;
                recorded.push(AttendanceRecord {
                    session_id,
                    enrollment_id: mark.enrollment_id,
                    present: mark.present,
                });
            }
            Ok(recorded)
        })?;

        info!(%session_id, count = recorded.len(), "attendance recorded");
        Ok(recorded)
    }
}

fn fetch_assessment(conn: &Connection, id: AssessmentId) -> Result<Assessment, GradebookError> {
    conn.query_row(
        "SELECT id, class_id, subject_id, name, held_on, max_value FROM assessments WHERE id = ?1",
        params![id],
        |row| {
            Ok(Assessment {
                id: row.get(0)?,
                class_id: row.get(1)?,
                subject_id: row.get(2)?,
                name: row.get(3)?,
                held_on: row.get(4)?,
                max_value: row.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or(GradebookError::AssessmentNotFound(id))
}

fn ensure_enrolled_in(
    conn: &Connection,
    enrollment_id: EnrollmentId,
    class_id: ClassId,
) -> Result<(), GradebookError> {
    let enrolled_class: ClassId = conn
        .query_row(
            "SELECT class_id FROM enrollments WHERE id = ?1",
            params![enrollment_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(GradebookError::EnrollmentNotFound(enrollment_id))?;

    if enrolled_class != class_id {
        return Err(GradebookError::EnrollmentOutsideClass {
            enrollment_id,
            class_id,
        });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum GradebookError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("assessment {0} not found")]
    AssessmentNotFound(AssessmentId),
    #[error("class session {0} not found")]
    SessionNotFound(SessionId),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    #[error("enrollment {enrollment_id} does not belong to class {class_id}")]
    EnrollmentOutsideClass {
        enrollment_id: EnrollmentId,
        class_id: ClassId,
    },
    #[error("grade {value} for enrollment {enrollment_id} is outside 0..={max_value}")]
    InvalidGrade {
        enrollment_id: EnrollmentId,
        value: f64,
        max_value: f64,
    },
    #[error("assessment max value must be positive, got {0}")]
    InvalidMaxValue(f64),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for GradebookError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(value))
    }
}

impl GradebookError {
    pub fn is_not_found(&self) -> bool {
        match self {
            GradebookError::AssessmentNotFound(_)
            | GradebookError::SessionNotFound(_)
            | GradebookError::EnrollmentNotFound(_)
            | GradebookError::Reference(ReferenceError::NotFound { .. }) => true,
            GradebookError::Ledger(err) => err.is_not_found(),
            _ => false,
        }
    }
}
