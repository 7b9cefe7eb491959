use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{info, warn};

use super::domain::{EnrollmentFilter, EnrollmentStatus, EnrollmentView, RosterEntry};
use crate::clock::{Clock, SystemClock};
use crate::ids::{AcademicYearId, ClassId, EnrollmentId, StudentId};
use crate::reference::repository::ReferenceReader;
use crate::reference::ReferenceError;
use crate::store::{Database, StoreError};

const ENROLLMENT_VIEW_SQL: &str = "SELECT
    e.id,
    e.student_id,
    s.name,
    e.class_id,
    c.name,
    c.academic_year_id,
    ay.year,
    e.enrolled_on,
    e.status
FROM enrollments e
JOIN students s ON s.id = e.student_id
JOIN classes c ON c.id = e.class_id
JOIN academic_years ay ON ay.id = c.academic_year_id";

/// Owns enrollment records and the one-active-enrollment-per-year rule.
#[derive(Clone)]
pub struct EnrollmentLedger {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl EnrollmentLedger {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Enrolls a student in a class, stamped with today's date.
    ///
    /// Fails with [`LedgerError::EnrollmentConflict`] when the student already
    /// holds an ACTIVE enrollment in any class of the same academic year. The
    /// check and the insert share one IMMEDIATE transaction, and the partial
    /// unique index on `(student_id, academic_year_id)` backs it at the storage
    /// level.
    pub fn create_enrollment(
        &self,
        student_id: StudentId,
        class_id: ClassId,
    ) -> Result<EnrollmentView, LedgerError> {
        let today = self.clock.today();
        let enrollment = self
            .db
            .write(|tx| create_enrollment_in(tx, student_id, class_id, today))?;

        info!(
            enrollment_id = %enrollment.id,
            %student_id,
            %class_id,
            academic_year = enrollment.academic_year,
            "enrollment created"
        );
        Ok(enrollment)
    }

    pub fn get_enrollment(&self, id: EnrollmentId) -> Result<EnrollmentView, LedgerError> {
        self.db
            .read(|conn| fetch_enrollment(conn, id)?.ok_or(LedgerError::EnrollmentNotFound(id)))
    }

    /// ACTIVE enrollments of a class, ordered by student name then enrollment id.
    pub fn list_active_roster(&self, class_id: ClassId) -> Result<Vec<RosterEntry>, LedgerError> {
        self.db.read(|conn| {
            ReferenceReader::new(conn).class(class_id)?;
            active_roster_in(conn, class_id)
        })
    }

    /// Unrestricted listing for audits, ordered by enrollment id.
    pub fn list_enrollments(
        &self,
        filter: &EnrollmentFilter,
    ) -> Result<Vec<EnrollmentView>, LedgerError> {
        let mut sql = format!("{ENROLLMENT_VIEW_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(student_id) = filter.student_id {
            bind_values.push(Value::Integer(student_id.0));
            sql.push_str(&format!(" AND e.student_id = ?{}", bind_values.len()));
        }
        if let Some(class_id) = filter.class_id {
            bind_values.push(Value::Integer(class_id.0));
            sql.push_str(&format!(" AND e.class_id = ?{}", bind_values.len()));
        }
        if let Some(year_id) = filter.academic_year_id {
            bind_values.push(Value::Integer(year_id.0));
            sql.push_str(&format!(" AND c.academic_year_id = ?{}", bind_values.len()));
        }
        if let Some(status) = filter.status {
            bind_values.push(Value::Text(status.label().to_string()));
            sql.push_str(&format!(" AND e.status = ?{}", bind_values.len()));
        }
        sql.push_str(" ORDER BY e.id ASC");

        self.db.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let enrollments = stmt
                .query_map(params_from_iter(bind_values.iter()), parse_enrollment_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(enrollments)
        })
    }

    /// Moves an ACTIVE enrollment to a terminal status.
    ///
    /// Only the status column is written; student, class and year are never
    /// touched by this path and a storage trigger rejects any attempt to.
    pub fn transition_status(
        &self,
        id: EnrollmentId,
        next: EnrollmentStatus,
    ) -> Result<EnrollmentView, LedgerError> {
        let updated = self.db.write(|tx| {
            let current = fetch_enrollment(tx, id)?.ok_or(LedgerError::EnrollmentNotFound(id))?;
            let rejected = LedgerError::InvalidTransition {
                id,
                from: current.status,
                to: next,
            };

            if !current.status.can_transition_to(next) {
                return Err(rejected);
            }

            let changed = tx.execute(
                "UPDATE enrollments SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![next, id, EnrollmentStatus::Active],
            )?;
            if changed == 0 {
                return Err(rejected);
            }

            Ok(EnrollmentView {
                status: next,
                ..current
            })
        });

        match &updated {
            Ok(view) => info!(enrollment_id = %id, status = %view.status, "enrollment transitioned"),
            Err(LedgerError::InvalidTransition { from, to, .. }) => {
                warn!(enrollment_id = %id, %from, %to, "enrollment transition rejected")
            }
            Err(_) => {}
        }
        updated
    }
}

/// Check-and-insert for a new enrollment. Callers must hold a write transaction.
pub(crate) fn create_enrollment_in(
    conn: &Connection,
    student_id: StudentId,
    class_id: ClassId,
    today: NaiveDate,
) -> Result<EnrollmentView, LedgerError> {
    let reader = ReferenceReader::new(conn);
    let student = reader.student(student_id)?;
    let placement = reader.class_placement(class_id)?;
    let year = &placement.academic_year;

    let conflict = || LedgerError::EnrollmentConflict {
        student_id,
        student_name: student.name.clone(),
        academic_year_id: year.id,
        year: year.year,
    };

    if let Some(existing) = active_enrollment_in_year(conn, student_id, year.id)? {
        warn!(
            %student_id,
            %class_id,
            existing_enrollment = %existing,
            academic_year = year.year,
            "enrollment conflict"
        );
        return Err(conflict());
    }

    let already_in_class: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM enrollments WHERE student_id = ?1 AND class_id = ?2)",
        params![student_id, class_id],
        |row| row.get(0),
    )?;
    if already_in_class {
        return Err(LedgerError::DuplicateEnrollment {
            student_id,
            class_id,
        });
    }

    let inserted = conn.execute(
        "INSERT INTO enrollments (student_id, class_id, academic_year_id, enrolled_on, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![student_id, class_id, year.id, today, EnrollmentStatus::Active],
    );
    match inserted.map_err(StoreError::from) {
        Ok(_) => {}
        Err(err) if err.is_unique_violation("academic_year_id") => return Err(conflict()),
        Err(err) if err.is_unique_violation("class_id") => {
            return Err(LedgerError::DuplicateEnrollment {
                student_id,
                class_id,
            })
        }
        Err(err) => return Err(err.into()),
    }

    Ok(EnrollmentView {
        id: EnrollmentId(conn.last_insert_rowid()),
        student_id,
        student_name: student.name,
        class_id,
        class_name: placement.class.name,
        academic_year_id: year.id,
        academic_year: year.year,
        enrollment_date: today,
        status: EnrollmentStatus::Active,
    })
}

/// Looks for an ACTIVE enrollment of the student in any class of `year_id`,
/// reaching the year through the class rather than the enrollment row.
pub(crate) fn active_enrollment_in_year(
    conn: &Connection,
    student_id: StudentId,
    year_id: AcademicYearId,
) -> Result<Option<EnrollmentId>, LedgerError> {
    let existing = conn
        .query_row(
            "SELECT e.id
             FROM enrollments e
             JOIN classes c ON c.id = e.class_id
             WHERE e.student_id = ?1
               AND c.academic_year_id = ?2
               AND e.status = ?3
             LIMIT 1",
            params![student_id, year_id, EnrollmentStatus::Active],
            |row| row.get(0),
        )
        .optional()?;
    Ok(existing)
}

pub(crate) fn fetch_enrollment(
    conn: &Connection,
    id: EnrollmentId,
) -> Result<Option<EnrollmentView>, LedgerError> {
    let enrollment = conn
        .query_row(
            &format!("{ENROLLMENT_VIEW_SQL} WHERE e.id = ?1"),
            params![id],
            parse_enrollment_row,
        )
        .optional()?;
    Ok(enrollment)
}

pub(crate) fn active_roster_in(
    conn: &Connection,
    class_id: ClassId,
) -> Result<Vec<RosterEntry>, LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.student_id, s.name
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         WHERE e.class_id = ?1 AND e.status = ?2
         ORDER BY s.name COLLATE NOCASE ASC, e.id ASC",
    )?;
    let roster = stmt
        .query_map(params![class_id, EnrollmentStatus::Active], |row| {
            Ok(RosterEntry {
                enrollment_id: row.get(0)?,
                student_id: row.get(1)?,
                student_name: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(roster)
}

/// The student's current ACTIVE enrollment.
///
/// A student can be ACTIVE once per academic year, so when several years are
/// open the enrollment in an active year wins, then the most recent year.
pub(crate) fn current_active_enrollment(
    conn: &Connection,
    student_id: StudentId,
) -> Result<Option<EnrollmentView>, LedgerError> {
    let enrollment = conn
        .query_row(
            &format!(
                "{ENROLLMENT_VIEW_SQL}
                 WHERE e.student_id = ?1 AND e.status = ?2
                 ORDER BY ay.is_active DESC, ay.year DESC, e.id DESC
                 LIMIT 1"
            ),
            params![student_id, EnrollmentStatus::Active],
            parse_enrollment_row,
        )
        .optional()?;
    Ok(enrollment)
}

fn parse_enrollment_row(row: &Row<'_>) -> rusqlite::Result<EnrollmentView> {
    Ok(EnrollmentView {
        id: row.get(0)?,
        student_id: row.get(1)?,
        student_name: row.get(2)?,
        class_id: row.get(3)?,
        class_name: row.get(4)?,
        academic_year_id: row.get(5)?,
        academic_year: row.get(6)?,
        enrollment_date: row.get(7)?,
        status: row.get(8)?,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    #[error("student {student_name} already has an active enrollment in academic year {year}")]
    EnrollmentConflict {
        student_id: StudentId,
        student_name: String,
        academic_year_id: AcademicYearId,
        year: i32,
    },
    #[error("student {student_id} is already enrolled in class {class_id}")]
    DuplicateEnrollment {
        student_id: StudentId,
        class_id: ClassId,
    },
    #[error("enrollment {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: EnrollmentId,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(value))
    }
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::EnrollmentNotFound(_) | LedgerError::Reference(ReferenceError::NotFound { .. })
        )
    }
}
