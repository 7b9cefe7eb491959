use std::fmt;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::ids::{AcademicYearId, ClassId, EnrollmentId, StudentId};

/// Lifecycle of an enrollment. Only `Active` accepts a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Active,
    Transferred,
    Withdrawn,
    Completed,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "ACTIVE",
            EnrollmentStatus::Transferred => "TRANSFERRED",
            EnrollmentStatus::Withdrawn => "WITHDRAWN",
            EnrollmentStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(EnrollmentStatus::Active),
            "TRANSFERRED" => Some(EnrollmentStatus::Transferred),
            "WITHDRAWN" => Some(EnrollmentStatus::Withdrawn),
            "COMPLETED" => Some(EnrollmentStatus::Completed),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, EnrollmentStatus::Active)
    }

    pub const fn can_transition_to(self, next: EnrollmentStatus) -> bool {
        matches!(self, EnrollmentStatus::Active) && next.is_terminal()
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl ToSql for EnrollmentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.label().into())
    }
}

impl FromSql for EnrollmentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        EnrollmentStatus::from_label(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown enrollment status `{raw}`").into()))
    }
}

/// Enrollment joined with the names and year callers display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentView {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub student_name: String,
    pub class_id: ClassId,
    pub class_name: String,
    pub academic_year_id: AcademicYearId,
    pub academic_year: i32,
    pub enrollment_date: NaiveDate,
    pub status: EnrollmentStatus,
}

/// One ACTIVE enrollment of a class roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub student_name: String,
}

/// Optional filters for audit listings. Empty filter lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentFilter {
    #[serde(default)]
    pub student_id: Option<StudentId>,
    #[serde(default)]
    pub class_id: Option<ClassId>,
    #[serde(default)]
    pub academic_year_id: Option<AcademicYearId>,
    #[serde(default)]
    pub status: Option<EnrollmentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_enrollments_transition() {
        use EnrollmentStatus::*;
        for next in [Transferred, Withdrawn, Completed] {
            assert!(Active.can_transition_to(next));
        }
        assert!(!Active.can_transition_to(Active));
        for terminal in [Transferred, Withdrawn, Completed] {
            for next in [Active, Transferred, Withdrawn, Completed] {
                assert!(!terminal.can_transition_to(next), "{terminal:?} -> {next:?}");
            }
        }
    }

    #[test]
    fn labels_round_trip_through_storage_form() {
        for status in [
            EnrollmentStatus::Active,
            EnrollmentStatus::Transferred,
            EnrollmentStatus::Withdrawn,
            EnrollmentStatus::Completed,
        ] {
            assert_eq!(EnrollmentStatus::from_label(status.label()), Some(status));
        }
        assert_eq!(EnrollmentStatus::from_label("ATIVA"), None);
    }
}
