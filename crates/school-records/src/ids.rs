//! Surrogate integer identifiers for every persisted record.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    self.0.to_sql()
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    i64::column_result(value).map($name)
                }
            }
        )+
    };
}

record_id!(
    SchoolId,
    AcademicYearId,
    SubjectId,
    MatrixId,
    ClassId,
    StudentId,
    ZoningRuleId,
    EnrollmentId,
    /// Identifier of a waitlist entry.
    WaitlistEntryId,
    /// Identifier of a single class meeting that attendance is taken against.
    SessionId,
    AssessmentId,
    GradeEntryId,
);
