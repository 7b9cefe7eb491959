use std::fmt;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::enrollment::EnrollmentView;
use crate::ids::{SchoolId, StudentId, WaitlistEntryId};
use crate::reference::SchoolRef;

/// PENDING is the only state that accepts a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaitlistStatus {
    Pending,
    Allocated,
    Cancelled,
}

impl WaitlistStatus {
    pub const fn label(self) -> &'static str {
        match self {
            WaitlistStatus::Pending => "PENDING",
            WaitlistStatus::Allocated => "ALLOCATED",
            WaitlistStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(WaitlistStatus::Pending),
            "ALLOCATED" => Some(WaitlistStatus::Allocated),
            "CANCELLED" => Some(WaitlistStatus::Cancelled),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, WaitlistStatus::Pending)
    }
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl ToSql for WaitlistStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.label().into())
    }
}

impl FromSql for WaitlistStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        WaitlistStatus::from_label(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown waitlist status `{raw}`").into()))
    }
}

/// Persisted waitlist row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: WaitlistEntryId,
    pub student_id: StudentId,
    pub preferred_school_id: Option<SchoolId>,
    pub request_date: NaiveDate,
    pub status: WaitlistStatus,
}

/// How the placement school of an entry was (or was not) resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Placement {
    /// The family named a school at registration.
    Preferred { school: SchoolRef },
    /// No preference; the student's neighborhood is zoned to this school.
    Zoned { school: SchoolRef },
    /// No preference and no zoning rule for the student's neighborhood.
    NoZoningMatch { neighborhood: Option<String> },
}

impl Placement {
    pub fn school(&self) -> Option<&SchoolRef> {
        match self {
            Placement::Preferred { school } | Placement::Zoned { school } => Some(school),
            Placement::NoZoningMatch { .. } => None,
        }
    }
}

/// Entry as returned to callers, with names and the resolved placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntryView {
    pub id: WaitlistEntryId,
    pub student_id: StudentId,
    pub student_name: String,
    pub resolved_school_name: Option<String>,
    pub placement: Placement,
    pub request_date: NaiveDate,
    pub status: WaitlistStatus,
}

/// Result of a successful allocation: the entry and the enrollment created with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub entry: WaitlistEntryView,
    pub enrollment: EnrollmentView,
}

/// Sort key for first-registered, first-served processing.
pub(crate) fn queue_order(entry: &WaitlistEntry) -> (NaiveDate, WaitlistEntryId) {
    (entry.request_date, entry.id)
}
