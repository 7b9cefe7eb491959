use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{AcademicYearId, ClassId, MatrixId, SchoolId, StudentId, SubjectId, ZoningRuleId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    pub inep_code: Option<String>,
}

impl School {
    pub fn to_ref(&self) -> SchoolRef {
        SchoolRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Id and display name, embedded in views that point at a school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolRef {
    pub id: SchoolId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicYear {
    pub id: AcademicYearId,
    pub school_id: SchoolId,
    pub year: i32,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAcademicYear {
    pub school_id: SchoolId,
    pub year: i32,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub code: String,
}

/// Ordered list of subjects taught to a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurricularMatrix {
    pub id: MatrixId,
    pub school_id: SchoolId,
    pub name: String,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassShift {
    Morning,
    Afternoon,
    Evening,
    FullDay,
}

impl ClassShift {
    pub const fn as_db(self) -> &'static str {
        match self {
            ClassShift::Morning => "MORNING",
            ClassShift::Afternoon => "AFTERNOON",
            ClassShift::Evening => "EVENING",
            ClassShift::FullDay => "FULL_DAY",
        }
    }

    pub fn from_db(raw: &str) -> Option<Self> {
        match raw {
            "MORNING" => Some(ClassShift::Morning),
            "AFTERNOON" => Some(ClassShift::Afternoon),
            "EVENING" => Some(ClassShift::Evening),
            "FULL_DAY" => Some(ClassShift::FullDay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: ClassId,
    pub academic_year_id: AcademicYearId,
    pub matrix_id: MatrixId,
    pub name: String,
    pub shift: ClassShift,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClass {
    pub academic_year_id: AcademicYearId,
    pub matrix_id: MatrixId,
    pub name: String,
    pub shift: ClassShift,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    /// Registered residential neighborhood, the key used for zoning.
    pub neighborhood: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewStudent {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub neighborhood: Option<String>,
}

impl NewStudent {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn living_in(mut self, neighborhood: impl Into<String>) -> Self {
        self.neighborhood = Some(neighborhood.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoningRule {
    pub id: ZoningRuleId,
    pub neighborhood: String,
    pub school_id: SchoolId,
}

/// Lookup key for a neighborhood: trimmed and lowercased over full Unicode,
/// so "JARDIM AMÉRICA" and "Jardim América" name the same place.
pub(crate) fn neighborhood_key(neighborhood: &str) -> String {
    neighborhood.trim().to_lowercase()
}

impl rusqlite::types::ToSql for ClassShift {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(self.as_db().into())
    }
}

impl rusqlite::types::FromSql for ClassShift {
    fn column_result(
        value: rusqlite::types::ValueRef<'_>,
    ) -> rusqlite::types::FromSqlResult<Self> {
        let raw = value.as_str()?;
        ClassShift::from_db(raw).ok_or_else(|| {
            rusqlite::types::FromSqlError::Other(format!("unknown class shift `{raw}`").into())
        })
    }
}
