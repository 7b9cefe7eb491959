use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{
    AssessmentId, ClassId, EnrollmentId, GradeEntryId, SessionId, StudentId, SubjectId,
};

/// Label used for assessments that are not tied to a subject.
pub const GENERAL_SUBJECT_LABEL: &str = "General";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub class_id: ClassId,
    pub subject_id: Option<SubjectId>,
    pub name: String,
    pub held_on: NaiveDate,
    pub max_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssessment {
    pub class_id: ClassId,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    pub name: String,
    pub held_on: NaiveDate,
    pub max_value: f64,
}

/// One student's mark on one assessment. `None` means not graded yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeEntry {
    pub id: GradeEntryId,
    pub assessment_id: AssessmentId,
    pub enrollment_id: EnrollmentId,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeInput {
    pub enrollment_id: EnrollmentId,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Grade sheet line: every rostered student, graded or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSheetRow {
    pub enrollment_id: EnrollmentId,
    pub student_name: String,
    pub grade_id: Option<GradeEntryId>,
    pub value: Option<f64>,
}

/// A class meeting attendance is taken against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSession {
    pub id: SessionId,
    pub class_id: ClassId,
    pub held_on: NaiveDate,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceInput {
    pub enrollment_id: EnrollmentId,
    pub present: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub session_id: SessionId,
    pub enrollment_id: EnrollmentId,
    pub present: bool,
}

/// Sum of graded values for one curricular-matrix subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectTotal {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub total: f64,
}

/// Council view row: one per ACTIVE enrollment, one total per matrix subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilRow {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub student_name: String,
    pub subject_totals: Vec<SubjectTotal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub present: u32,
    pub total: u32,
    pub percentage: f64,
}

impl AttendanceSummary {
    /// Percentage rounded to one decimal. No sessions yet counts as 100.0.
    pub fn from_counts(present: u32, total: u32) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            (f64::from(present) / f64::from(total) * 1000.0).round() / 10.0
        };
        Self {
            present,
            total,
            percentage,
        }
    }
}

/// Per-assessment line of the personal digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRow {
    pub subject_name: String,
    pub assessment_name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub student_id: StudentId,
    pub student_name: String,
    pub enrollment_id: Option<EnrollmentId>,
    pub class_name: Option<String>,
    pub grade_rows: Vec<GradeRow>,
    pub attendance: AttendanceSummary,
}
