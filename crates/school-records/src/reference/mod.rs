//! Read-mostly reference data: schools, academic years, subjects, curricular
//! matrices, classes, students and zoning rules.
//!
//! The core only needs plain record access here. Full administrative CRUD for
//! these records belongs to the surrounding secretariat tooling.

pub mod domain;
pub mod repository;

pub use domain::{
    AcademicYear, ClassShift, CurricularMatrix, NewAcademicYear, NewClass, NewStudent, School,
    SchoolClass, SchoolRef, Student, Subject, ZoningRule,
};
pub use repository::{RecordKind, ReferenceData, ReferenceError};
