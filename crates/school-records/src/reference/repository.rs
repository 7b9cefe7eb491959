use std::fmt;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::domain::{
    neighborhood_key, AcademicYear, CurricularMatrix, NewAcademicYear, NewClass, NewStudent,
    School, SchoolClass, Student, Subject, ZoningRule,
};
use crate::ids::{AcademicYearId, ClassId, MatrixId, SchoolId, StudentId, SubjectId, ZoningRuleId};
use crate::store::{Database, StoreError};

/// Kind of reference record, used to name what was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    School,
    AcademicYear,
    Subject,
    Matrix,
    Class,
    Student,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordKind::School => "school",
            RecordKind::AcademicYear => "academic year",
            RecordKind::Subject => "subject",
            RecordKind::Matrix => "curricular matrix",
            RecordKind::Class => "class",
            RecordKind::Student => "student",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: i64 },
    #[error("neighborhood `{0}` is already zoned")]
    DuplicateNeighborhood(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for ReferenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(value))
    }
}

impl ReferenceError {
    fn missing(kind: RecordKind, id: i64) -> Self {
        Self::NotFound { kind, id }
    }
}

/// Record access for the reference data collaborator.
#[derive(Clone)]
pub struct ReferenceData {
    db: Database,
}

impl ReferenceData {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn add_school(
        &self,
        name: impl Into<String>,
        inep_code: Option<String>,
    ) -> Result<School, ReferenceError> {
        let name = name.into();
        self.db.write(|tx| {
            tx.execute(
                "INSERT INTO schools (name, inep_code) VALUES (?1, ?2)",
                params![name, inep_code],
            )?;
            Ok(School {
                id: SchoolId(tx.last_insert_rowid()),
                name,
                inep_code,
            })
        })
    }

    pub fn add_academic_year(&self, year: NewAcademicYear) -> Result<AcademicYear, ReferenceError> {
        self.db.write(|tx| {
            ReferenceReader::new(tx).school(year.school_id)?;
            tx.execute(
                "INSERT INTO academic_years (school_id, year, starts_on, ends_on, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    year.school_id,
                    year.year,
                    year.starts_on,
                    year.ends_on,
                    year.is_active
                ],
            )?;
            Ok(AcademicYear {
                id: AcademicYearId(tx.last_insert_rowid()),
                school_id: year.school_id,
                year: year.year,
                starts_on: year.starts_on,
                ends_on: year.ends_on,
                is_active: year.is_active,
            })
        })
    }

    pub fn add_subject(
        &self,
        name: impl Into<String>,
        code: impl Into<String>,
    ) -> Result<Subject, ReferenceError> {
        let (name, code) = (name.into(), code.into());
        self.db.write(|tx| {
            tx.execute(
                "INSERT INTO subjects (name, code) VALUES (?1, ?2)",
                params![name, code],
            )?;
            Ok(Subject {
                id: SubjectId(tx.last_insert_rowid()),
                name,
                code,
            })
        })
    }

    /// Creates a matrix whose subject order is the order of `subject_ids`.
    pub fn add_matrix(
        &self,
        school_id: SchoolId,
        name: impl Into<String>,
        subject_ids: &[SubjectId],
    ) -> Result<CurricularMatrix, ReferenceError> {
        let name = name.into();
        self.db.write(|tx| {
            let reader = ReferenceReader::new(tx);
            reader.school(school_id)?;
            tx.execute(
                "INSERT INTO curricular_matrices (school_id, name) VALUES (?1, ?2)",
                params![school_id, name],
            )?;
            let id = MatrixId(tx.last_insert_rowid());

            for (position, subject_id) in subject_ids.iter().enumerate() {
                reader.subject(*subject_id)?;
                tx.execute(
                    "INSERT INTO matrix_subjects (matrix_id, subject_id, position)
                     VALUES (?1, ?2, ?3)",
                    params![id, subject_id, position as i64],
                )?;
            }

            reader.matrix(id)
        })
    }

    pub fn add_class(&self, class: NewClass) -> Result<SchoolClass, ReferenceError> {
        self.db.write(|tx| {
            let reader = ReferenceReader::new(tx);
            reader.academic_year(class.academic_year_id)?;
            reader.matrix(class.matrix_id)?;
            tx.execute(
                "INSERT INTO classes (academic_year_id, matrix_id, name, shift)
                 VALUES (?1, ?2, ?3, ?4)",
                params![class.academic_year_id, class.matrix_id, class.name, class.shift],
            )?;
            Ok(SchoolClass {
                id: ClassId(tx.last_insert_rowid()),
                academic_year_id: class.academic_year_id,
                matrix_id: class.matrix_id,
                name: class.name,
                shift: class.shift,
            })
        })
    }

    pub fn add_student(&self, student: NewStudent) -> Result<Student, ReferenceError> {
        let neighborhood = student
            .neighborhood
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self.db.write(|tx| {
            tx.execute(
                "INSERT INTO students (name, birth_date, neighborhood) VALUES (?1, ?2, ?3)",
                params![student.name, student.birth_date, neighborhood],
            )?;
            Ok(Student {
                id: StudentId(tx.last_insert_rowid()),
                name: student.name,
                birth_date: student.birth_date,
                neighborhood,
            })
        })
    }

    pub fn add_zoning_rule(
        &self,
        neighborhood: impl Into<String>,
        school_id: SchoolId,
    ) -> Result<ZoningRule, ReferenceError> {
        let neighborhood = neighborhood.into().trim().to_string();
        self.db.write(|tx| {
            ReferenceReader::new(tx).school(school_id)?;
            let inserted = tx.execute(
                "INSERT INTO zoning_rules (neighborhood, neighborhood_key, school_id)
                 VALUES (?1, ?2, ?3)",
                params![neighborhood, neighborhood_key(&neighborhood), school_id],
            );
            match inserted.map_err(StoreError::from) {
                Ok(_) => Ok(ZoningRule {
                    id: ZoningRuleId(tx.last_insert_rowid()),
                    neighborhood: neighborhood.clone(),
                    school_id,
                }),
                Err(err) if err.is_unique_violation("zoning_rules.neighborhood_key") => {
                    Err(ReferenceError::DuplicateNeighborhood(neighborhood.clone()))
                }
                Err(err) => Err(err.into()),
            }
        })
    }

    pub fn student(&self, id: StudentId) -> Result<Student, ReferenceError> {
        self.db.read(|conn| ReferenceReader::new(conn).student(id))
    }

    pub fn school(&self, id: SchoolId) -> Result<School, ReferenceError> {
        self.db.read(|conn| ReferenceReader::new(conn).school(id))
    }

    pub fn class(&self, id: ClassId) -> Result<SchoolClass, ReferenceError> {
        self.db.read(|conn| ReferenceReader::new(conn).class(id))
    }

    pub fn matrix(&self, id: MatrixId) -> Result<CurricularMatrix, ReferenceError> {
        self.db.read(|conn| ReferenceReader::new(conn).matrix(id))
    }

    pub fn zoning_rules(&self) -> Result<Vec<ZoningRule>, ReferenceError> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, neighborhood, school_id FROM zoning_rules ORDER BY neighborhood_key, id",
            )?;
            let rules = stmt
                .query_map([], parse_zoning_rule)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rules)
        })
    }
}

/// A class together with the academic year and school it resolves to.
#[derive(Debug, Clone)]
pub(crate) struct ClassPlacement {
    pub class: SchoolClass,
    pub academic_year: AcademicYear,
}

/// Borrowing reader used inside transactions owned by the core components.
pub(crate) struct ReferenceReader<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ReferenceReader<'conn> {
    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn student(&self, id: StudentId) -> Result<Student, ReferenceError> {
        self.conn
            .query_row(
                "SELECT id, name, birth_date, neighborhood FROM students WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Student {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        birth_date: row.get(2)?,
                        neighborhood: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| ReferenceError::missing(RecordKind::Student, id.0))
    }

    pub(crate) fn school(&self, id: SchoolId) -> Result<School, ReferenceError> {
        self.conn
            .query_row(
                "SELECT id, name, inep_code FROM schools WHERE id = ?1",
                params![id],
                |row| {
                    Ok(School {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        inep_code: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| ReferenceError::missing(RecordKind::School, id.0))
    }

    pub(crate) fn subject(&self, id: SubjectId) -> Result<Subject, ReferenceError> {
        self.conn
            .query_row(
                "SELECT id, name, code FROM subjects WHERE id = ?1",
                params![id],
                parse_subject,
            )
            .optional()?
            .ok_or_else(|| ReferenceError::missing(RecordKind::Subject, id.0))
    }

    pub(crate) fn academic_year(&self, id: AcademicYearId) -> Result<AcademicYear, ReferenceError> {
        self.conn
            .query_row(
                "SELECT id, school_id, year, starts_on, ends_on, is_active
                 FROM academic_years WHERE id = ?1",
                params![id],
                parse_academic_year,
            )
            .optional()?
            .ok_or_else(|| ReferenceError::missing(RecordKind::AcademicYear, id.0))
    }

    pub(crate) fn class(&self, id: ClassId) -> Result<SchoolClass, ReferenceError> {
        self.conn
            .query_row(
                "SELECT id, academic_year_id, matrix_id, name, shift FROM classes WHERE id = ?1",
                params![id],
                |row| {
                    Ok(SchoolClass {
                        id: row.get(0)?,
                        academic_year_id: row.get(1)?,
                        matrix_id: row.get(2)?,
                        name: row.get(3)?,
                        shift: row.get(4)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| ReferenceError::missing(RecordKind::Class, id.0))
    }

    /// Follows class → academic year so callers never compare years directly.
    pub(crate) fn class_placement(&self, id: ClassId) -> Result<ClassPlacement, ReferenceError> {
        let class = self.class(id)?;
        let academic_year = self.academic_year(class.academic_year_id)?;
        Ok(ClassPlacement {
            class,
            academic_year,
        })
    }

    pub(crate) fn matrix(&self, id: MatrixId) -> Result<CurricularMatrix, ReferenceError> {
        let (school_id, name) = self
            .conn
            .query_row(
                "SELECT school_id, name FROM curricular_matrices WHERE id = ?1",
                params![id],
                |row| Ok((row.get::<_, SchoolId>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?
            .ok_or_else(|| ReferenceError::missing(RecordKind::Matrix, id.0))?;

        Ok(CurricularMatrix {
            id,
            school_id,
            name,
            subjects: self.matrix_subjects(id)?,
        })
    }

    /// Subjects of a matrix in matrix order.
    pub(crate) fn matrix_subjects(&self, id: MatrixId) -> Result<Vec<Subject>, ReferenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.name, s.code
             FROM matrix_subjects ms
             JOIN subjects s ON s.id = ms.subject_id
             WHERE ms.matrix_id = ?1
             ORDER BY ms.position",
        )?;
        let subjects = stmt
            .query_map(params![id], parse_subject)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subjects)
    }

    pub(crate) fn zoning_rule_for(
        &self,
        neighborhood: &str,
    ) -> Result<Option<ZoningRule>, ReferenceError> {
        let rule = self
            .conn
            .query_row(
                "SELECT id, neighborhood, school_id FROM zoning_rules WHERE neighborhood_key = ?1",
                params![neighborhood_key(neighborhood)],
                parse_zoning_rule,
            )
            .optional()?;
        debug!(neighborhood, matched = rule.is_some(), "zoning lookup");
        Ok(rule)
    }
}

fn parse_subject(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
    })
}

fn parse_academic_year(row: &Row<'_>) -> rusqlite::Result<AcademicYear> {
    Ok(AcademicYear {
        id: row.get(0)?,
        school_id: row.get(1)?,
        year: row.get(2)?,
        starts_on: row.get(3)?,
        ends_on: row.get(4)?,
        is_active: row.get(5)?,
    })
}

fn parse_zoning_rule(row: &Row<'_>) -> rusqlite::Result<ZoningRule> {
    Ok(ZoningRule {
        id: row.get(0)?,
        neighborhood: row.get(1)?,
        school_id: row.get(2)?,
    })
}
