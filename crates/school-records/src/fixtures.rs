//! Seeded in-memory network shared by the component tests.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::{Clock, FixedClock};
use crate::reference::{
    AcademicYear, ClassShift, NewAcademicYear, NewClass, NewStudent, ReferenceData, School,
    SchoolClass, Student, Subject,
};
use crate::store::Database;

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(crate) fn today() -> NaiveDate {
    date(2026, 2, 10)
}

/// Two schools, years 2026 (active) and 2027, three classes sharing a
/// Math + Portuguese matrix, and three students.
///
/// Ana and Bruno live in "Centro", zoned to School X. Carla has no registered
/// neighborhood.
pub(crate) struct Network {
    pub(crate) db: Database,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) reference: ReferenceData,
    pub(crate) school_x: School,
    pub(crate) school_y: School,
    pub(crate) year_2026: AcademicYear,
    pub(crate) year_2027: AcademicYear,
    pub(crate) math: Subject,
    pub(crate) portuguese: Subject,
    pub(crate) c1: SchoolClass,
    pub(crate) c2: SchoolClass,
    pub(crate) c3: SchoolClass,
    pub(crate) ana: Student,
    pub(crate) bruno: Student,
    pub(crate) carla: Student,
}

impl Network {
    pub(crate) fn seed() -> Self {
        let db = Database::open_in_memory().expect("in-memory database");
        let reference = ReferenceData::new(db.clone());

        let school_x = reference
            .add_school("School X", Some("35000001".to_string()))
            .expect("school x");
        let school_y = reference.add_school("School Y", None).expect("school y");

        let year_2026 = reference
            .add_academic_year(NewAcademicYear {
                school_id: school_x.id,
                year: 2026,
                starts_on: date(2026, 2, 2),
                ends_on: date(2026, 12, 18),
                is_active: true,
            })
            .expect("year 2026");
        let year_2027 = reference
            .add_academic_year(NewAcademicYear {
                school_id: school_x.id,
                year: 2027,
                starts_on: date(2027, 2, 1),
                ends_on: date(2027, 12, 17),
                is_active: false,
            })
            .expect("year 2027");

        let math = reference.add_subject("Math", "MAT").expect("math");
        let portuguese = reference.add_subject("Portuguese", "POR").expect("portuguese");
        let matrix = reference
            .add_matrix(school_x.id, "Elementary", &[math.id, portuguese.id])
            .expect("matrix");

        let class = |year: &AcademicYear, name: &str, shift: ClassShift| {
            reference
                .add_class(NewClass {
                    academic_year_id: year.id,
                    matrix_id: matrix.id,
                    name: name.to_string(),
                    shift,
                })
                .expect("class")
        };
        let c1 = class(&year_2026, "C1", ClassShift::Morning);
        let c2 = class(&year_2026, "C2", ClassShift::Afternoon);
        let c3 = class(&year_2027, "C3", ClassShift::Morning);

        reference
            .add_zoning_rule("Centro", school_x.id)
            .expect("zoning rule");

        let ana = reference
            .add_student(NewStudent::named("Ana").living_in("Centro"))
            .expect("ana");
        let bruno = reference
            .add_student(NewStudent::named("Bruno").living_in("Centro"))
            .expect("bruno");
        let carla = reference
            .add_student(NewStudent::named("Carla"))
            .expect("carla");

        Self {
            db,
            clock: Arc::new(FixedClock(today())),
            reference,
            school_x,
            school_y,
            year_2026,
            year_2027,
            math,
            portuguese,
            c1,
            c2,
            c3,
            ana,
            bruno,
            carla,
        }
    }
}
