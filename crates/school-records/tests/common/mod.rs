#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;

use school_records::clock::{Clock, FixedClock};
use school_records::enrollment::EnrollmentLedger;
use school_records::reference::{
    AcademicYear, ClassShift, NewAcademicYear, NewClass, NewStudent, ReferenceData, School,
    SchoolClass, Student, Subject,
};
use school_records::store::{Database, StoreError};
use school_records::waitlist::WaitlistAllocator;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(date(2026, 2, 10)))
}

/// School X with years 2026 and 2027, classes C1/C2 (2026) and C3 (2027),
/// a Math + Portuguese matrix, "Centro" zoned to School X, and students
/// Ana and Bruno living there.
pub struct Seed {
    pub reference: ReferenceData,
    pub school: School,
    pub year_2026: AcademicYear,
    pub year_2027: AcademicYear,
    pub math: Subject,
    pub portuguese: Subject,
    pub c1: SchoolClass,
    pub c2: SchoolClass,
    pub c3: SchoolClass,
    pub ana: Student,
    pub bruno: Student,
}

pub fn seed(db: &Database) -> Seed {
    let reference = ReferenceData::new(db.clone());
    let school = reference.add_school("School X", None).expect("school");
    let year = |year: i32, is_active: bool| {
        reference
            .add_academic_year(NewAcademicYear {
                school_id: school.id,
                year,
                starts_on: date(year, 2, 1),
                ends_on: date(year, 12, 15),
                is_active,
            })
            .expect("academic year")
    };
    let year_2026 = year(2026, true);
    let year_2027 = year(2027, false);

    let math = reference.add_subject("Math", "MAT").expect("math");
    let portuguese = reference.add_subject("Portuguese", "POR").expect("portuguese");
    let matrix = reference
        .add_matrix(school.id, "Elementary", &[math.id, portuguese.id])
        .expect("matrix");
    let class = |year: &AcademicYear, name: &str| {
        reference
            .add_class(NewClass {
                academic_year_id: year.id,
                matrix_id: matrix.id,
                name: name.to_string(),
                shift: ClassShift::Morning,
            })
            .expect("class")
    };
    let c1 = class(&year_2026, "C1");
    let c2 = class(&year_2026, "C2");
    let c3 = class(&year_2027, "C3");

    reference
        .add_zoning_rule("Centro", school.id)
        .expect("zoning rule");
    let ana = reference
        .add_student(NewStudent::named("Ana").living_in("Centro"))
        .expect("ana");
    let bruno = reference
        .add_student(NewStudent::named("Bruno").living_in("Centro"))
        .expect("bruno");

    Seed {
        reference,
        school,
        year_2026,
        year_2027,
        math,
        portuguese,
        c1,
        c2,
        c3,
        ana,
        bruno,
    }
}

pub fn in_memory() -> (Database, Seed) {
    let db = Database::open_in_memory().expect("in-memory database");
    let seed = seed(&db);
    (db, seed)
}

pub fn ledger(db: &Database) -> EnrollmentLedger {
    EnrollmentLedger::with_clock(db.clone(), clock())
}

pub fn allocator(db: &Database) -> WaitlistAllocator {
    WaitlistAllocator::with_clock(db.clone(), clock())
}

pub fn count(db: &Database, table: &str) -> i64 {
    db.read(|conn| -> Result<i64, StoreError> {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
    })
    .expect("row count")
}
