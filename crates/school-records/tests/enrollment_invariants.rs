//! One ACTIVE enrollment per student per academic year, enforced by the ledger
//! and backed by the storage layer.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use school_records::enrollment::{EnrollmentFilter, EnrollmentStatus, LedgerError};
use school_records::store::{Database, StoreError};

use common::*;

#[test]
fn conflicting_enrollment_names_the_year_and_writes_nothing() {
    let (db, seed) = in_memory();
    let ledger = ledger(&db);
    ledger
        .create_enrollment(seed.ana.id, seed.c1.id)
        .expect("C1 enrollment");
    let before = count(&db, "enrollments");

    let err = ledger
        .create_enrollment(seed.ana.id, seed.c2.id)
        .expect_err("second class in 2026");

    assert!(matches!(err, LedgerError::EnrollmentConflict { .. }));
    assert!(err.to_string().contains("2026"), "{err}");
    assert_eq!(count(&db, "enrollments"), before);

    let next_year = ledger
        .create_enrollment(seed.ana.id, seed.c3.id)
        .expect("2027 enrollment");
    assert_eq!(next_year.academic_year, 2027);
}

#[test]
fn every_student_has_at_most_one_active_enrollment_per_year() {
    let (db, seed) = in_memory();
    let ledger = ledger(&db);
    let attempts = [
        (seed.ana.id, seed.c1.id),
        (seed.ana.id, seed.c2.id),
        (seed.ana.id, seed.c3.id),
        (seed.bruno.id, seed.c2.id),
        (seed.bruno.id, seed.c1.id),
    ];
    for (student_id, class_id) in attempts {
        let _ = ledger.create_enrollment(student_id, class_id);
    }

    let active = ledger
        .list_enrollments(&EnrollmentFilter {
            status: Some(EnrollmentStatus::Active),
            ..EnrollmentFilter::default()
        })
        .expect("active enrollments");
    let mut keys: Vec<_> = active
        .iter()
        .map(|enrollment| (enrollment.student_id, enrollment.academic_year_id))
        .collect();
    let total = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), total);
    assert_eq!(total, 3);
}

#[test]
fn concurrent_enrollments_in_one_year_admit_exactly_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("race.db");
    let seed = seed(&Database::open(&path).expect("seed handle"));

    let workers = 4;
    let barrier = Arc::new(Barrier::new(workers));
    let classes = [seed.c1.id, seed.c2.id, seed.c1.id, seed.c2.id];
    let handles: Vec<_> = classes
        .into_iter()
        .map(|class_id| {
            let db = Database::open(&path).expect("worker handle");
            let barrier = barrier.clone();
            let student_id = seed.ana.id;
            thread::spawn(move || {
                barrier.wait();
                ledger(&db).create_enrollment(student_id, class_id)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker finished"))
        .collect();

    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1, "{results:?}");
    assert!(results.iter().filter_map(|result| result.as_ref().err()).all(|err| matches!(
        err,
        LedgerError::EnrollmentConflict { .. } | LedgerError::DuplicateEnrollment { .. }
    )));

    let db = Database::open(&path).expect("verify handle");
    assert_eq!(count(&db, "enrollments"), 1);
}

#[test]
fn raw_insert_of_second_active_enrollment_is_rejected_by_storage() {
    let (db, seed) = in_memory();
    ledger(&db)
        .create_enrollment(seed.ana.id, seed.c1.id)
        .expect("C1 enrollment");

    let bypass: Result<usize, StoreError> = db.write(|tx| {
        Ok(tx.execute(
            "INSERT INTO enrollments (student_id, class_id, academic_year_id, enrolled_on, status)
             VALUES (?1, ?2, ?3, '2026-02-10', 'ACTIVE')",
            rusqlite::params![seed.ana.id, seed.c2.id, seed.year_2026.id],
        )?)
    });

    let err = bypass.expect_err("unique index rejects the row");
    assert!(err.to_string().contains("UNIQUE"), "{err}");
    assert_eq!(count(&db, "enrollments"), 1);
}

#[test]
fn raw_insert_with_mismatched_year_is_rejected_by_storage() {
    let (db, seed) = in_memory();

    let bypass: Result<usize, StoreError> = db.write(|tx| {
        Ok(tx.execute(
            "INSERT INTO enrollments (student_id, class_id, academic_year_id, enrolled_on, status)
             VALUES (?1, ?2, ?3, '2026-02-10', 'ACTIVE')",
            rusqlite::params![seed.ana.id, seed.c1.id, seed.year_2027.id],
        )?)
    });

    let err = bypass.expect_err("trigger rejects the row");
    assert!(err.to_string().contains("academic year must match"), "{err}");
}

#[test]
fn enrollment_identity_cannot_be_rewritten() {
    let (db, seed) = in_memory();
    let enrollment = ledger(&db)
        .create_enrollment(seed.ana.id, seed.c1.id)
        .expect("C1 enrollment");

    let rewrite: Result<usize, StoreError> = db.write(|tx| {
        Ok(tx.execute(
            "UPDATE enrollments SET class_id = ?1 WHERE id = ?2",
            rusqlite::params![seed.c2.id, enrollment.id],
        )?)
    });

    let err = rewrite.expect_err("trigger rejects the update");
    assert!(err.to_string().contains("immutable"), "{err}");
    let stored = ledger(&db).get_enrollment(enrollment.id).expect("stored");
    assert_eq!(stored.class_id, seed.c1.id);
}

#[test]
fn terminal_enrollments_stay_terminal() {
    let (db, seed) = in_memory();
    let ledger = ledger(&db);
    let enrollment = ledger
        .create_enrollment(seed.ana.id, seed.c1.id)
        .expect("enrollment");
    ledger
        .transition_status(enrollment.id, EnrollmentStatus::Transferred)
        .expect("transferred");

    for next in [
        EnrollmentStatus::Active,
        EnrollmentStatus::Withdrawn,
        EnrollmentStatus::Completed,
    ] {
        assert!(matches!(
            ledger.transition_status(enrollment.id, next),
            Err(LedgerError::InvalidTransition { .. })
        ));
    }
}
