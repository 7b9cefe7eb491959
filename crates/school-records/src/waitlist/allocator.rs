use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use super::domain::{queue_order, Allocation, Placement, WaitlistEntry, WaitlistEntryView, WaitlistStatus};
use crate::clock::{Clock, SystemClock};
use crate::enrollment::ledger::{active_enrollment_in_year, create_enrollment_in};
use crate::enrollment::LedgerError;
use crate::ids::{ClassId, SchoolId, StudentId, WaitlistEntryId};
use crate::reference::repository::ReferenceReader;
use crate::reference::{ReferenceError, SchoolRef, Student};
use crate::store::{Database, StoreError};

const ENTRY_SELECT_SQL: &str =
    "SELECT id, student_id, preferred_school_id, requested_on, status FROM waitlist_entries";

/// Owns waitlist entries and drives them into the enrollment ledger.
#[derive(Clone)]
pub struct WaitlistAllocator {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl WaitlistAllocator {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Registers a PENDING placement request dated today.
    ///
    /// Succeeds even when no school can be resolved yet; the returned view then
    /// carries [`Placement::NoZoningMatch`] and the entry waits for manual handling.
    pub fn enqueue(
        &self,
        student_id: StudentId,
        preferred_school_id: Option<SchoolId>,
    ) -> Result<WaitlistEntryView, WaitlistError> {
        let today = self.clock.today();
        let view = self.db.write(|tx| {
            let reader = ReferenceReader::new(tx);
            reader.student(student_id)?;
            if let Some(school_id) = preferred_school_id {
                reader.school(school_id)?;
            }

            tx.execute(
                "INSERT INTO waitlist_entries (student_id, preferred_school_id, requested_on, status)
                 VALUES (?1, ?2, ?3, ?4)",
                params![student_id, preferred_school_id, today, WaitlistStatus::Pending],
            )?;

            let entry = WaitlistEntry {
                id: WaitlistEntryId(tx.last_insert_rowid()),
                student_id,
                preferred_school_id,
                request_date: today,
                status: WaitlistStatus::Pending,
            };
            entry_view(tx, entry)
        })?;

        match &view.placement {
            Placement::NoZoningMatch { neighborhood } => warn!(
                entry_id = %view.id,
                %student_id,
                neighborhood = neighborhood.as_deref().unwrap_or(""),
                "waitlist entry enqueued without a resolvable school"
            ),
            placement => info!(
                entry_id = %view.id,
                %student_id,
                school = placement.school().map(|school| school.name.as_str()).unwrap_or(""),
                "waitlist entry enqueued"
            ),
        }
        Ok(view)
    }

    /// Maps the student's registered neighborhood to its zoned school.
    pub fn resolve_zoning(&self, student_id: StudentId) -> Result<SchoolRef, WaitlistError> {
        self.db.read(|conn| {
            let student = ReferenceReader::new(conn).student(student_id)?;
            match zoned_school(conn, &student)? {
                Some(school) => Ok(school),
                None => Err(WaitlistError::NoZoningMatch {
                    student_id,
                    neighborhood: student.neighborhood,
                }),
            }
        })
    }

    pub fn entry(&self, entry_id: WaitlistEntryId) -> Result<WaitlistEntryView, WaitlistError> {
        self.db.read(|conn| {
            let entry = fetch_entry(conn, entry_id)?.ok_or(WaitlistError::EntryNotFound(entry_id))?;
            entry_view(conn, entry)
        })
    }

    /// PENDING entries in first-registered, first-served order, optionally
    /// limited to those whose resolved school is `school_id`.
    pub fn list_queue(
        &self,
        school_id: Option<SchoolId>,
    ) -> Result<Vec<WaitlistEntryView>, WaitlistError> {
        self.db.read(|conn| {
            let mut views = Vec::new();
            for entry in pending_entries(conn)? {
                let view = entry_view(conn, entry)?;
                if school_id.map_or(true, |id| resolves_to(&view.placement, id)) {
                    views.push(view);
                }
            }
            Ok(views)
        })
    }

    /// Enrolls the entry's student in `class_id` and marks the entry ALLOCATED.
    ///
    /// Both writes share one transaction: when the ledger rejects the
    /// enrollment the entry stays PENDING and nothing is written.
    pub fn allocate(
        &self,
        entry_id: WaitlistEntryId,
        class_id: ClassId,
    ) -> Result<Allocation, WaitlistError> {
        let today = self.clock.today();
        let allocation = self.db.write(|tx| {
            let entry = fetch_entry(tx, entry_id)?.ok_or(WaitlistError::EntryNotFound(entry_id))?;
            allocate_in(tx, entry, class_id, today)
        });
        log_allocation(entry_id, class_id, &allocation);
        allocation
    }

    /// Allocates the head of the queue among entries resolved to the class's school.
    ///
    /// Entries whose student is already ACTIVE in the class's academic year are
    /// passed over and stay PENDING. Returns `Ok(None)` when no allocatable
    /// entry resolves to that school.
    pub fn allocate_next(&self, class_id: ClassId) -> Result<Option<Allocation>, WaitlistError> {
        let today = self.clock.today();
        self.db.write(|tx| {
            let placement = ReferenceReader::new(tx).class_placement(class_id)?;
            let school_id = placement.academic_year.school_id;
            let year_id = placement.academic_year.id;

            for entry in pending_entries(tx)? {
                let resolved = resolve_placement(tx, &entry)?;
                if !resolves_to(&resolved, school_id) {
                    continue;
                }
                let active = active_enrollment_in_year(tx, entry.student_id, year_id)?;
                if let Some(existing) = active {
                    warn!(
                        entry_id = %entry.id,
                        student_id = %entry.student_id,
                        enrollment_id = %existing,
                        year = placement.academic_year.year,
                        "skipping queued student already active in the academic year"
                    );
                    continue;
                }

                let entry_id = entry.id;
                let allocation = allocate_in(tx, entry, class_id, today);
                log_allocation(entry_id, class_id, &allocation);
                return allocation.map(Some);
            }

            debug!(%class_id, %school_id, "no queued entry for school");
            Ok(None)
        })
    }

    /// PENDING → CANCELLED. The entry is kept for the record.
    pub fn cancel(&self, entry_id: WaitlistEntryId) -> Result<WaitlistEntryView, WaitlistError> {
        let cancelled = self.db.write(|tx| {
            let entry = fetch_entry(tx, entry_id)?.ok_or(WaitlistError::EntryNotFound(entry_id))?;
            let entry = close_entry(tx, entry, WaitlistStatus::Cancelled)?;
            entry_view(tx, entry)
        })?;
        info!(entry_id = %entry_id, "waitlist entry cancelled");
        Ok(cancelled)
    }

    /// Hard delete from any status, for data-entry corrections.
    pub fn remove(&self, entry_id: WaitlistEntryId) -> Result<(), WaitlistError> {
        self.db.write(|tx| {
            let deleted = tx.execute("DELETE FROM waitlist_entries WHERE id = ?1", params![entry_id])?;
            if deleted == 0 {
                return Err(WaitlistError::EntryNotFound(entry_id));
            }
            Ok(())
        })?;
        info!(entry_id = %entry_id, "waitlist entry removed");
        Ok(())
    }
}

fn allocate_in(
    conn: &Connection,
    entry: WaitlistEntry,
    class_id: ClassId,
    today: NaiveDate,
) -> Result<Allocation, WaitlistError> {
    if entry.status != WaitlistStatus::Pending {
        return Err(WaitlistError::InvalidTransition {
            id: entry.id,
            from: entry.status,
            to: WaitlistStatus::Allocated,
        });
    }

    let enrollment = create_enrollment_in(conn, entry.student_id, class_id, today)?;
    let entry = close_entry(conn, entry, WaitlistStatus::Allocated)?;
    Ok(Allocation {
        entry: entry_view(conn, entry)?,
        enrollment,
    })
}

/// Moves a PENDING entry to a terminal status with a guarded update.
fn close_entry(
    conn: &Connection,
    entry: WaitlistEntry,
    next: WaitlistStatus,
) -> Result<WaitlistEntry, WaitlistError> {
    let rejected = WaitlistError::InvalidTransition {
        id: entry.id,
        from: entry.status,
        to: next,
    };
    if entry.status != WaitlistStatus::Pending {
        return Err(rejected);
    }

    let changed = conn.execute(
        "UPDATE waitlist_entries SET status = ?1 WHERE id = ?2 AND status = ?3",
        params![next, entry.id, WaitlistStatus::Pending],
    )?;
    if changed == 0 {
        return Err(rejected);
    }

    Ok(WaitlistEntry {
        status: next,
        ..entry
    })
}

fn log_allocation(
    entry_id: WaitlistEntryId,
    class_id: ClassId,
    allocation: &Result<Allocation, WaitlistError>,
) {
    match allocation {
        Ok(allocation) => info!(
            entry_id = %entry_id,
            %class_id,
            enrollment_id = %allocation.enrollment.id,
            "waitlist entry allocated"
        ),
        Err(err) => warn!(entry_id = %entry_id, %class_id, error = %err, "allocation rejected"),
    }
}

fn resolves_to(placement: &Placement, school_id: SchoolId) -> bool {
    placement.school().is_some_and(|school| school.id == school_id)
}

fn fetch_entry(
    conn: &Connection,
    id: WaitlistEntryId,
) -> Result<Option<WaitlistEntry>, WaitlistError> {
    let entry = conn
        .query_row(
            &format!("{ENTRY_SELECT_SQL} WHERE id = ?1"),
            params![id],
            parse_entry_row,
        )
        .optional()?;
    Ok(entry)
}

fn pending_entries(conn: &Connection) -> Result<Vec<WaitlistEntry>, WaitlistError> {
    let mut stmt = conn.prepare(&format!("{ENTRY_SELECT_SQL} WHERE status = ?1"))?;
    let mut entries = stmt
        .query_map(params![WaitlistStatus::Pending], parse_entry_row)?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(queue_order);
    Ok(entries)
}

fn zoned_school(conn: &Connection, student: &Student) -> Result<Option<SchoolRef>, WaitlistError> {
    let Some(neighborhood) = student.neighborhood.as_deref() else {
        return Ok(None);
    };

    let reader = ReferenceReader::new(conn);
    match reader.zoning_rule_for(neighborhood)? {
        Some(rule) => Ok(Some(reader.school(rule.school_id)?.to_ref())),
        None => Ok(None),
    }
}

fn resolve_placement(conn: &Connection, entry: &WaitlistEntry) -> Result<Placement, WaitlistError> {
    let reader = ReferenceReader::new(conn);
    if let Some(school_id) = entry.preferred_school_id {
        let school = reader.school(school_id)?.to_ref();
        return Ok(Placement::Preferred { school });
    }

    let student = reader.student(entry.student_id)?;
    Ok(match zoned_school(conn, &student)? {
        Some(school) => Placement::Zoned { school },
        None => Placement::NoZoningMatch {
            neighborhood: student.neighborhood,
        },
    })
}

fn entry_view(conn: &Connection, entry: WaitlistEntry) -> Result<WaitlistEntryView, WaitlistError> {
    let student = ReferenceReader::new(conn).student(entry.student_id)?;
    let placement = resolve_placement(conn, &entry)?;
    Ok(WaitlistEntryView {
        id: entry.id,
        student_id: entry.student_id,
        student_name: student.name,
        resolved_school_name: placement.school().map(|school| school.name.clone()),
        placement,
        request_date: entry.request_date,
        status: entry.status,
    })
}

fn parse_entry_row(row: &Row<'_>) -> rusqlite::Result<WaitlistEntry> {
    Ok(WaitlistEntry {
        id: row.get(0)?,
        student_id: row.get(1)?,
        preferred_school_id: row.get(2)?,
        request_date: row.get(3)?,
        status: row.get(4)?,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum WaitlistError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("waitlist entry {0} not found")]
    EntryNotFound(WaitlistEntryId),
    #[error("no zoning rule matches the neighborhood of student {student_id}")]
    NoZoningMatch {
        student_id: StudentId,
        neighborhood: Option<String>,
    },
    #[error("waitlist entry {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: WaitlistEntryId,
        from: WaitlistStatus,
        to: WaitlistStatus,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for WaitlistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(value))
    }
}

impl WaitlistError {
    pub fn is_not_found(&self) -> bool {
        match self {
            WaitlistError::EntryNotFound(_) | WaitlistError::Reference(ReferenceError::NotFound { .. }) => true,
            WaitlistError::Ledger(err) => err.is_not_found(),
            _ => false,
        }
    }

    pub fn is_enrollment_conflict(&self) -> bool {
        matches!(
            self,
            WaitlistError::Ledger(LedgerError::EnrollmentConflict { .. })
        )
    }
}
