//! SQLite-backed reservation store.
//!
//! Reservations, their student rows, blocked slots and offer label overrides
//! live in `sportoase.db`. Writes that must observe a consistent slot state go
//! through [`ReservationDb::transaction`], which holds the SQLite write lock
//! (`BEGIN IMMEDIATE`) for the whole check-then-write sequence. A capacity
//! trigger and a unique student index back the same rules at the row level.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use serde::Serialize;

use super::data_dir;
use super::migrations;
use crate::booking::{
    BlockedSlot, DateRange, NewReservation, Reservation, ReservationId, SlotNameOverride,
    SlotOccupancy, SlotStateReader, Student,
};
use crate::calendar::{is_weekend, weekday_code, OfferKind, Period};
use crate::error::DatabaseError;

const DB_FILE_NAME: &str = "sportoase.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_RESERVATION: &str = "SELECT id, slot_date, weekday, period, owner_id, requester_name,
        requester_class, offer_kind, offer_label, notes, created_at, calendar_event_id
     FROM reservations";

/// Counts reported by [`ReservationDb::bulk_block`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkBlockSummary {
    pub blocked_count: usize,
    pub skipped_count: usize,
}

/// SQLite store for reservations and slot administration.
pub struct ReservationDb {
    conn: Connection,
    max_capacity: u32,
}

impl ReservationDb {
    /// Open the database at `<data_dir>/sportoase.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(max_capacity: u32) -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Self::open_at(&dir.join(DB_FILE_NAME), max_capacity)
    }

    /// Open the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path, max_capacity: u32) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn, max_capacity)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, 5)
    }

    fn from_connection(conn: Connection, max_capacity: u32) -> Result<Self, DatabaseError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn, max_capacity };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        migrations::migrate(&self.conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        self.install_capacity_trigger()
    }

    /// (Re)create the per-slot student limit trigger for the configured capacity.
    fn install_capacity_trigger(&self) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&format!(
            "DROP TRIGGER IF EXISTS trg_reservation_students_capacity;
             CREATE TRIGGER trg_reservation_students_capacity
             BEFORE INSERT ON reservation_students
             WHEN (SELECT COUNT(*) FROM reservation_students
                   WHERE slot_date = NEW.slot_date AND period = NEW.period) >= {capacity}
             BEGIN
                 SELECT RAISE(ABORT, 'slot capacity exceeded');
             END;",
            capacity = self.max_capacity
        ))?;
        tx.commit()?;
        Ok(())
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    /// Run `f` while holding the database write lock.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise.
    ///
    /// # Errors
    /// Returns the closure's error, or an error if the lock cannot be acquired
    /// within the busy timeout.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&ReservationTx<'_>) -> Result<T, DatabaseError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        let tx = ReservationTx { conn: &self.conn };
        match f(&tx) {
            Ok(value) => match self.conn.execute_batch("COMMIT;") {
                Ok(()) => Ok(value),
                Err(err) => {
                    let _ = self.conn.execute_batch("ROLLBACK;");
                    Err(err.into())
                }
            },
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    // === Writes ===

    pub fn create(&self, new: &NewReservation) -> Result<ReservationId, DatabaseError> {
        self.transaction(|tx| tx.create(new))
    }

    /// Overwrite a reservation. Returns `false` if `id` does not exist.
    pub fn update(&self, id: ReservationId, new: &NewReservation) -> Result<bool, DatabaseError> {
        self.transaction(|tx| tx.update(id, new))
    }

    /// Remove a reservation and its student rows. Returns `false` if absent.
    pub fn delete(&self, id: ReservationId) -> Result<bool, DatabaseError> {
        self.transaction(|tx| tx.delete(id))
    }

    /// Block a slot. Returns `false` if it was already blocked.
    pub fn block(
        &self,
        date: NaiveDate,
        period: Period,
        admin_id: &str,
        reason: &str,
    ) -> Result<bool, DatabaseError> {
        self.transaction(|tx| tx.block(date, period, admin_id, reason))
    }

    /// Unblock a slot. Returns `false` if it was not blocked.
    pub fn unblock(&self, date: NaiveDate, period: Period) -> Result<bool, DatabaseError> {
        self.transaction(|tx| tx.unblock(date, period))
    }

    /// Block every listed period (all six when `None`) on every day of
    /// `range` in one transaction.
    ///
    /// Slots that already carry a block, and weekend slots, are counted as
    /// skipped.
    pub fn bulk_block(
        &self,
        range: DateRange,
        periods: Option<&[Period]>,
        admin_id: &str,
        reason: &str,
    ) -> Result<BulkBlockSummary, DatabaseError> {
        let periods: Vec<Period> = match periods {
            Some(periods) => periods.to_vec(),
            None => Period::all().collect(),
        };
        self.transaction(|tx| {
            let mut summary = BulkBlockSummary::default();
            for date in range.days() {
                if is_weekend(date.weekday()) {
                    summary.skipped_count += periods.len();
                    continue;
                }
                for period in &periods {
                    if tx.block(date, *period, admin_id, reason)? {
                        summary.blocked_count += 1;
                    } else {
                        summary.skipped_count += 1;
                    }
                }
            }
            Ok(summary)
        })
    }

    pub fn set_calendar_event_id(
        &self,
        id: ReservationId,
        event_id: &str,
    ) -> Result<bool, DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE reservations SET calendar_event_id = ?1 WHERE id = ?2",
            params![event_id, id.0],
        )?;
        Ok(changed > 0)
    }

    pub fn set_slot_name_override(
        &self,
        weekday: Weekday,
        period: Period,
        label: &str,
        admin_id: &str,
    ) -> Result<(), DatabaseError> {
        self.transaction(|tx| tx.set_slot_name_override(weekday, period, label, admin_id))
    }

    /// Returns `false` if no override existed.
    pub fn clear_slot_name_override(
        &self,
        weekday: Weekday,
        period: Period,
    ) -> Result<bool, DatabaseError> {
        self.transaction(|tx| tx.clear_slot_name_override(weekday, period))
    }

    // === Reads ===

    pub fn get(&self, id: ReservationId) -> Result<Option<Reservation>, DatabaseError> {
        get_reservation(&self.conn, id)
    }

    pub fn list_for_slot(
        &self,
        date: NaiveDate,
        period: Period,
    ) -> Result<Vec<Reservation>, DatabaseError> {
        list_for_slot(&self.conn, date, period)
    }

    pub fn list_for_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, DatabaseError> {
        self.list_between(date, date)
    }

    /// Reservations with `start <= date <= end`, ordered by date and period.
    pub fn list_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Reservation>, DatabaseError> {
        query_reservations(
            &self.conn,
            &format!(
                "{SELECT_RESERVATION} WHERE slot_date >= ?1 AND slot_date <= ?2
                 ORDER BY slot_date, period, created_at, id"
            ),
            params![format_date(start), format_date(end)],
        )
    }

    /// Reservations owned by `owner_id`, newest slot first.
    pub fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Reservation>, DatabaseError> {
        query_reservations(
            &self.conn,
            &format!("{SELECT_RESERVATION} WHERE owner_id = ?1 ORDER BY slot_date DESC, period, id"),
            params![owner_id],
        )
    }

    pub fn list_blocked_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BlockedSlot>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT slot_date, weekday, period, admin_id, reason, created_at
             FROM blocked_slots WHERE slot_date >= ?1 AND slot_date <= ?2
             ORDER BY slot_date, period",
        )?;
        let rows = stmt
            .query_map(params![format_date(start), format_date(end)], BlockedRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(BlockedRow::into_blocked_slot).collect()
    }

    pub fn list_slot_name_overrides(&self) -> Result<Vec<SlotNameOverride>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT weekday, period, label, admin_id, updated_at
             FROM slot_name_overrides ORDER BY weekday, period",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(weekday, period, label, admin_id, updated_at)| {
                Ok(SlotNameOverride {
                    weekday,
                    period: decode_period("slot_name_overrides", period)?,
                    label,
                    admin_id,
                    updated_at: parse_timestamp("slot_name_overrides", &updated_at)?,
                })
            })
            .collect()
    }
}

impl SlotStateReader for ReservationDb {
    fn occupancy(&self, date: NaiveDate, period: Period) -> Result<SlotOccupancy, DatabaseError> {
        occupancy(&self.conn, date, period)
    }

    fn blocked_slot(
        &self,
        date: NaiveDate,
        period: Period,
    ) -> Result<Option<BlockedSlot>, DatabaseError> {
        blocked_slot(&self.conn, date, period)
    }

    fn offer_override(
        &self,
        weekday: Weekday,
        period: Period,
    ) -> Result<Option<String>, DatabaseError> {
        offer_override(&self.conn, weekday, period)
    }
}

/// Handle to the store inside a running [`ReservationDb::transaction`].
pub struct ReservationTx<'c> {
    conn: &'c Connection,
}

impl ReservationTx<'_> {
    pub fn get(&self, id: ReservationId) -> Result<Option<Reservation>, DatabaseError> {
        get_reservation(self.conn, id)
    }

    pub fn list_for_slot(
        &self,
        date: NaiveDate,
        period: Period,
    ) -> Result<Vec<Reservation>, DatabaseError> {
        list_for_slot(self.conn, date, period)
    }

    pub fn create(&self, new: &NewReservation) -> Result<ReservationId, DatabaseError> {
        self.conn.execute(
            "INSERT INTO reservations (slot_date, weekday, period, owner_id, requester_name,
                requester_class, offer_kind, offer_label, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                format_date(new.date),
                new.weekday_code(),
                new.period.number(),
                new.owner_id,
                new.requester_name,
                new.requester_class,
                new.offer.kind.as_str(),
                new.offer.label,
                new.notes,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = ReservationId(self.conn.last_insert_rowid());
        self.insert_students(id, new)?;
        Ok(id)
    }

    pub fn update(&self, id: ReservationId, new: &NewReservation) -> Result<bool, DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE reservations SET slot_date = ?1, weekday = ?2, period = ?3,
                requester_name = ?4, requester_class = ?5, offer_kind = ?6,
                offer_label = ?7, notes = ?8
             WHERE id = ?9",
            params![
                format_date(new.date),
                new.weekday_code(),
                new.period.number(),
                new.requester_name,
                new.requester_class,
                new.offer.kind.as_str(),
                new.offer.label,
                new.notes,
                id.0,
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        self.conn.execute(
            "DELETE FROM reservation_students WHERE reservation_id = ?1",
            params![id.0],
        )?;
        self.insert_students(id, new)?;
        Ok(true)
    }

    pub fn delete(&self, id: ReservationId) -> Result<bool, DatabaseError> {
        self.conn.execute(
            "DELETE FROM reservation_students WHERE reservation_id = ?1",
            params![id.0],
        )?;
        let changed = self
            .conn
            .execute("DELETE FROM reservations WHERE id = ?1", params![id.0])?;
        Ok(changed > 0)
    }

    fn insert_students(&self, id: ReservationId, new: &NewReservation) -> Result<(), DatabaseError> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO reservation_students
                (reservation_id, position, name, class_label, name_key, class_key, slot_date, period)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let slot_date = format_date(new.date);
        for (position, student) in new.students.iter().enumerate() {
            let (name_key, class_key) = student.identity_key();
            stmt.execute(params![
                id.0,
                position as i64,
                student.name,
                student.class_label,
                name_key,
                class_key,
                slot_date,
                new.period.number(),
            ])?;
        }
        Ok(())
    }

    pub fn block(
        &self,
        date: NaiveDate,
        period: Period,
        admin_id: &str,
        reason: &str,
    ) -> Result<bool, DatabaseError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO blocked_slots (slot_date, period, weekday, admin_id, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                format_date(date),
                period.number(),
                weekday_code(date.weekday()),
                admin_id,
                reason,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn unblock(&self, date: NaiveDate, period: Period) -> Result<bool, DatabaseError> {
        let removed = self.conn.execute(
            "DELETE FROM blocked_slots WHERE slot_date = ?1 AND period = ?2",
            params![format_date(date), period.number()],
        )?;
        Ok(removed > 0)
    }

    pub fn set_slot_name_override(
        &self,
        weekday: Weekday,
        period: Period,
        label: &str,
        admin_id: &str,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO slot_name_overrides (weekday, period, label, admin_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(weekday, period) DO UPDATE SET
                label = excluded.label,
                admin_id = excluded.admin_id,
                updated_at = excluded.updated_at",
            params![
                weekday_code(weekday),
                period.number(),
                label,
                admin_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn clear_slot_name_override(
        &self,
        weekday: Weekday,
        period: Period,
    ) -> Result<bool, DatabaseError> {
        let removed = self.conn.execute(
            "DELETE FROM slot_name_overrides WHERE weekday = ?1 AND period = ?2",
            params![weekday_code(weekday), period.number()],
        )?;
        Ok(removed > 0)
    }
}

impl SlotStateReader for ReservationTx<'_> {
    fn occupancy(&self, date: NaiveDate, period: Period) -> Result<SlotOccupancy, DatabaseError> {
        occupancy(self.conn, date, period)
    }

    fn blocked_slot(
        &self,
        date: NaiveDate,
        period: Period,
    ) -> Result<Option<BlockedSlot>, DatabaseError> {
        blocked_slot(self.conn, date, period)
    }

    fn offer_override(
        &self,
        weekday: Weekday,
        period: Period,
    ) -> Result<Option<String>, DatabaseError> {
        offer_override(self.conn, weekday, period)
    }
}

// === Row decoding ===

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(table: &'static str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| DatabaseError::CorruptRow {
        table,
        message: format!("bad slot_date '{value}': {e}"),
    })
}

fn decode_period(table: &'static str, value: i64) -> Result<Period, DatabaseError> {
    Period::from_i64(value).ok_or_else(|| DatabaseError::CorruptRow {
        table,
        message: format!("period {value} out of range"),
    })
}

fn parse_timestamp(table: &'static str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::CorruptRow {
            table,
            message: format!("bad timestamp '{value}': {e}"),
        })
}

struct ReservationRow {
    id: i64,
    slot_date: String,
    weekday: String,
    period: i64,
    owner_id: String,
    requester_name: String,
    requester_class: String,
    offer_kind: String,
    offer_label: String,
    notes: String,
    created_at: String,
    calendar_event_id: Option<String>,
}

impl ReservationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            slot_date: row.get(1)?,
            weekday: row.get(2)?,
            period: row.get(3)?,
            owner_id: row.get(4)?,
            requester_name: row.get(5)?,
            requester_class: row.get(6)?,
            offer_kind: row.get(7)?,
            offer_label: row.get(8)?,
            notes: row.get(9)?,
            created_at: row.get(10)?,
            calendar_event_id: row.get(11)?,
        })
    }

    fn into_reservation(self, students: Vec<Student>) -> Result<Reservation, DatabaseError> {
        let offer_kind =
            OfferKind::parse(&self.offer_kind).ok_or_else(|| DatabaseError::CorruptRow {
                table: "reservations",
                message: format!("unknown offer_kind '{}'", self.offer_kind),
            })?;
        Ok(Reservation {
            id: ReservationId(self.id),
            date: parse_date("reservations", &self.slot_date)?,
            weekday: self.weekday,
            period: decode_period("reservations", self.period)?,
            owner_id: self.owner_id,
            requester_name: self.requester_name,
            requester_class: self.requester_class,
            students,
            offer_kind,
            offer_label: self.offer_label,
            notes: self.notes,
            created_at: parse_timestamp("reservations", &self.created_at)?,
            calendar_event_id: self.calendar_event_id,
        })
    }
}

struct BlockedRow {
    slot_date: String,
    weekday: String,
    period: i64,
    admin_id: String,
    reason: String,
    created_at: String,
}

impl BlockedRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            slot_date: row.get(0)?,
            weekday: row.get(1)?,
            period: row.get(2)?,
            admin_id: row.get(3)?,
            reason: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_blocked_slot(self) -> Result<BlockedSlot, DatabaseError> {
        Ok(BlockedSlot {
            date: parse_date("blocked_slots", &self.slot_date)?,
            weekday: self.weekday,
            period: decode_period("blocked_slots", self.period)?,
            admin_id: self.admin_id,
            reason: self.reason,
            created_at: parse_timestamp("blocked_slots", &self.created_at)?,
        })
    }
}

fn load_students(conn: &Connection, id: i64) -> Result<Vec<Student>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT name, class_label FROM reservation_students
         WHERE reservation_id = ?1 ORDER BY position",
    )?;
    let students = stmt
        .query_map(params![id], |row| Ok(Student::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}

fn query_reservations<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Reservation>, DatabaseError> {
    let rows = {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, ReservationRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    rows.into_iter()
        .map(|row| {
            let students = load_students(conn, row.id)?;
            row.into_reservation(students)
        })
        .collect()
}

fn get_reservation(conn: &Connection, id: ReservationId) -> Result<Option<Reservation>, DatabaseError> {
    let mut found = query_reservations(
        conn,
        &format!("{SELECT_RESERVATION} WHERE id = ?1"),
        params![id.0],
    )?;
    Ok(found.pop())
}

fn list_for_slot(
    conn: &Connection,
    date: NaiveDate,
    period: Period,
) -> Result<Vec<Reservation>, DatabaseError> {
    query_reservations(
        conn,
        &format!("{SELECT_RESERVATION} WHERE slot_date = ?1 AND period = ?2 ORDER BY created_at, id"),
        params![format_date(date), period.number()],
    )
}

fn occupancy(conn: &Connection, date: NaiveDate, period: Period) -> Result<SlotOccupancy, DatabaseError> {
    Ok(SlotOccupancy {
        date,
        period,
        reservations: list_for_slot(conn, date, period)?,
    })
}

fn blocked_slot(
    conn: &Connection,
    date: NaiveDate,
    period: Period,
) -> Result<Option<BlockedSlot>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT slot_date, weekday, period, admin_id, reason, created_at
             FROM blocked_slots WHERE slot_date = ?1 AND period = ?2",
            params![format_date(date), period.number()],
            BlockedRow::from_row,
        )
        .optional()?;
    row.map(BlockedRow::into_blocked_slot).transpose()
}

fn offer_override(
    conn: &Connection,
    weekday: Weekday,
    period: Period,
) -> Result<Option<String>, DatabaseError> {
    let label = conn
        .query_row(
            "SELECT label FROM slot_name_overrides WHERE weekday = ?1 AND period = ?2",
            params![weekday_code(weekday), period.number()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(label)
}
