//! Database schema migrations for sportoase.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: reservations with their student rows, and blocked slots.
///
/// Students are child rows carrying a copy of the slot key so that the
/// per-slot uniqueness of a student is enforced by an index.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS reservations (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            slot_date       TEXT NOT NULL,
            weekday         TEXT NOT NULL,
            period          INTEGER NOT NULL CHECK (period BETWEEN 1 AND 6),
            owner_id        TEXT NOT NULL,
            requester_name  TEXT NOT NULL,
            requester_class TEXT NOT NULL,
            offer_kind      TEXT NOT NULL CHECK (offer_kind IN ('fixed', 'free')),
            offer_label     TEXT NOT NULL,
            notes           TEXT NOT NULL DEFAULT '',
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reservations_slot ON reservations(slot_date, period);
        CREATE INDEX IF NOT EXISTS idx_reservations_owner ON reservations(owner_id);

        CREATE TABLE IF NOT EXISTS reservation_students (
            reservation_id INTEGER NOT NULL REFERENCES reservations(id) ON DELETE CASCADE,
            position       INTEGER NOT NULL,
            name           TEXT NOT NULL,
            class_label    TEXT NOT NULL,
            name_key       TEXT NOT NULL,
            class_key      TEXT NOT NULL,
            slot_date      TEXT NOT NULL,
            period         INTEGER NOT NULL,
            PRIMARY KEY (reservation_id, position)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_reservation_students_slot_unique
            ON reservation_students(slot_date, period, name_key, class_key);

        CREATE TABLE IF NOT EXISTS blocked_slots (
            slot_date  TEXT NOT NULL,
            period     INTEGER NOT NULL CHECK (period BETWEEN 1 AND 6),
            weekday    TEXT NOT NULL,
            admin_id   TEXT NOT NULL,
            reason     TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (slot_date, period)
        );",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: external calendar correlation id on reservations.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    let has_column: bool = tx
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('reservations') WHERE name = 'calendar_event_id'",
            [],
            |row| row.get::<_, i32>(0),
        )
        .unwrap_or(0)
        > 0;

    if !has_column {
        tx.execute_batch("ALTER TABLE reservations ADD COLUMN calendar_event_id TEXT;")?;
    }

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

/// Migration v3: admin-supplied labels per weekday and period.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS slot_name_overrides (
            weekday    TEXT NOT NULL,
            period     INTEGER NOT NULL CHECK (period BETWEEN 1 AND 6),
            label      TEXT NOT NULL,
            admin_id   TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (weekday, period)
        );",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i32>(0),
        )
        .unwrap()
            > 0
    }

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        for table in ["reservations", "reservation_students", "blocked_slots", "slot_name_overrides"] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn v1_database_gains_calendar_column() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 1);

        migrate(&conn).unwrap();
        let has_column: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('reservations') WHERE name = 'calendar_event_id'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(has_column, 1);
    }
}
