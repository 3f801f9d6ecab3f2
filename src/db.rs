use log::debug;
use rusqlite::{Connection, ErrorCode};
use std::path::Path;

use crate::error::{StoreError, Violation};

/// Bumped whenever the DDL below changes shape.
pub const SCHEMA_VERSION: i64 = 1;

/// Open (or create) a file-backed database and make sure the schema exists.
pub fn open(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    // WAL for crash recovery; in-memory databases ignore it
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("journal_mode={}", mode);
    setup_database(&conn)?;
    Ok(conn)
}

/// In-memory database with the schema applied. Used by tests and dry runs.
pub fn open_in_memory() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<(), StoreError> {
    // SQLite leaves FK enforcement off per connection unless asked
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT
        );

        CREATE TABLE IF NOT EXISTS phase (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phasename TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS aspect (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS villain (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            phase_id INTEGER NOT NULL REFERENCES phase(id)
        );

        CREATE TABLE IF NOT EXISTS hero (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            phase_id INTEGER NOT NULL REFERENCES phase(id),
            aspect_id INTEGER NOT NULL REFERENCES aspect(id)
        );

        CREATE TABLE IF NOT EXISTS result (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hero_id INTEGER NOT NULL REFERENCES hero(id) ON DELETE CASCADE,
            villain_id INTEGER NOT NULL REFERENCES villain(id) ON DELETE CASCADE,
            result TEXT NOT NULL CHECK (result IN ('WIN', 'LOSS')),
            UNIQUE (hero_id, villain_id)
        );

        CREATE INDEX IF NOT EXISTS ix_villain_phase_id ON villain(phase_id);
        CREATE INDEX IF NOT EXISTS ix_hero_phase_id ON hero(phase_id);
        CREATE INDEX IF NOT EXISTS ix_hero_aspect_id ON hero(aspect_id);
        CREATE INDEX IF NOT EXISTS ix_result_hero_id ON result(hero_id);
        CREATE INDEX IF NOT EXISTS ix_result_villain_id ON result(villain_id);",
    )?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    debug!("schema ready (version {})", SCHEMA_VERSION);

    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i64, StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// A reference field written by an INSERT/UPDATE: (field name, target table, id).
pub(crate) type Reference = (&'static str, &'static str, i64);

/// Turn a failed write into the error the caller should see.
///
/// UNIQUE failures become `Duplicate` naming the column(s) SQLite reports.
/// FOREIGN KEY failures carry no detail from SQLite, so the references that
/// were written are probed (inside the caller's transaction) to name the
/// one that is missing.
pub(crate) fn classify_write_error(
    conn: &Connection,
    err: rusqlite::Error,
    entity: &'static str,
    value: &str,
    refs: &[Reference],
) -> StoreError {
    let (extended, message) = match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            (e.extended_code, msg.clone().unwrap_or_default())
        }
        _ => (0, String::new()),
    };
    debug!("constraint {} on {}: {}", extended, entity, message);

    match extended {
        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            Violation::Duplicate {
                entity,
                field: unique_columns(&message),
                value: value.to_string(),
            }
            .into()
        }
        rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
            for &(field, table, id) in refs {
                match row_exists(conn, table, id) {
                    Ok(false) => return Violation::MissingReference { field, id }.into(),
                    Ok(true) => continue,
                    Err(e) => return e,
                }
            }
            // the referenced row vanished and came back between write and probe
            match refs.first() {
                Some(&(field, _, id)) => Violation::MissingReference { field, id }.into(),
                None => StoreError::Storage(err),
            }
        }
        _ => StoreError::Storage(err),
    }
}

/// "UNIQUE constraint failed: result.hero_id, result.villain_id" -> "hero_id, villain_id"
fn unique_columns(message: &str) -> String {
    let columns = message.rsplit(": ").next().unwrap_or(message);
    columns
        .split(", ")
        .map(|c| c.rsplit('.').next().unwrap_or(c))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn row_exists(conn: &Connection, table: &str, id: i64) -> Result<bool, StoreError> {
    // table names come from the fixed Reference lists above, never from input
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table);
    let exists: bool = conn.query_row(&sql, [id], |row| row.get(0))?;
    Ok(exists)
}
