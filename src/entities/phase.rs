// Phase - release era that villains and heroes belong to
//
// Reference data: created by an admin, referenced by Villain/Hero,
// never deleted (villain/hero foreign keys restrict it).

use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::classify_write_error;
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: i64,
    pub name: String,
}

impl Phase {
    fn from_row(row: &Row) -> rusqlite::Result<Phase> {
        Ok(Phase {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}

pub fn create(conn: &Connection, name: &str) -> Result<Phase, StoreError> {
    let tx = conn.unchecked_transaction()?;
    if let Err(e) = tx.execute("INSERT INTO phase (phasename) VALUES (?1)", [name]) {
        return Err(classify_write_error(&tx, e, "phase", name, &[]));
    }
    let id = tx.last_insert_rowid();
    tx.commit()?;

    debug!("created phase {} '{}'", id, name);
    Ok(Phase {
        id,
        name: name.to_string(),
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Phase>, StoreError> {
    let phase = conn
        .query_row(
            "SELECT id, phasename FROM phase WHERE id = ?1",
            [id],
            Phase::from_row,
        )
        .optional()?;
    Ok(phase)
}

pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Phase>, StoreError> {
    let phase = conn
        .query_row(
            "SELECT id, phasename FROM phase WHERE phasename = ?1",
            [name],
            Phase::from_row,
        )
        .optional()?;
    Ok(phase)
}

/// All phases in id order. Feeds the phase choices of villain/hero forms.
pub fn list(conn: &Connection) -> Result<Vec<Phase>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, phasename FROM phase ORDER BY id ASC")?;
    let phases = stmt
        .query_map([], Phase::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(phases)
}

pub fn rename(conn: &Connection, id: i64, name: &str) -> Result<Phase, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let changed = match tx.execute(
        "UPDATE phase SET phasename = ?1 WHERE id = ?2",
        params![name, id],
    ) {
        Ok(n) => n,
        Err(e) => return Err(classify_write_error(&tx, e, "phase", name, &[])),
    };
    if changed == 0 {
        return Err(StoreError::not_found("phase", id));
    }
    tx.commit()?;

    Ok(Phase {
        id,
        name: name.to_string(),
    })
}
