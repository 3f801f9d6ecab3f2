// Villain - named entity belonging to exactly one Phase
//
// Deleting a villain cascades to the results recorded against it.

use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{classify_write_error, Reference};
use crate::entities::Phase;
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Villain {
    pub id: i64,
    pub name: String,
    pub phase: Phase,
}

/// Fields submitted on create/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VillainForm {
    pub name: String,
    pub phase_id: i64,
}

impl VillainForm {
    pub fn new(name: &str, phase_id: i64) -> Self {
        VillainForm {
            name: name.to_string(),
            phase_id,
        }
    }

    fn references(&self) -> [Reference; 1] {
        [("phase_id", "phase", self.phase_id)]
    }
}

const SELECT: &str = "SELECT v.id, v.name, p.id, p.phasename
     FROM villain v
     JOIN phase p ON p.id = v.phase_id";

impl Villain {
    fn from_row(row: &Row) -> rusqlite::Result<Villain> {
        Ok(Villain {
            id: row.get(0)?,
            name: row.get(1)?,
            phase: Phase {
                id: row.get(2)?,
                name: row.get(3)?,
            },
        })
    }
}

pub fn create(conn: &Connection, form: &VillainForm) -> Result<Villain, StoreError> {
    let tx = conn.unchecked_transaction()?;
    if let Err(e) = tx.execute(
        "INSERT INTO villain (name, phase_id) VALUES (?1, ?2)",
        params![form.name, form.phase_id],
    ) {
        let err = classify_write_error(&tx, e, "villain", &form.name, &form.references());
        warn!("villain '{}' rejected: {}", form.name, err);
        return Err(err);
    }
    let id = tx.last_insert_rowid();
    let villain = fetch(&tx, id)?;
    tx.commit()?;

    debug!("created villain {} '{}'", id, villain.name);
    Ok(villain)
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Villain>, StoreError> {
    let villain = conn
        .query_row(&format!("{} WHERE v.id = ?1", SELECT), [id], Villain::from_row)
        .optional()?;
    Ok(villain)
}

fn fetch(conn: &Connection, id: i64) -> Result<Villain, StoreError> {
    get(conn, id)?.ok_or(StoreError::not_found("villain", id))
}

pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Villain>, StoreError> {
    let villain = conn
        .query_row(&format!("{} WHERE v.name = ?1", SELECT), [name], Villain::from_row)
        .optional()?;
    Ok(villain)
}

pub fn list(conn: &Connection) -> Result<Vec<Villain>, StoreError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY v.id ASC", SELECT))?;
    let villains = stmt
        .query_map([], Villain::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(villains)
}

pub fn list_by_phase(conn: &Connection, phase_id: i64) -> Result<Vec<Villain>, StoreError> {
    let mut stmt = conn.prepare(&format!("{} WHERE v.phase_id = ?1 ORDER BY v.id ASC", SELECT))?;
    let villains = stmt
        .query_map([phase_id], Villain::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(villains)
}

pub fn update(conn: &Connection, id: i64, form: &VillainForm) -> Result<Villain, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let changed = match tx.execute(
        "UPDATE villain SET name = ?1, phase_id = ?2 WHERE id = ?3",
        params![form.name, form.phase_id, id],
    ) {
        Ok(n) => n,
        Err(e) => {
            let err = classify_write_error(&tx, e, "villain", &form.name, &form.references());
            warn!("villain {} update rejected: {}", id, err);
            return Err(err);
        }
    };
    if changed == 0 {
        return Err(StoreError::not_found("villain", id));
    }
    let villain = fetch(&tx, id)?;
    tx.commit()?;

    debug!("updated villain {}", id);
    Ok(villain)
}

/// Remove a villain and, through ON DELETE CASCADE, every result against it.
pub fn delete(conn: &Connection, id: i64) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute("DELETE FROM villain WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("villain", id));
    }
    tx.commit()?;

    debug!("deleted villain {}", id);
    Ok(())
}
