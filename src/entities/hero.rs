// Hero - named entity with a Phase and a default Aspect
//
// Both references must resolve. Deleting a hero cascades to its results.

use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{classify_write_error, Reference};
use crate::entities::{Aspect, Phase};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    pub id: i64,
    pub name: String,
    pub phase: Phase,
    pub default_aspect: Aspect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroForm {
    pub name: String,
    pub phase_id: i64,
    pub aspect_id: i64,
}

impl HeroForm {
    pub fn new(name: &str, phase_id: i64, aspect_id: i64) -> Self {
        HeroForm {
            name: name.to_string(),
            phase_id,
            aspect_id,
        }
    }

    fn references(&self) -> [Reference; 2] {
        [
            ("phase_id", "phase", self.phase_id),
            ("aspect_id", "aspect", self.aspect_id),
        ]
    }
}

const SELECT: &str = "SELECT h.id, h.name, p.id, p.phasename, a.id, a.name
     FROM hero h
     JOIN phase p ON p.id = h.phase_id
     JOIN aspect a ON a.id = h.aspect_id";

impl Hero {
    fn from_row(row: &Row) -> rusqlite::Result<Hero> {
        Ok(Hero {
            id: row.get(0)?,
            name: row.get(1)?,
            phase: Phase {
                id: row.get(2)?,
                name: row.get(3)?,
            },
            default_aspect: Aspect {
                id: row.get(4)?,
                name: row.get(5)?,
            },
        })
    }
}

pub fn create(conn: &Connection, form: &HeroForm) -> Result<Hero, StoreError> {
    let tx = conn.unchecked_transaction()?;
    if let Err(e) = tx.execute(
        "INSERT INTO hero (name, phase_id, aspect_id) VALUES (?1, ?2, ?3)",
        params![form.name, form.phase_id, form.aspect_id],
    ) {
        let err = classify_write_error(&tx, e, "hero", &form.name, &form.references());
        warn!("hero '{}' rejected: {}", form.name, err);
        return Err(err);
    }
    let id = tx.last_insert_rowid();
    let hero = fetch(&tx, id)?;
    tx.commit()?;

    debug!("created hero {} '{}'", id, hero.name);
    Ok(hero)
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Hero>, StoreError> {
    let hero = conn
        .query_row(&format!("{} WHERE h.id = ?1", SELECT), [id], Hero::from_row)
        .optional()?;
    Ok(hero)
}

fn fetch(conn: &Connection, id: i64) -> Result<Hero, StoreError> {
    get(conn, id)?.ok_or(StoreError::not_found("hero", id))
}

pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Hero>, StoreError> {
    let hero = conn
        .query_row(&format!("{} WHERE h.name = ?1", SELECT), [name], Hero::from_row)
        .optional()?;
    Ok(hero)
}

pub fn list(conn: &Connection) -> Result<Vec<Hero>, StoreError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY h.id ASC", SELECT))?;
    let heroes = stmt
        .query_map([], Hero::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(heroes)
}

pub fn list_by_phase(conn: &Connection, phase_id: i64) -> Result<Vec<Hero>, StoreError> {
    let mut stmt = conn.prepare(&format!("{} WHERE h.phase_id = ?1 ORDER BY h.id ASC", SELECT))?;
    let heroes = stmt
        .query_map([phase_id], Hero::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(heroes)
}

pub fn update(conn: &Connection, id: i64, form: &HeroForm) -> Result<Hero, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let changed = match tx.execute(
        "UPDATE hero SET name = ?1, phase_id = ?2, aspect_id = ?3 WHERE id = ?4",
        params![form.name, form.phase_id, form.aspect_id, id],
    ) {
        Ok(n) => n,
        Err(e) => {
            let err = classify_write_error(&tx, e, "hero", &form.name, &form.references());
            warn!("hero {} update rejected: {}", id, err);
            return Err(err);
        }
    };
    if changed == 0 {
        return Err(StoreError::not_found("hero", id));
    }
    let hero = fetch(&tx, id)?;
    tx.commit()?;

    debug!("updated hero {}", id);
    Ok(hero)
}

pub fn delete(conn: &Connection, id: i64) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute("DELETE FROM hero WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("hero", id));
    }
    tx.commit()?;

    debug!("deleted hero {}", id);
    Ok(())
}
