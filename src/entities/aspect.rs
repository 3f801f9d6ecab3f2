// Aspect - deck-building category a hero defaults to

use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::classify_write_error;
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aspect {
    pub id: i64,
    pub name: String,
}

impl Aspect {
    fn from_row(row: &Row) -> rusqlite::Result<Aspect> {
        Ok(Aspect {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}

pub fn create(conn: &Connection, name: &str) -> Result<Aspect, StoreError> {
    let tx = conn.unchecked_transaction()?;
    if let Err(e) = tx.execute("INSERT INTO aspect (name) VALUES (?1)", [name]) {
        return Err(classify_write_error(&tx, e, "aspect", name, &[]));
    }
    let id = tx.last_insert_rowid();
    tx.commit()?;

    debug!("created aspect {} '{}'", id, name);
    Ok(Aspect {
        id,
        name: name.to_string(),
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Aspect>, StoreError> {
    let aspect = conn
        .query_row(
            "SELECT id, name FROM aspect WHERE id = ?1",
            [id],
            Aspect::from_row,
        )
        .optional()?;
    Ok(aspect)
}

pub fn list(conn: &Connection) -> Result<Vec<Aspect>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name FROM aspect ORDER BY id ASC")?;
    let aspects = stmt
        .query_map([], Aspect::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(aspects)
}

pub fn rename(conn: &Connection, id: i64, name: &str) -> Result<Aspect, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let changed = match tx.execute("UPDATE aspect SET name = ?1 WHERE id = ?2", params![name, id]) {
        Ok(n) => n,
        Err(e) => return Err(classify_write_error(&tx, e, "aspect", name, &[])),
    };
    if changed == 0 {
        return Err(StoreError::not_found("aspect", id));
    }
    tx.commit()?;

    Ok(Aspect {
        id,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::error::Violation;

    #[test]
    fn test_aspect_roundtrip_and_uniqueness() {
        let conn = open_in_memory().unwrap();
        for name in ["Aggression", "Leadership", "Protection", "Justice"] {
            create(&conn, name).unwrap();
        }

        let aspects = list(&conn).unwrap();
        assert_eq!(aspects.len(), 4);
        assert_eq!(aspects[1].name, "Leadership");
        assert_eq!(get(&conn, aspects[3].id).unwrap().unwrap().name, "Justice");

        assert!(create(&conn, "Justice").unwrap_err().violation().is_some());
        assert!(get(&conn, 99).unwrap().is_none());
    }

    #[test]
    fn test_aspect_rename() {
        let conn = open_in_memory().unwrap();
        let aspect = create(&conn, "Agression").unwrap();
        let other = create(&conn, "Justice").unwrap();

        let renamed = rename(&conn, aspect.id, "Aggression").unwrap();
        assert_eq!(renamed.name, "Aggression");
        assert_eq!(get(&conn, aspect.id).unwrap().unwrap().name, "Aggression");

        let err = rename(&conn, other.id, "Aggression").unwrap_err();
        match err.violation() {
            Some(Violation::Duplicate { field, value, .. }) => {
                assert_eq!(field, "name");
                assert_eq!(value, "Aggression");
            }
            other => panic!("expected duplicate name, got {:?}", other),
        }
        assert_eq!(get(&conn, other.id).unwrap().unwrap().name, "Justice");

        assert!(rename(&conn, 99, "Protection").unwrap_err().is_not_found());
    }
}
