// Result - verdict of one hero against one villain
//
// Verdicts persist as the canonical upper-case tokens WIN / LOSS. A CHECK
// constraint keeps any other casing out of the table, and (hero, villain)
// is unique so a pair holds at most one verdict.

use log::{debug, warn};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::{classify_write_error, Reference};
use crate::error::{StoreError, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Win,
    Loss,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Win => "WIN",
            Verdict::Loss => "LOSS",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact token match: "win" is not a verdict.
impl FromStr for Verdict {
    type Err = Violation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WIN" => Ok(Verdict::Win),
            "LOSS" => Ok(Verdict::Loss),
            other => Err(Violation::InvalidValue {
                field: "result",
                value: other.to_string(),
            }),
        }
    }
}

impl ToSql for Verdict {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Verdict {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let token = value.as_str()?;
        token
            .parse()
            .map_err(|e: Violation| FromSqlError::Other(e.to_string().into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: i64,
    pub hero_id: i64,
    pub hero_name: String,
    pub villain_id: i64,
    pub villain_name: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultForm {
    pub hero_id: i64,
    pub villain_id: i64,
    pub verdict: Verdict,
}

impl ResultForm {
    pub fn new(hero_id: i64, villain_id: i64, verdict: Verdict) -> Self {
        ResultForm {
            hero_id,
            villain_id,
            verdict,
        }
    }

    fn references(&self) -> [Reference; 2] {
        [
            ("hero_id", "hero", self.hero_id),
            ("villain_id", "villain", self.villain_id),
        ]
    }

    fn pair(&self) -> String {
        format!("{}/{}", self.hero_id, self.villain_id)
    }
}

const SELECT: &str = "SELECT r.id, h.id, h.name, v.id, v.name, r.result
     FROM result r
     JOIN hero h ON h.id = r.hero_id
     JOIN villain v ON v.id = r.villain_id";

impl MatchResult {
    fn from_row(row: &Row) -> rusqlite::Result<MatchResult> {
        Ok(MatchResult {
            id: row.get(0)?,
            hero_id: row.get(1)?,
            hero_name: row.get(2)?,
            villain_id: row.get(3)?,
            villain_name: row.get(4)?,
            verdict: row.get(5)?,
        })
    }
}

pub fn create(conn: &Connection, form: &ResultForm) -> Result<MatchResult, StoreError> {
    let tx = conn.unchecked_transaction()?;
    if let Err(e) = tx.execute(
        "INSERT INTO result (hero_id, villain_id, result) VALUES (?1, ?2, ?3)",
        params![form.hero_id, form.villain_id, form.verdict],
    ) {
        let err = classify_write_error(&tx, e, "result", &form.pair(), &form.references());
        warn!("result {} rejected: {}", form.pair(), err);
        return Err(err);
    }
    let id = tx.last_insert_rowid();
    let result = fetch(&tx, id)?;
    tx.commit()?;

    debug!(
        "recorded {} for {} vs {}",
        result.verdict, result.hero_name, result.villain_name
    );
    Ok(result)
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<MatchResult>, StoreError> {
    let result = conn
        .query_row(&format!("{} WHERE r.id = ?1", SELECT), [id], MatchResult::from_row)
        .optional()?;
    Ok(result)
}

fn fetch(conn: &Connection, id: i64) -> Result<MatchResult, StoreError> {
    get(conn, id)?.ok_or(StoreError::not_found("result", id))
}

pub fn list(conn: &Connection) -> Result<Vec<MatchResult>, StoreError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY r.id ASC", SELECT))?;
    let results = stmt
        .query_map([], MatchResult::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(results)
}

pub fn list_for_hero(conn: &Connection, hero_id: i64) -> Result<Vec<MatchResult>, StoreError> {
    let mut stmt = conn.prepare(&format!("{} WHERE r.hero_id = ?1 ORDER BY r.id ASC", SELECT))?;
    let results = stmt
        .query_map([hero_id], MatchResult::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(results)
}

pub fn list_for_villain(
    conn: &Connection,
    villain_id: i64,
) -> Result<Vec<MatchResult>, StoreError> {
    let mut stmt =
        conn.prepare(&format!("{} WHERE r.villain_id = ?1 ORDER BY r.id ASC", SELECT))?;
    let results = stmt
        .query_map([villain_id], MatchResult::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(results)
}

pub fn update(conn: &Connection, id: i64, form: &ResultForm) -> Result<MatchResult, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let changed = match tx.execute(
        "UPDATE result SET hero_id = ?1, villain_id = ?2, result = ?3 WHERE id = ?4",
        params![form.hero_id, form.villain_id, form.verdict, id],
    ) {
        Ok(n) => n,
        Err(e) => {
            return Err(classify_write_error(
                &tx,
                e,
                "result",
                &form.pair(),
                &form.references(),
            ))
        }
    };
    if changed == 0 {
        return Err(StoreError::not_found("result", id));
    }
    let result = fetch(&tx, id)?;
    tx.commit()?;
    Ok(result)
}

pub fn delete(conn: &Connection, id: i64) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute("DELETE FROM result WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("result", id));
    }
    tx.commit()?;
    Ok(())
}
