// Matchups - hero vs villain verdict lookup and the stats built on it
//
// Lookups are directional: (hero, villain) never matches (villain, hero).

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::{hero, phase, villain, Hero, Phase, Verdict, Villain};
use crate::error::StoreError;

// ============================================================================
// VERDICT LOOKUP
// ============================================================================

/// Verdict recorded for `hero_id` against `villain_id`, if any.
///
/// When more than one row matches (only possible in databases that predate
/// the pair constraint) the lowest result id wins.
pub fn lookup_verdict(
    conn: &Connection,
    hero_id: i64,
    villain_id: i64,
) -> Result<Option<Verdict>, StoreError> {
    let verdict = conn
        .query_row(
            "SELECT result FROM result
             WHERE hero_id = ?1 AND villain_id = ?2
             ORDER BY id ASC
             LIMIT 1",
            params![hero_id, villain_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(verdict)
}

/// Presentation-neutral outcome marker. Markup is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Positive,
    Negative,
    Neutral,
}

impl Marker {
    pub fn symbol(&self) -> &'static str {
        match self {
            Marker::Positive => "W",
            Marker::Negative => "L",
            Marker::Neutral => "",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Marker::Positive => "win",
            Marker::Negative => "loss",
            Marker::Neutral => "",
        }
    }
}

pub fn render_verdict(verdict: Option<Verdict>) -> Marker {
    match verdict {
        Some(Verdict::Win) => Marker::Positive,
        Some(Verdict::Loss) => Marker::Negative,
        None => Marker::Neutral,
    }
}

// ============================================================================
// GRID
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct GridRow {
    pub hero: Hero,
    /// One cell per grid column, same order as `MatchupGrid::villains`.
    pub cells: Vec<Option<Verdict>>,
}

/// Heroes down the side, villains across the top.
#[derive(Debug, Clone, Serialize)]
pub struct MatchupGrid {
    pub villains: Vec<Villain>,
    pub rows: Vec<GridRow>,
}

impl MatchupGrid {
    pub fn cell(&self, hero_id: i64, villain_id: i64) -> Option<Verdict> {
        let col = self.villains.iter().position(|v| v.id == villain_id)?;
        let row = self.rows.iter().find(|r| r.hero.id == hero_id)?;
        row.cells[col]
    }
}

/// Every hero against every villain, built from one pass over the results.
pub fn matchup_grid(conn: &Connection) -> Result<MatchupGrid, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let heroes = hero::list(&tx)?;
    let villains = villain::list(&tx)?;

    let mut verdicts: HashMap<(i64, i64), Verdict> = HashMap::new();
    {
        let mut stmt =
            tx.prepare("SELECT hero_id, villain_id, result FROM result ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?), row.get::<_, Verdict>(2)?))
        })?;
        for row in rows {
            let (pair, verdict) = row?;
            // keep the lowest id, same tie-break as lookup_verdict
            verdicts.entry(pair).or_insert(verdict);
        }
    }
    tx.commit()?;

    let rows = heroes
        .into_iter()
        .map(|hero| {
            let cells = villains
                .iter()
                .map(|v| verdicts.get(&(hero.id, v.id)).copied())
                .collect();
            GridRow { hero, cells }
        })
        .collect();

    Ok(MatchupGrid { villains, rows })
}

// ============================================================================
// RECORDS
// ============================================================================

/// Win/loss tally for one hero or villain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub wins: i64,
    pub losses: i64,
}

impl Record {
    pub fn played(&self) -> i64 {
        self.wins + self.losses
    }

    /// Fraction of games won, None before any game is recorded.
    pub fn win_rate(&self) -> Option<f64> {
        if self.played() == 0 {
            None
        } else {
            Some(self.wins as f64 / self.played() as f64)
        }
    }
}

fn records(conn: &Connection, sql: &str) -> Result<Vec<Record>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let records = stmt
        .query_map([], |row| {
            Ok(Record {
                id: row.get(0)?,
                name: row.get(1)?,
                wins: row.get(2)?,
                losses: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Per hero: WIN verdicts are wins.
pub fn hero_records(conn: &Connection) -> Result<Vec<Record>, StoreError> {
    records(
        conn,
        "SELECT h.id, h.name,
            COALESCE(SUM(CASE WHEN r.result = 'WIN' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN r.result = 'LOSS' THEN 1 ELSE 0 END), 0)
         FROM hero h
         LEFT JOIN result r ON r.hero_id = h.id
         GROUP BY h.id, h.name
         ORDER BY h.id ASC",
    )
}

/// Per villain: a hero LOSS is a villain win.
pub fn villain_records(conn: &Connection) -> Result<Vec<Record>, StoreError> {
    records(
        conn,
        "SELECT v.id, v.name,
            COALESCE(SUM(CASE WHEN r.result = 'LOSS' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN r.result = 'WIN' THEN 1 ELSE 0 END), 0)
         FROM villain v
         LEFT JOIN result r ON r.villain_id = v.id
         GROUP BY v.id, v.name
         ORDER BY v.id ASC",
    )
}

// ============================================================================
// PHASE SUMMARIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub villain_count: i64,
    pub hero_count: i64,
}

pub fn phase_summaries(conn: &Connection) -> Result<Vec<PhaseSummary>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.phasename,
            (SELECT COUNT(*) FROM villain v WHERE v.phase_id = p.id),
            (SELECT COUNT(*) FROM hero h WHERE h.phase_id = p.id)
         FROM phase p
         ORDER BY p.id ASC",
    )?;
    let summaries = stmt
        .query_map([], |row| {
            Ok(PhaseSummary {
                phase: Phase {
                    id: row.get(0)?,
                    name: row.get(1)?,
                },
                villain_count: row.get(2)?,
                hero_count: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(summaries)
}

/// Number of villains released in one phase.
pub fn villain_count(conn: &Connection, phase_id: i64) -> Result<i64, StoreError> {
    if phase::get(conn, phase_id)?.is_none() {
        return Err(StoreError::not_found("phase", phase_id));
    }
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM villain WHERE phase_id = ?1",
        [phase_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
