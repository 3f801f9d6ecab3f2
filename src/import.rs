// Result import - CSV → result table
//
// Results are recorded out of band by an admin. Each line names a hero, a
// villain and a verdict token:
//
//     hero,villain,result
//     Captain America,Rhino,WIN
//
// Bad lines are reported and skipped; a storage failure aborts the import.

use log::{info, warn};
use rusqlite::Connection;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use crate::entities::{hero, result, villain, ResultForm, Verdict};
use crate::error::{StoreError, Violation};

#[derive(Debug, Deserialize)]
struct ResultLine {
    hero: String,
    villain: String,
    result: String,
}

/// A line that could not be imported, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// 1-based line number in the file, header included
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: Vec<Rejected>,
}

pub fn import_results_file(conn: &Connection, path: &Path) -> Result<ImportReport, StoreError> {
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    import_results(conn, file)
}

pub fn import_results<R: Read>(conn: &Connection, reader: R) -> Result<ImportReport, StoreError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut report = ImportReport::default();

    for (idx, line) in rdr.deserialize::<ResultLine>().enumerate() {
        let line_no = idx as u64 + 2;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                report.rejected.push(Rejected {
                    line: line_no,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match import_line(conn, &line) {
            Ok(()) => report.inserted += 1,
            Err(StoreError::ConstraintViolation(Violation::Duplicate { .. })) => {
                report.duplicates += 1;
            }
            Err(StoreError::ConstraintViolation(v)) => {
                warn!("line {}: {}", line_no, v);
                report.rejected.push(Rejected {
                    line: line_no,
                    reason: v.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "imported {} results ({} duplicates, {} rejected)",
        report.inserted,
        report.duplicates,
        report.rejected.len()
    );
    Ok(report)
}

fn import_line(conn: &Connection, line: &ResultLine) -> Result<(), StoreError> {
    let verdict: Verdict = line.result.parse()?;
    let hero = hero::find_by_name(conn, &line.hero)?.ok_or_else(|| Violation::InvalidValue {
        field: "hero",
        value: line.hero.clone(),
    })?;
    let villain =
        villain::find_by_name(conn, &line.villain)?.ok_or_else(|| Violation::InvalidValue {
            field: "villain",
            value: line.villain.clone(),
        })?;

    result::create(conn, &ResultForm::new(hero.id, villain.id, verdict))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::entities::{aspect, phase, HeroForm, VillainForm};
    use crate::matchups::lookup_verdict;

    fn seeded() -> Connection {
        let conn = open_in_memory().unwrap();
        let core = phase::create(&conn, "Core").unwrap();
        let leadership = aspect::create(&conn, "Leadership").unwrap();
        hero::create(&conn, &HeroForm::new("Captain America", core.id, leadership.id)).unwrap();
        villain::create(&conn, &VillainForm::new("Rhino", core.id)).unwrap();
        villain::create(&conn, &VillainForm::new("Klaw", core.id)).unwrap();
        conn
    }

    #[test]
    fn test_import_results() {
        let conn = seeded();
        let data = "hero,villain,result\n\
                    Captain America,Rhino,WIN\n\
                    Captain America,Klaw,LOSS\n";

        let report = import_results(&conn, data.as_bytes()).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates, 0);
        assert!(report.rejected.is_empty());

        let cap = hero::find_by_name(&conn, "Captain America").unwrap().unwrap();
        let klaw = villain::find_by_name(&conn, "Klaw").unwrap().unwrap();
        assert_eq!(lookup_verdict(&conn, cap.id, klaw.id).unwrap(), Some(Verdict::Loss));
    }

    #[test]
    fn test_import_twice_counts_duplicates() {
        let conn = seeded();
        let data = "hero,villain,result\nCaptain America,Rhino,WIN\n";

        import_results(&conn, data.as_bytes()).unwrap();
        let second = import_results(&conn, data.as_bytes()).unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(result::list(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_import_rejects_bad_lines() {
        let conn = seeded();
        let data = "hero,villain,result\n\
                    Captain America,Rhino,win\n\
                    Iron Man,Rhino,WIN\n\
                    Captain America,Ultron,LOSS\n\
                    Captain America,Klaw,LOSS\n";

        let report = import_results(&conn, data.as_bytes()).unwrap();
        assert_eq!(report.inserted, 1);
        let lines: Vec<u64> = report.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
        assert!(report.rejected[0].reason.contains("win"));
    }

    #[test]
    fn test_import_from_file() {
        let conn = seeded();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(&path, "hero,villain,result\nCaptain America,Rhino,WIN\n").unwrap();

        let report = import_results_file(&conn, &path).unwrap();
        assert_eq!(report.inserted, 1);

        assert!(import_results_file(&conn, &dir.path().join("missing.csv")).is_err());
    }
}
