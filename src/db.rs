use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::model::SalaryRange;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS salary_cache (
            job_id     TEXT PRIMARY KEY,
            min        REAL NOT NULL,
            max        REAL NOT NULL,
            avg        REAL NOT NULL,
            currency   TEXT NOT NULL,
            provenance TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

/// Load every cached salary. Consulted before any extraction is attempted;
/// a hit is reused unconditionally.
pub fn load_cache(conn: &Connection) -> Result<HashMap<String, SalaryRange>> {
    let mut stmt =
        conn.prepare("SELECT job_id, min, max, avg, currency, provenance FROM salary_cache")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                SalaryRange {
                    min: row.get(1)?,
                    max: row.get(2)?,
                    avg: row.get(3)?,
                    unit: "hourly".to_string(),
                    currency: row.get(4)?,
                    provenance: row.get(5)?,
                },
            ))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

/// Persist resolved salaries. INSERT OR IGNORE keeps the cache additive:
/// once an id has a salary, later runs never overwrite it, so fallback
/// spend is never repeated for the same posting. Returns the number of
/// newly inserted rows.
pub fn save_cache(conn: &Connection, entries: &[(String, SalaryRange)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO salary_cache (job_id, min, max, avg, currency, provenance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (id, s) in entries {
            count += stmt.execute(rusqlite::params![
                id,
                s.min,
                s.max,
                s.avg,
                s.currency,
                s.provenance
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub struct CacheStats {
    pub total: usize,
    pub from_fallback: usize,
}

pub fn cache_stats(conn: &Connection) -> Result<CacheStats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM salary_cache", [], |r| r.get(0))?;
    let from_fallback: usize = conn.query_row(
        "SELECT COUNT(*) FROM salary_cache WHERE provenance LIKE 'llm:%'",
        [],
        |r| r.get(0),
    )?;
    Ok(CacheStats {
        total,
        from_fallback,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn salary(min: f64, provenance: &str) -> SalaryRange {
        SalaryRange::hourly(min, min, provenance)
    }

    #[test]
    fn round_trips_entries() {
        let conn = mem_conn();
        let inserted = save_cache(
            &conn,
            &[
                ("1".to_string(), salary(25.0, "hourly")),
                ("2".to_string(), salary(30.0, "llm:weekly")),
            ],
        )
        .unwrap();
        assert_eq!(inserted, 2);

        let cache = load_cache(&conn).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache["1"].min, 25.0);
        assert_eq!(cache["2"].provenance, "llm:weekly");
    }

    #[test]
    fn cache_is_additive_never_overwritten() {
        let conn = mem_conn();
        save_cache(&conn, &[("1".to_string(), salary(25.0, "hourly"))]).unwrap();
        // A second run deriving a different value must not replace the first.
        let inserted =
            save_cache(&conn, &[("1".to_string(), salary(99.0, "llm:monthly"))]).unwrap();
        assert_eq!(inserted, 0);

        let cache = load_cache(&conn).unwrap();
        assert_eq!(cache["1"].min, 25.0);
        assert_eq!(cache["1"].provenance, "hourly");
    }

    #[test]
    fn stats_count_fallback_entries() {
        let conn = mem_conn();
        save_cache(
            &conn,
            &[
                ("1".to_string(), salary(25.0, "hourly")),
                ("2".to_string(), salary(30.0, "llm:weekly")),
                ("3".to_string(), salary(20.0, "k_range")),
            ],
        )
        .unwrap();
        let stats = cache_stats(&conn).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.from_fallback, 1);
    }
}
