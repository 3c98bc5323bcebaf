pub mod gateway;

use crate::models::{fields, Record};
use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDateTime, Utc};
use duckdb::{params, Connection};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

pub use self::gateway::PersistenceGateway;

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS crawl_run_ids START 1;

CREATE TABLE IF NOT EXISTS listings (
    source               VARCHAR   NOT NULL,
    url                  VARCHAR   NOT NULL,
    title                VARCHAR,
    organization         VARCHAR,
    location             VARCHAR,
    -- JSON object with every extracted field
    fields               VARCHAR   NOT NULL,
    page                 INTEGER,
    posted_age_days      INTEGER,
    -- hex SHA-256 of the material fields
    content_fingerprint  CHAR(64)  NOT NULL,
    first_seen           TIMESTAMP NOT NULL,
    last_seen            TIMESTAMP NOT NULL,
    PRIMARY KEY (source, url)
);

CREATE TABLE IF NOT EXISTS crawl_runs (
    id           INTEGER PRIMARY KEY DEFAULT nextval('crawl_run_ids'),
    source       VARCHAR   NOT NULL,
    started_at   TIMESTAMP NOT NULL,
    finished_at  TIMESTAMP,
    status       VARCHAR   NOT NULL DEFAULT 'running',
    iterations   INTEGER   DEFAULT 0,
    accepted     INTEGER   DEFAULT 0,
    skipped      INTEGER   DEFAULT 0,
    termination  VARCHAR,
    error_msg    VARCHAR
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

// listings is served by its (source, url) primary key
const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_runs_source ON crawl_runs (source);
"#;

// ── Store trait ───────────────────────────────────────────────────────────────

/// Durable, URL-keyed record storage. One source's records never collide with
/// another's.
pub trait RecordStore: Send + Sync {
    /// Every stored URL of `source` with its fingerprint.
    fn preload(&self, source: &str) -> Result<HashMap<String, String>>;

    fn lookup(&self, source: &str, url: &str) -> Result<Option<String>>;

    /// Insert, or update every mutable column of the existing row.
    fn upsert(&self, source: &str, record: &Record, fingerprint: &str) -> Result<()>;

    fn begin_run(&self, source: &str) -> Result<i64>;

    fn finish_run(&self, run_id: i64, summary: &RunSummary) -> Result<()>;
}

/// What a finished crawl run reports to the run log.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub iterations: u32,
    pub accepted: usize,
    pub skipped: usize,
    pub termination: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceStats {
    pub source: String,
    pub records: i64,
    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Mutex<Connection>,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("DuckDB connection mutex poisoned"))
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        let conn = self.conn()?;
        conn.execute_batch(DDL).context("DDL failed")?;
        conn.execute_batch(INDEXES).context("Index creation failed")?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Listings ──────────────────────────────────────────────────────────────

    /// Upsert with an explicit clock; `first_seen` is only ever set on insert.
    pub fn upsert_at(
        &self,
        source: &str,
        record: &Record,
        fingerprint: &str,
        now: NaiveDateTime,
    ) -> Result<()> {
        let fields_json =
            serde_json::to_string(&record.fields).context("serialise record fields")?;

        self.conn()?
            .execute(
                r#"INSERT INTO listings
                       (source, url, title, organization, location, fields, page,
                        posted_age_days, content_fingerprint, first_seen, last_seen)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT (source, url) DO UPDATE SET
                       title               = excluded.title,
                       organization        = excluded.organization,
                       location            = excluded.location,
                       fields              = excluded.fields,
                       page                = excluded.page,
                       posted_age_days     = excluded.posted_age_days,
                       content_fingerprint = excluded.content_fingerprint,
                       last_seen           = excluded.last_seen"#,
                params![
                    source,
                    record.url,
                    record.get(fields::TITLE),
                    record.get(fields::ORGANIZATION),
                    record.get(fields::LOCATION),
                    fields_json,
                    record.page as i64,
                    record.posted_age_days.map(|d| d as i64),
                    fingerprint,
                    now,
                    now,
                ],
            )
            .with_context(|| format!("upsert listing {}", record.url))?;
        Ok(())
    }

    /// Stored record with its first/last seen timestamps.
    pub fn fetch(
        &self,
        source: &str,
        url: &str,
    ) -> Result<Option<(Record, NaiveDateTime, NaiveDateTime)>> {
        let conn = self.conn()?;
        let row = conn.query_row(
            r#"SELECT fields, page, posted_age_days, first_seen, last_seen
               FROM listings WHERE source = ? AND url = ?"#,
            params![source, url],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, Option<i64>>(2)?,
                    r.get::<_, NaiveDateTime>(3)?,
                    r.get::<_, NaiveDateTime>(4)?,
                ))
            },
        );

        let (fields_json, page, age, first, last) = match row {
            Ok(row) => row,
            Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("fetch listing {url}")),
        };

        let fields: BTreeMap<String, String> =
            serde_json::from_str(&fields_json).context("decode stored fields")?;
        let record = Record {
            url: url.to_string(),
            fields,
            page: page as u32,
            posted_age_days: age.map(|d| d as u32),
        };
        Ok(Some((record, first, last)))
    }

    pub fn listing_count(&self, source: &str) -> Result<i64> {
        let conn = self.conn()?;
        let mut s = conn.prepare("SELECT COUNT(*) FROM listings WHERE source = ?")?;
        Ok(s.query_row(params![source], |r| r.get(0))?)
    }

    pub fn stats(&self) -> Result<Vec<SourceStats>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT source, COUNT(*), MIN(first_seen), MAX(last_seen)
               FROM listings GROUP BY source ORDER BY source"#,
        )?;
        let stats = stmt
            .query_map([], |r| {
                Ok(SourceStats {
                    source: r.get(0)?,
                    records: r.get(1)?,
                    first_seen: r.get(2)?,
                    last_seen: r.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    pub fn run_count(&self, source: &str) -> Result<i64> {
        let conn = self.conn()?;
        let mut s = conn.prepare("SELECT COUNT(*) FROM crawl_runs WHERE source = ?")?;
        Ok(s.query_row(params![source], |r| r.get(0))?)
    }
}

impl RecordStore for Repository {
    fn preload(&self, source: &str) -> Result<HashMap<String, String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT url, content_fingerprint FROM listings WHERE source = ?")?;
        let known = stmt
            .query_map(params![source], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<std::result::Result<HashMap<String, String>, _>>()
            .with_context(|| format!("preload {source}"))?;
        Ok(known)
    }

    fn lookup(&self, source: &str, url: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        match conn.query_row(
            "SELECT content_fingerprint FROM listings WHERE source = ? AND url = ?",
            params![source, url],
            |r| r.get(0),
        ) {
            Ok(fp) => Ok(Some(fp)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("lookup {url}")),
        }
    }

    fn upsert(&self, source: &str, record: &Record, fingerprint: &str) -> Result<()> {
        self.upsert_at(source, record, fingerprint, Utc::now().naive_utc())
    }

    // ── Crawl run log ─────────────────────────────────────────────────────────

    fn begin_run(&self, source: &str) -> Result<i64> {
        let conn = self.conn()?;
        let id: i64 = conn.query_row(
            "INSERT INTO crawl_runs (source, started_at, status) VALUES (?, ?, 'running') RETURNING id",
            params![source, Utc::now().naive_utc()],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    fn finish_run(&self, run_id: i64, summary: &RunSummary) -> Result<()> {
        self.conn()?.execute(
            r#"UPDATE crawl_runs SET
               finished_at = ?, status = ?,
               iterations = ?, accepted = ?, skipped = ?,
               termination = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if summary.error.is_none() { "success" } else { "error" },
                summary.iterations as i64,
                summary.accepted as i64,
                summary.skipped as i64,
                summary.termination,
                summary.error,
                run_id,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn repo() -> Repository {
        let r = Repository::open_in_memory().unwrap();
        r.run_migrations().unwrap();
        r
    }

    fn record(url: &str, title: &str) -> Record {
        Record::new(url, 2)
            .with(fields::TITLE, title)
            .with(fields::ORGANIZATION, "Acme")
            .with(fields::SKILLS, "Rust, SQL")
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let r = repo();
        r.run_migrations().unwrap();
        assert_eq!(r.listing_count("internshala").unwrap(), 0);
    }

    #[test]
    fn test_upsert_inserts_then_updates_in_place() {
        let r = repo();
        let t0 = Utc::now().naive_utc();
        let t1 = t0 + Duration::hours(6);

        r.upsert_at("internshala", &record("https://x/1", "Intern"), "fp1", t0).unwrap();
        r.upsert_at("internshala", &record("https://x/1", "Senior Intern"), "fp2", t1).unwrap();

        assert_eq!(r.listing_count("internshala").unwrap(), 1);
        let (stored, first, last) = r.fetch("internshala", "https://x/1").unwrap().unwrap();
        assert_eq!(stored.get(fields::TITLE), Some("Senior Intern"));
        assert_eq!(stored.get(fields::SKILLS), Some("Rust, SQL"));
        assert_eq!(stored.page, 2);
        assert!(first < last);
        assert_eq!(r.lookup("internshala", "https://x/1").unwrap().as_deref(), Some("fp2"));
    }

    #[test]
    fn test_full_fingerprint_round_trips() {
        let r = repo();
        let rec = record("https://x/9", "Data Intern");
        let fp = crate::dedup::fingerprint(&rec, &[fields::TITLE, fields::ORGANIZATION]);
        assert_eq!(fp.len(), 64);

        r.upsert("internshala", &rec, &fp).unwrap();
        assert_eq!(r.lookup("internshala", "https://x/9").unwrap(), Some(fp.clone()));
        assert_eq!(r.preload("internshala").unwrap()["https://x/9"], fp);
    }

    #[test]
    fn test_sources_are_isolated() {
        let r = repo();
        r.upsert("internshala", &record("https://x/1", "A"), "fp-a").unwrap();
        r.upsert("unstop", &record("https://x/1", "B"), "fp-b").unwrap();

        let known = r.preload("internshala").unwrap();
        assert_eq!(known.len(), 1);
        assert_eq!(known["https://x/1"], "fp-a");
        assert_eq!(r.lookup("naukri", "https://x/1").unwrap(), None);

        let stats = r.stats().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].source, "internshala");
        assert_eq!(stats[0].records, 1);
    }

    #[test]
    fn test_run_log() {
        let r = repo();
        let id = r.begin_run("naukri").unwrap();
        let id2 = r.begin_run("naukri").unwrap();
        assert_ne!(id, id2);
        r.finish_run(
            id,
            &RunSummary {
                iterations: 3,
                accepted: 12,
                skipped: 4,
                termination: "budget exhausted".into(),
                error: None,
            },
        )
        .unwrap();
        assert_eq!(r.run_count("naukri").unwrap(), 2);
    }
}
