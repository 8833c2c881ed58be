use std::ops::Deref;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use tracing::warn;

use crate::cache::{CacheError, CacheStore, SimilarityCacheEntry};
use crate::corpus::FactType;

const SCHEMA_VERSION: i64 = 1;

pub struct SqliteCacheStore {
    conn: Connection,
}

impl SqliteCacheStore {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        let version: i64 = self.conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 0 {
            self.create_schema_v1()?;
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        } else if version == SCHEMA_VERSION {
            self.create_schema_v1()?;
        } else {
            return Err(rusqlite::Error::InvalidQuery);
        }
        Ok(())
    }

    fn create_schema_v1(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS fact_similarity (
                fact_type TEXT NOT NULL,
                value_a TEXT NOT NULL,
                value_b TEXT NOT NULL,
                score REAL NOT NULL CHECK (score >= 0.0 AND score <= 1.0),
                computed_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                PRIMARY KEY (fact_type, value_a, value_b)
            );

            CREATE INDEX IF NOT EXISTS idx_fact_similarity_expires_at
                ON fact_similarity(expires_at);
            ",
        )?;
        Ok(())
    }

    fn insert_on(conn: &Connection, entry: &SimilarityCacheEntry) -> rusqlite::Result<()> {
        Self::validate_score(entry.score)?;
        conn.execute(
            "INSERT OR REPLACE INTO fact_similarity (
                fact_type, value_a, value_b, score, computed_at, expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.fact_type.as_str(),
                entry.value_a,
                entry.value_b,
                f64::from(entry.score),
                encode_timestamp(entry.computed_at),
                encode_timestamp(entry.expires_at)
            ],
        )?;
        Ok(())
    }

    fn validate_score(score: f32) -> rusqlite::Result<()> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(rusqlite::Error::InvalidParameterName(
                "score must be in [0.0, 1.0]".to_string(),
            ));
        }
        Ok(())
    }
}

impl CacheStore for SqliteCacheStore {
    fn upsert(&self, entries: &[SimilarityCacheEntry]) -> Result<(), CacheError> {
        let tx = self.conn.unchecked_transaction()?;
        for entry in entries {
            Self::insert_on(tx.deref(), entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get(
        &self,
        fact_type: FactType,
        value_a: &str,
        value_b: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SimilarityCacheEntry>, CacheError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT fact_type, value_a, value_b, score, computed_at, expires_at
             FROM fact_similarity
             WHERE fact_type = ?1 AND value_a = ?2 AND value_b = ?3 AND expires_at > ?4",
        )?;
        let mut rows = stmt.query(params![
            fact_type.as_str(),
            value_a,
            value_b,
            encode_timestamp(now)
        ])?;
        match rows.next()? {
            Some(row) => Ok(decode_entry(RawRow::read(row)?)),
            None => Ok(None),
        }
    }

    fn scan_valid(&self, now: DateTime<Utc>) -> Result<Vec<SimilarityCacheEntry>, CacheError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT fact_type, value_a, value_b, score, computed_at, expires_at
             FROM fact_similarity
             WHERE expires_at > ?1
             ORDER BY fact_type ASC, value_a ASC, value_b ASC",
        )?;
        let mut rows = stmt.query(params![encode_timestamp(now)])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(entry) = decode_entry(RawRow::read(row)?) {
                out.push(entry);
            }
        }
        Ok(out)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let removed = self.conn.execute(
            "DELETE FROM fact_similarity WHERE expires_at <= ?1",
            params![encode_timestamp(now)],
        )?;
        Ok(removed)
    }

    fn delete_all(&self) -> Result<usize, CacheError> {
        Ok(self.conn.execute("DELETE FROM fact_similarity", [])?)
    }

    fn any_valid(&self, now: DateTime<Utc>) -> Result<bool, CacheError> {
        let found: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM fact_similarity WHERE expires_at > ?1)",
            params![encode_timestamp(now)],
            |row| row.get(0),
        )?;
        Ok(found != 0)
    }

    fn count(&self) -> Result<usize, CacheError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM fact_similarity", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

/// Row exactly as SQLite hands it back, before any domain checks.
struct RawRow {
    fact_type: String,
    value_a: String,
    value_b: String,
    score: f64,
    computed_at: String,
    expires_at: String,
}

impl RawRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            fact_type: row.get(0)?,
            value_a: row.get(1)?,
            value_b: row.get(2)?,
            score: row.get(3)?,
            computed_at: row.get(4)?,
            expires_at: row.get(5)?,
        })
    }
}

fn decode_entry(raw: RawRow) -> Option<SimilarityCacheEntry> {
    let Some(fact_type) = FactType::parse(&raw.fact_type) else {
        warn!(fact_type = %raw.fact_type, "skipping cached score with unknown fact type");
        return None;
    };
    let (Some(computed_at), Some(expires_at)) = (
        decode_timestamp(&raw.computed_at),
        decode_timestamp(&raw.expires_at),
    ) else {
        warn!(
            value_a = %raw.value_a,
            value_b = %raw.value_b,
            "skipping cached score with unreadable timestamps"
        );
        return None;
    };
    if !raw.score.is_finite() || !(0.0..=1.0).contains(&raw.score) {
        warn!(score = raw.score, "skipping cached score outside [0, 1]");
        return None;
    }
    Some(SimilarityCacheEntry {
        fact_type,
        value_a: raw.value_a,
        value_b: raw.value_b,
        score: raw.score as f32,
        computed_at,
        expires_at,
    })
}

// Fixed-width UTC text so string order matches time order in range scans.
fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
