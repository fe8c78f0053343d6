//! Authoritative tier: one SQLite row per request key.
//!
//! Writes are plain upserts and partial updates with no optimistic locking;
//! concurrent writers to the same key race and the last write wins.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use common::ResearchArtifact;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::entry::{CacheEntry, CacheError, EntryPatch};
use crate::tier::CacheTier;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS research_cache (
    key            TEXT PRIMARY KEY,
    artifact       TEXT,
    steps          TEXT,
    created_at_ms  INTEGER NOT NULL,
    expires_at_ms  INTEGER NOT NULL,
    validity_hours INTEGER NOT NULL
);
";

const SELECT_COLUMNS: &str =
    "SELECT key, artifact, steps, created_at_ms, expires_at_ms, validity_hours FROM research_cache";

pub struct SqliteTier {
    conn: Mutex<Connection>,
}

/// Raw column values before JSON decoding.
struct StoredRow {
    key: String,
    artifact: Option<String>,
    steps: Option<String>,
    created_at_ms: i64,
    expires_at_ms: i64,
    validity_hours: u32,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            artifact: row.get(1)?,
            steps: row.get(2)?,
            created_at_ms: row.get(3)?,
            expires_at_ms: row.get(4)?,
            validity_hours: row.get(5)?,
        })
    }

    fn decode(self) -> Result<CacheEntry, CacheError> {
        Ok(CacheEntry {
            key: self.key,
            artifact: self.artifact.as_deref().map(serde_json::from_str).transpose()?,
            steps: self.steps.as_deref().map(serde_json::from_str).transpose()?,
            created_at: from_millis(self.created_at_ms)?,
            expires_at: from_millis(self.expires_at_ms)?,
            validity_hours: self.validity_hours,
        })
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, CacheError> {
    DateTime::from_timestamp_millis(ms).ok_or(CacheError::Timestamp(ms))
}

fn encode_steps(steps: &Option<Vec<String>>) -> Result<Option<String>, CacheError> {
    Ok(steps.as_ref().map(serde_json::to_string).transpose()?)
}

impl SqliteTier {
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T, CacheError>) -> Result<T, CacheError> {
        let mut conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        f(&mut conn)
    }

    fn query_one(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Option<CacheEntry>, CacheError> {
        conn.query_row(sql, params, StoredRow::from_row)
            .optional()?
            .map(StoredRow::decode)
            .transpose()
    }
}

impl CacheTier for SqliteTier {
    fn name(&self) -> &'static str {
        "authoritative"
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.with_conn(|conn| {
            Self::query_one(conn, &format!("{} WHERE key = ?1", SELECT_COLUMNS), params![key])
        })
    }

    fn lookup(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
        self.with_conn(|conn| {
            Self::query_one(
                conn,
                &format!(
                    "{} WHERE key = ?1 AND expires_at_ms > ?2 AND artifact IS NOT NULL",
                    SELECT_COLUMNS
                ),
                params![key, now.timestamp_millis()],
            )
        })
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let artifact = entry.artifact.as_ref().map(serde_json::to_string).transpose()?;
        let steps = encode_steps(&entry.steps)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO research_cache
                     (key, artifact, steps, created_at_ms, expires_at_ms, validity_hours)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(key) DO UPDATE SET
                     artifact = excluded.artifact,
                     steps = COALESCE(excluded.steps, research_cache.steps),
                     created_at_ms = excluded.created_at_ms,
                     expires_at_ms = excluded.expires_at_ms,
                     validity_hours = excluded.validity_hours",
                params![
                    entry.key,
                    artifact,
                    steps,
                    entry.created_at.timestamp_millis(),
                    entry.expires_at.timestamp_millis(),
                    entry.validity_hours,
                ],
            )?;
            debug!(key = %entry.key, "Authoritative row upserted");
            Ok(())
        })
    }

    fn put_steps(&self, placeholder: CacheEntry) -> Result<(), CacheError> {
        let steps = encode_steps(&placeholder.steps)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO research_cache
                     (key, artifact, steps, created_at_ms, expires_at_ms, validity_hours)
                 VALUES (?1, NULL, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET steps = excluded.steps",
                params![
                    placeholder.key,
                    steps,
                    placeholder.created_at.timestamp_millis(),
                    placeholder.expires_at.timestamp_millis(),
                    placeholder.validity_hours,
                ],
            )?;
            Ok(())
        })
    }

    fn patch(&self, key: &str, patch: &EntryPatch) -> Result<bool, CacheError> {
        self.with_conn(|conn| {
            let changed = match patch {
                EntryPatch::Image(image) => conn.execute(
                    "UPDATE research_cache SET artifact = json_set(artifact, '$.image', ?1)
                     WHERE key = ?2 AND artifact IS NOT NULL",
                    params![image, key],
                )?,
                EntryPatch::Steps(steps) => conn.execute(
                    "UPDATE research_cache SET steps = ?1 WHERE key = ?2",
                    params![serde_json::to_string(steps)?, key],
                )?,
                EntryPatch::AppendGroups(groups) => {
                    let tx = conn.transaction()?;
                    let stored: Option<Option<String>> = tx
                        .query_row(
                            "SELECT artifact FROM research_cache WHERE key = ?1",
                            params![key],
                            |row| row.get(0),
                        )
                        .optional()?;
                    let Some(Some(raw)) = stored else {
                        return Ok(false);
                    };
                    let mut artifact: ResearchArtifact = serde_json::from_str(&raw)?;
                    artifact.groups.extend(groups.iter().cloned());
                    let changed = tx.execute(
                        "UPDATE research_cache SET artifact = ?1 WHERE key = ?2",
                        params![serde_json::to_string(&artifact)?, key],
                    )?;
                    tx.commit()?;
                    changed
                }
            };
            Ok(changed > 0)
        })
    }
}
