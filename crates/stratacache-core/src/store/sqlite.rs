//! SQLite adapter for [`PersistentStore`].
//!
//! One connection behind a mutex; WAL for file-backed databases (no-op for
//! in-memory). Timestamps are stored as RFC 3339 text, metadata as a JSON
//! column.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::schema::CACHE_SCHEMA;
use super::PersistentStore;
use crate::errors::CacheError;
use crate::record::{CacheRecord, EvictionPolicy, Tier};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a file-backed store.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path)
            .map_err(|e| CacheError::Initialization(e.to_string()))?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store. Backs the disk tier when persistence is
    /// disabled, and tests.
    pub fn memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CacheError::Initialization(e.to_string()))?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), CacheError> {
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute("PRAGMA journal_mode = WAL", []);
        conn.execute_batch(CACHE_SCHEMA)
            .map_err(|e| CacheError::Initialization(e.to_string()))?;
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheRecord> {
        let metadata: Option<String> = row.get(6)?;
        Ok(CacheRecord {
            key: row.get(0)?,
            payload: row.get(1)?,
            created_at: parse_ts(&row.get::<_, String>(2)?),
            expires_at: parse_ts(&row.get::<_, String>(3)?),
            size_bytes: row.get::<_, i64>(4)? as u64,
            policy: parse_policy(&row.get::<_, String>(5)?),
            metadata: metadata
                .and_then(|s| serde_json::from_str::<HashMap<String, String>>(&s).ok())
                .unwrap_or_default(),
            compressed: row.get::<_, i64>(7)? != 0,
            encrypted: row.get::<_, i64>(8)? != 0,
            accessed_at: parse_ts(&row.get::<_, String>(9)?),
            access_count: row.get::<_, i64>(10)? as u64,
        })
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn parse_policy(s: &str) -> EvictionPolicy {
    match s {
        "lfu" => EvictionPolicy::Lfu,
        "fifo" => EvictionPolicy::Fifo,
        "random" => EvictionPolicy::Random,
        _ => EvictionPolicy::Lru,
    }
}

fn storage_err(e: rusqlite::Error) -> CacheError {
    CacheError::Storage {
        tier: Tier::Disk,
        detail: e.to_string(),
    }
}

impl PersistentStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT key, payload, created_at, expires_at, size_bytes, policy,
                    metadata, compressed, encrypted, accessed_at, access_count
             FROM cache_records WHERE key = ?1",
            params![key],
            Self::row_to_record,
        )
        .optional()
        .map_err(storage_err)
    }

    fn put(&self, record: &CacheRecord) -> Result<(), CacheError> {
        let metadata = serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".into());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cache_records (
                key, payload, created_at, expires_at, size_bytes, policy,
                metadata, compressed, encrypted, accessed_at, access_count
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                size_bytes = excluded.size_bytes,
                policy = excluded.policy,
                metadata = excluded.metadata,
                compressed = excluded.compressed,
                encrypted = excluded.encrypted,
                accessed_at = excluded.accessed_at,
                access_count = excluded.access_count",
            params![
                record.key,
                record.payload,
                record.created_at.to_rfc3339(),
                record.expires_at.to_rfc3339(),
                record.size_bytes as i64,
                record.policy.as_str(),
                metadata,
                record.compressed as i64,
                record.encrypted as i64,
                record.accessed_at.to_rfc3339(),
                record.access_count as i64,
            ],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let conn = self.conn.lock().unwrap();
        let n = conn
            .execute("DELETE FROM cache_records WHERE key = ?1", params![key])
            .map_err(storage_err)?;
        Ok(n > 0)
    }

    fn clear(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM cache_records", [])
            .map_err(storage_err)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT key FROM cache_records")
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(storage_err)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(storage_err)?);
        }
        Ok(out)
    }

    fn count(&self) -> Result<u64, CacheError> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM cache_records", [], |row| row.get(0))
            .map_err(storage_err)?;
        Ok(n as u64)
    }
}
