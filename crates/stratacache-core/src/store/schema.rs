//! Schema initialization for the SQLite-backed store.

pub(crate) const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_records (
    key          TEXT PRIMARY KEY,
    payload      BLOB NOT NULL,
    created_at   TEXT NOT NULL,
    expires_at   TEXT NOT NULL,
    size_bytes   INTEGER NOT NULL,
    policy       TEXT NOT NULL,
    metadata     TEXT NOT NULL DEFAULT '{}',
    compressed   INTEGER NOT NULL DEFAULT 0,
    encrypted    INTEGER NOT NULL DEFAULT 0,
    accessed_at  TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_cache_records_expires_at
    ON cache_records(expires_at);
"#;
