//! Store schema creation and the schema-version guard.
//!
//! The FTS5 table is an external-content table over `sections`; the three
//! triggers are the only writers to it, so it cannot drift from row content.

use shard_index_core::error::{Error, Result};
use shard_index_core::shard::SCHEMA_VERSION;
use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sections (
        id TEXT PRIMARY KEY,
        doc_id TEXT NOT NULL,
        legacy_id TEXT NOT NULL,
        title TEXT,
        content TEXT,
        content_hash TEXT,
        token_count INTEGER,
        keywords TEXT,
        links TEXT,
        ai_hints TEXT,
        summary TEXT,
        line_range TEXT,
        file_path TEXT,
        updated_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_sections_doc_id ON sections(doc_id)",
    "CREATE INDEX IF NOT EXISTS idx_sections_content_hash ON sections(content_hash)",
    "CREATE VIRTUAL TABLE IF NOT EXISTS sections_fts USING fts5(
        title, content, keywords,
        tokenize = 'porter unicode61',
        content = 'sections',
        content_rowid = 'rowid'
    )",
    "CREATE TRIGGER IF NOT EXISTS sections_ai AFTER INSERT ON sections BEGIN
        INSERT INTO sections_fts(rowid, title, content, keywords)
        VALUES (new.rowid, new.title, new.content, new.keywords);
    END",
    "CREATE TRIGGER IF NOT EXISTS sections_ad AFTER DELETE ON sections BEGIN
        INSERT INTO sections_fts(sections_fts, rowid, title, content, keywords)
        VALUES ('delete', old.rowid, old.title, old.content, old.keywords);
    END",
    "CREATE TRIGGER IF NOT EXISTS sections_au AFTER UPDATE ON sections BEGIN
        INSERT INTO sections_fts(sections_fts, rowid, title, content, keywords)
        VALUES ('delete', old.rowid, old.title, old.content, old.keywords);
        INSERT INTO sections_fts(rowid, title, content, keywords)
        VALUES (new.rowid, new.title, new.content, new.keywords);
    END",
];

/// Create the schema if needed and verify the stored version.
///
/// The stored version is read before any DDL runs, so a store created by
/// another schema version is rejected with [`Error::Schema`] and left
/// untouched. Schema creation and the `meta` seed rows commit together.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    if let Some(found) = stored_schema_version(pool).await? {
        if found != SCHEMA_VERSION.to_string() {
            return Err(Error::Schema {
                found,
                expected: SCHEMA_VERSION,
            });
        }
    }

    let mut tx = pool.begin().await.map_err(Error::store)?;
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(Error::store)?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("INSERT OR IGNORE INTO meta(key, value) VALUES ('schema_version', ?)")
        .bind(SCHEMA_VERSION.to_string())
        .execute(&mut *tx)
        .await
        .map_err(Error::store)?;
    sqlx::query("INSERT OR IGNORE INTO meta(key, value) VALUES ('created_at', ?)")
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::store)?;
    tx.commit().await.map_err(Error::store)?;

    check_schema_version(pool).await
}

/// Compare `meta.schema_version` with the version this build writes.
pub async fn check_schema_version(pool: &SqlitePool) -> Result<()> {
    match stored_schema_version(pool).await? {
        Some(v) if v == SCHEMA_VERSION.to_string() => Ok(()),
        other => Err(Error::Schema {
            found: other.unwrap_or_else(|| "none".to_string()),
            expected: SCHEMA_VERSION,
        }),
    }
}

/// `meta.schema_version`, or `None` for a store without a `meta` table or
/// without the row.
async fn stored_schema_version(pool: &SqlitePool) -> Result<Option<String>> {
    let has_meta: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'meta'",
    )
    .fetch_one(pool)
    .await
    .map_err(Error::store)?;
    if has_meta == 0 {
        return Ok(None);
    }

    sqlx::query_scalar("SELECT value FROM meta WHERE key = 'schema_version'")
        .fetch_optional(pool)
        .await
        .map_err(Error::store)
}
