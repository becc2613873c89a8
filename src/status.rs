//! Per-document store overview (`shards status`).

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Print a markdown table: document, section count, token total, last update.
///
/// A schema-version mismatch is reported as a warning; the rows are still
/// listed since the table layout is shared across versions.
pub async fn run_status(config: &Config) -> Result<()> {
    let pool = db::connect_read_only(&config.db_path()).await?;
    if let Err(e) = migrate::check_schema_version(&pool).await {
        tracing::warn!("{}", e);
    }
    let store = SqliteStore::new(pool, config.fts);
    let rows = store.status().await?;

    println!("| DocId | Sections | Tokens | Last Updated |");
    println!("| --- | ---: | ---: | --- |");
    for r in &rows {
        println!(
            "| {} | {} | {} | {} |",
            r.doc_id, r.sections, r.tokens, r.last_updated
        );
    }

    store.pool().close().await;
    Ok(())
}
