//! Store maintenance commands: `init`, `ingest`, `ingest-all`, `drop`.
//!
//! Every command that writes first runs the schema migration, which also
//! enforces the schema-version guard: a store created by another version is
//! refused before any row is touched.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::source::{discover_documents, load_document};
use crate::sqlite_store::{IngestReport, SqliteStore};

/// Open the store read-write with an up-to-date, version-checked schema.
pub async fn open_store(config: &Config) -> Result<SqliteStore> {
    let db_path = config.db_path();
    let pool = db::connect(&db_path)
        .await
        .with_context(|| format!("Failed to open store: {}", db_path.display()))?;
    migrate::run_migrations(&pool)
        .await
        .with_context(|| format!("Refusing to write to store: {}", db_path.display()))?;
    Ok(SqliteStore::new(pool, config.fts))
}

/// Load one document root and ingest it in its own transaction.
pub async fn ingest_document(
    store: &SqliteStore,
    config: &Config,
    doc_root: &Path,
) -> Result<IngestReport> {
    let source = load_document(doc_root, &config.segmenter, true)
        .with_context(|| format!("Failed to load document: {}", doc_root.display()))?;
    let report = store
        .ingest_sections(&source.doc_id, &source.sections)
        .await
        .with_context(|| format!("Failed to ingest document '{}'", source.doc_id))?;
    Ok(report)
}

/// Ingest every eligible document under `root`, one transaction each.
pub async fn ingest_all(
    store: &SqliteStore,
    config: &Config,
    root: &Path,
) -> Result<Vec<IngestReport>> {
    let docs = discover_documents(root, &config.segmenter)?;
    let mut reports = Vec::with_capacity(docs.len());
    for doc_root in docs {
        reports.push(ingest_document(store, config, &doc_root).await?);
    }
    Ok(reports)
}

pub async fn run_init(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    store.pool().close().await;
    println!("Initialized DB: {}", config.db_path().display());
    Ok(())
}

pub async fn run_ingest(config: &Config, doc_root: &Path) -> Result<()> {
    let store = open_store(config).await?;
    let report = ingest_document(&store, config, doc_root).await?;
    println!(
        "Ingested {}: {} sections (upserted={}, skipped={}, deleted={})",
        report.doc_id, report.sections, report.upserted, report.skipped, report.deleted
    );
    store.pool().close().await;
    Ok(())
}

pub async fn run_ingest_all(config: &Config, root: Option<&Path>) -> Result<()> {
    let root = root.unwrap_or(&config.corpus.root);
    let store = open_store(config).await?;
    let reports = ingest_all(&store, config, root).await?;
    let total_sections: usize = reports.iter().map(|r| r.sections).sum();
    println!(
        "Ingested all docs: {} docs, {} sections",
        reports.len(),
        total_sections
    );
    store.pool().close().await;
    Ok(())
}

pub async fn run_drop(config: &Config, doc_id: &str) -> Result<()> {
    let store = open_store(config).await?;
    let removed = store.drop_document(doc_id).await?;
    println!("Dropped doc: {} ({} sections)", doc_id, removed);
    store.pool().close().await;
    Ok(())
}
