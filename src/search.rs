//! `shards query`: run one retrieval against either backend and print it.

use anyhow::{Context, Result};
use std::path::PathBuf;

use shard_index_core::error::Error;
use shard_index_core::models::SearchHit;
use shard_index_core::search::{search, Query, QueryOptions};
use shard_index_core::store::ShardRetriever;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// A single shard artifact (`--shards`).
    Shard,
    /// The shared SQLite store.
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub backend: Backend,
    pub shards: Option<PathBuf>,
    pub query: Query,
    pub doc_id: Option<String>,
    pub top: Option<usize>,
}

/// Run `req` and return the hits without printing.
pub async fn execute(config: &Config, req: &QueryRequest) -> Result<Vec<SearchHit>> {
    let opts = QueryOptions {
        limit: Some(req.top.unwrap_or(config.retrieval.default_limit)),
        doc_id: req.doc_id.clone(),
    };

    match req.backend {
        Backend::Shard => {
            let path = req.shards.clone().ok_or_else(|| {
                Error::validation("--shards <file> is required with --backend shard")
            })?;
            let json = std::fs::read_to_string(&path)
                .map_err(|e| Error::io(&path, e))
                .with_context(|| "Failed to read shard artifact")?;
            let retriever = ShardRetriever::from_json(&json)
                .with_context(|| format!("Failed to load shard artifact: {}", path.display()))?;
            Ok(search(&retriever, &req.query, &opts).await?)
        }
        Backend::Sqlite => {
            let pool = db::connect_read_only(&config.db_path()).await?;
            if let Err(e) = migrate::check_schema_version(&pool).await {
                tracing::warn!("{}; results may be incomplete", e);
            }
            let store = SqliteStore::new(pool, config.fts);
            let hits = search(&store, &req.query, &opts).await;
            store.pool().close().await;
            Ok(hits?)
        }
    }
}

pub async fn run_query(config: &Config, req: &QueryRequest, json: bool) -> Result<()> {
    let hits = execute(config, req).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for hit in &hits {
        match hit.score {
            Some(score) => println!("[{}] {}  (score {:.4})", hit.id, hit.title, score),
            None => println!("[{}] {}", hit.id, hit.title),
        }
    }
    Ok(())
}
