//! # Shard Index
//!
//! Offline section indexing and retrieval for documentation corpora.
//!
//! A corpus root holds one directory per document. Each document is split
//! into titled sections, which are either serialized into a self-contained
//! shard artifact next to the document or ingested into one SQLite store
//! shared by all documents. Both backends answer the same three query modes
//! through [`shard_index_core::search::Retriever`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌────────────────┐
//! │ doc root    │──▶│  Segmenter  │──▶│ shards.json    │  Backend A
//! │ sections/   │   │  + Index    │   │ + manifest     │
//! │ source.md   │   └──────┬──────┘   └───────┬────────┘
//! └─────────────┘          │                  │
//!                          ▼                  ▼
//!                   ┌─────────────┐    ┌────────────┐
//!                   │ SQLite+FTS5 │──▶ │   query    │
//!                   │  Backend B  │    │ kw/re/bm25 │
//!                   └─────────────┘    └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`source`] | Locating and reading a document's sections |
//! | [`build`] | Incremental shard artifact build |
//! | [`fsutil`] | Atomic file replacement |
//! | [`db`] | Database connection |
//! | [`migrate`] | Store schema and version guard |
//! | [`sqlite_store`] | SQLite backend |
//! | [`ingest`] | Store maintenance commands |
//! | [`status`] | Per-document store overview |
//! | [`search`] | Query command |

pub mod build;
pub mod config;
pub mod db;
pub mod fsutil;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod source;
pub mod sqlite_store;
pub mod status;
