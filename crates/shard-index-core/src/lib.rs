//! # Shard Index Core
//!
//! Pure logic for the shard index: section models, the segmenter, the
//! inverted index and BM25 scorer, manifest diffing, the shard artifact
//! schema, and the [`Retriever`](search::Retriever) trait with its in-memory
//! shard backend.
//!
//! This crate performs no filesystem or database I/O. Callers read sources
//! and hand their contents in; the application crate owns persistence.

pub mod bm25;
pub mod error;
pub mod index;
pub mod manifest;
pub mod models;
pub mod search;
pub mod segment;
pub mod shard;
pub mod store;
pub mod tokenize;

pub use error::{Error, Result};
