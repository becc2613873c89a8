//! Storage backends that live entirely in memory.
//!
//! The relational backend needs a database driver and therefore lives in the
//! application crate; both implement [`Retriever`](crate::search::Retriever).

pub mod shard;

pub use shard::ShardRetriever;
