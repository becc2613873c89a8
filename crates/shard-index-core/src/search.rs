//! Query engine: three retrieval modes over any [`Retriever`].
//!
//! The entry point [`search`] validates the request once (pattern
//! compilation, document filter support, result cap) and then dispatches to
//! the backend. Backends never see an uncompiled pattern, so an invalid
//! regex fails before any section is scanned.
//!
//! | Mode | Backend A (shard) | Backend B (SQLite) |
//! |------|-------------------|--------------------|
//! | [`Query::Keyword`] | keyword index lookup | `json_each` membership |
//! | [`Query::Regex`] | scan in section order | scan in row order |
//! | [`Query::FreeText`] | BM25, higher is better | FTS5 `bm25()`, lower is better |

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};
use crate::models::SearchHit;

/// One retrieval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Sections whose keyword list contains this exact term.
    Keyword(String),
    /// Sections whose content matches; case-insensitive unless asked.
    Regex {
        pattern: String,
        case_sensitive: bool,
    },
    /// BM25-ranked free text.
    FreeText(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Result cap; `None` returns everything.
    pub limit: Option<usize>,
    /// Restrict to one document. Only backends that report
    /// [`Retriever::supports_doc_filter`] accept it.
    pub doc_id: Option<String>,
}

/// A searchable backend.
///
/// Implementations may ignore `opts.limit` (the dispatcher truncates), but
/// must honor `opts.doc_id` when they claim to support it.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn keyword_search(&self, keyword: &str, opts: &QueryOptions) -> Result<Vec<SearchHit>>;

    async fn regex_search(&self, pattern: &Regex, opts: &QueryOptions) -> Result<Vec<SearchHit>>;

    /// `query` is never blank here.
    async fn bm25_search(&self, query: &str, opts: &QueryOptions) -> Result<Vec<SearchHit>>;

    fn supports_doc_filter(&self) -> bool {
        false
    }
}

/// Compile a user pattern the way every backend expects it.
pub fn compile_pattern(pattern: &str, case_sensitive: bool) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()?)
}

/// Validate `query` and run it against `retriever`.
pub async fn search<R>(retriever: &R, query: &Query, opts: &QueryOptions) -> Result<Vec<SearchHit>>
where
    R: Retriever + ?Sized,
{
    if opts.limit == Some(0) {
        return Err(Error::validation("result limit must be at least 1"));
    }
    if opts.doc_id.is_some() && !retriever.supports_doc_filter() {
        return Err(Error::validation(
            "document filter is only supported by the sqlite backend",
        ));
    }

    let mut hits = match query {
        Query::Keyword(keyword) => {
            if keyword.trim().is_empty() {
                return Ok(Vec::new());
            }
            retriever.keyword_search(keyword, opts).await?
        }
        Query::Regex {
            pattern,
            case_sensitive,
        } => {
            let re = compile_pattern(pattern, *case_sensitive)?;
            retriever.regex_search(&re, opts).await?
        }
        Query::FreeText(text) => {
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            retriever.bm25_search(text, opts).await?
        }
    };

    if let Some(limit) = opts.limit {
        hits.truncate(limit);
    }
    Ok(hits)
}
