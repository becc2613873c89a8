//! Backend B: the shared SQLite store.
//!
//! One row per section keyed by global id. List-valued fields are stored as
//! compact JSON arrays. Full-text search goes through `sections_fts`, which
//! the schema triggers keep in step with every insert, update, and delete.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use shard_index_core::error::{Error, Result};
use shard_index_core::models::{SearchHit, Section};
use shard_index_core::search::{QueryOptions, Retriever};
use shard_index_core::tokenize::tokenize;

use crate::config::FtsConfig;

const SECTION_COLUMNS: &str = "s.id, s.doc_id, s.legacy_id, s.title, s.content, s.content_hash, \
     s.token_count, s.keywords, s.links, s.ai_hints, s.summary, s.line_range, s.file_path";

/// Counts reported by one document ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub sections: usize,
    pub upserted: usize,
    pub skipped: usize,
    pub deleted: usize,
}

/// One line of `shards status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocStatus {
    pub doc_id: String,
    pub sections: i64,
    pub tokens: i64,
    pub last_updated: String,
}

pub struct SqliteStore {
    pool: SqlitePool,
    fts: FtsConfig,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, fts: FtsConfig) -> Self {
        Self { pool, fts }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upsert `sections` as the complete content of `doc_id`.
    ///
    /// Runs in one transaction: rows with an identical hash are skipped,
    /// new or differing rows are written in full, and rows of the document
    /// absent from `sections` are deleted. On error nothing is committed.
    pub async fn ingest_sections(&self, doc_id: &str, sections: &[Section]) -> Result<IngestReport> {
        // later duplicates of an id win, keeping first-seen position
        let mut incoming: Vec<&Section> = Vec::with_capacity(sections.len());
        let mut position: HashMap<&str, usize> = HashMap::new();
        for section in sections {
            match position.get(section.id.as_str()) {
                Some(&i) => incoming[i] = section,
                None => {
                    position.insert(section.id.as_str(), incoming.len());
                    incoming.push(section);
                }
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(Error::store)?;

        let existing: HashMap<String, Option<String>> =
            sqlx::query("SELECT id, content_hash FROM sections WHERE doc_id = ?")
                .bind(doc_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(Error::store)?
                .iter()
                .map(|row| (row.get("id"), row.get("content_hash")))
                .collect();

        let mut report = IngestReport {
            doc_id: doc_id.to_string(),
            sections: incoming.len(),
            ..Default::default()
        };

        for section in &incoming {
            if existing.get(&section.id).and_then(|h| h.as_deref())
                == Some(section.content_hash.as_str())
            {
                report.skipped += 1;
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO sections (id, doc_id, legacy_id, title, content, content_hash,
                                      token_count, keywords, links, ai_hints, summary,
                                      line_range, file_path, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    doc_id = excluded.doc_id,
                    legacy_id = excluded.legacy_id,
                    title = excluded.title,
                    content = excluded.content,
                    content_hash = excluded.content_hash,
                    token_count = excluded.token_count,
                    keywords = excluded.keywords,
                    links = excluded.links,
                    ai_hints = excluded.ai_hints,
                    summary = excluded.summary,
                    line_range = excluded.line_range,
                    file_path = excluded.file_path,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&section.id)
            .bind(doc_id)
            .bind(&section.legacy_id)
            .bind(&section.title)
            .bind(&section.content)
            .bind(&section.content_hash)
            .bind(section.token_count as i64)
            .bind(json_array(&section.keywords)?)
            .bind(json_array(&section.links)?)
            .bind(json_array(&section.ai_hints)?)
            .bind(&section.summary)
            .bind(json_array(&section.line_range)?)
            .bind(&section.file_path)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(Error::store)?;
            report.upserted += 1;
        }

        let keep: HashSet<&str> = position.keys().copied().collect();
        for stale in existing.keys().filter(|id| !keep.contains(id.as_str())) {
            sqlx::query("DELETE FROM sections WHERE id = ?")
                .bind(stale)
                .execute(&mut *tx)
                .await
                .map_err(Error::store)?;
            report.deleted += 1;
        }

        tx.commit().await.map_err(Error::store)?;

        tracing::info!(
            doc_id = %doc_id,
            sections = report.sections,
            upserted = report.upserted,
            skipped = report.skipped,
            deleted = report.deleted,
            "ingested document"
        );
        Ok(report)
    }

    /// Delete every row of `doc_id`; returns the number removed.
    pub async fn drop_document(&self, doc_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sections WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&self.pool)
            .await
            .map_err(Error::store)?;
        Ok(result.rows_affected())
    }

    pub async fn status(&self) -> Result<Vec<DocStatus>> {
        let rows = sqlx::query(
            r#"
            SELECT doc_id,
                   COUNT(*) AS sections,
                   COALESCE(SUM(token_count), 0) AS tokens,
                   COALESCE(MAX(updated_at), '') AS last_updated
            FROM sections
            GROUP BY doc_id
            ORDER BY doc_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::store)?;

        Ok(rows
            .iter()
            .map(|row| DocStatus {
                doc_id: row.get("doc_id"),
                sections: row.get("sections"),
                tokens: row.get("tokens"),
                last_updated: row.get("last_updated"),
            })
            .collect())
    }

    pub async fn get_section(&self, id: &str) -> Result<Option<Section>> {
        let sql = format!("SELECT {} FROM sections s WHERE s.id = ?", SECTION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::store)?;
        Ok(row.as_ref().map(row_to_section))
    }

    async fn fetch_sections(&self, where_clause: &str, binds: &[&str]) -> Result<Vec<Section>> {
        let sql = format!(
            "SELECT {} FROM sections s {} ORDER BY s.rowid",
            SECTION_COLUMNS, where_clause
        );
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(Error::store)?;
        Ok(rows.iter().map(row_to_section).collect())
    }
}

fn json_array<T: Serialize>(values: &[T]) -> Result<String> {
    serde_json::to_string(values).map_err(|e| Error::json("<sections row>", e))
}

fn json_list<T: serde::de::DeserializeOwned>(raw: Option<String>) -> Vec<T> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn row_to_section(row: &SqliteRow) -> Section {
    let token_count: Option<i64> = row.get("token_count");
    Section {
        id: row.get("id"),
        legacy_id: row.get("legacy_id"),
        title: row.get::<Option<String>, _>("title").unwrap_or_default(),
        content: row.get::<Option<String>, _>("content").unwrap_or_default(),
        content_hash: row
            .get::<Option<String>, _>("content_hash")
            .unwrap_or_default(),
        token_count: token_count.unwrap_or(0).max(0) as u64,
        keywords: json_list(row.get("keywords")),
        links: json_list(row.get("links")),
        ai_hints: json_list(row.get("ai_hints")),
        summary: row.get::<Option<String>, _>("summary").unwrap_or_default(),
        line_range: json_list(row.get("line_range")),
        file_path: row.get("file_path"),
    }
}

/// FTS5 query matching any of the query's terms.
///
/// Terms come from the shared tokenizer, so they are bare alphanumerics and
/// safe to quote.
fn fts_match_expression(query: &str) -> Option<String> {
    let terms = tokenize(query);
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

/// SQL suffix and bind value restricting a query to `opts.doc_id`.
fn doc_filter(opts: &QueryOptions) -> (&'static str, Option<&str>) {
    match opts.doc_id.as_deref() {
        Some(doc) => ("AND s.doc_id = ?", Some(doc)),
        None => ("", None),
    }
}

#[async_trait]
impl Retriever for SqliteStore {
    async fn keyword_search(&self, keyword: &str, opts: &QueryOptions) -> Result<Vec<SearchHit>> {
        let (filter, doc) = doc_filter(opts);
        let binds: Vec<&str> = std::iter::once(keyword).chain(doc).collect();
        let where_clause = format!(
            "WHERE EXISTS (SELECT 1 FROM json_each(s.keywords) WHERE json_each.value = ?) {}",
            filter
        );
        let sections = self.fetch_sections(&where_clause, &binds).await?;
        Ok(sections
            .iter()
            .map(|s| SearchHit::from_section(s, None))
            .collect())
    }

    async fn regex_search(&self, pattern: &Regex, opts: &QueryOptions) -> Result<Vec<SearchHit>> {
        let (filter, doc) = doc_filter(opts);
        let binds: Vec<&str> = doc.into_iter().collect();
        let where_clause = format!("WHERE 1 = 1 {}", filter);
        let sections = self.fetch_sections(&where_clause, &binds).await?;
        Ok(sections
            .iter()
            .filter(|s| pattern.is_match(&s.content))
            .map(|s| SearchHit::from_section(s, None))
            .collect())
    }

    async fn bm25_search(&self, query: &str, opts: &QueryOptions) -> Result<Vec<SearchHit>> {
        let Some(expression) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };
        let (filter, doc) = doc_filter(opts);

        // weights are validated non-negative floats
        let sql = format!(
            r#"
            SELECT {columns},
                   bm25(sections_fts, {tw:?}, {cw:?}, {kw:?}) AS score
            FROM sections_fts
            JOIN sections s ON s.rowid = sections_fts.rowid
            WHERE sections_fts MATCH ? {filter}
            ORDER BY score ASC, s.rowid ASC
            LIMIT ?
            "#,
            columns = SECTION_COLUMNS,
            tw = self.fts.title_weight,
            cw = self.fts.content_weight,
            kw = self.fts.keywords_weight,
            filter = filter,
        );
        let limit = opts.limit.map(|l| l as i64).unwrap_or(-1);

        let mut q = sqlx::query(&sql).bind(expression);
        if let Some(doc) = doc {
            q = q.bind(doc);
        }
        let rows = q
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::store)?;

        Ok(rows
            .iter()
            .map(|row| {
                let score: f64 = row.get("score");
                SearchHit::from_section(&row_to_section(row), Some(score))
            })
            .collect())
    }

    fn supports_doc_filter(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_match_expression() {
        assert_eq!(
            fts_match_expression("Configuration, options!").as_deref(),
            Some("\"configuration\" OR \"options\"")
        );
        assert_eq!(fts_match_expression("\"*\" -- ()"), None);
    }

    #[test]
    fn test_json_list_tolerates_garbage() {
        let v: Vec<String> = json_list(Some("not json".to_string()));
        assert!(v.is_empty());
        let v: Vec<u64> = json_list(Some("[3,9]".to_string()));
        assert_eq!(v, vec![3, 9]);
        let v: Vec<String> = json_list(None);
        assert!(v.is_empty());
    }
}
