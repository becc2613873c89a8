//! Core data models shared by the segmenter, the index builder, and both
//! storage backends.

use serde::{Deserialize, Serialize};

/// Separator between the document id and the slug in a global section id.
pub const ID_SEPARATOR: char = ':';

/// Human-readable description of the global id layout, stored in artifacts.
pub const ID_FORMAT: &str = "docId:slug";

/// One titled chunk of a document; the unit of indexing and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Globally unique `doc_id:slug`.
    pub id: String,
    /// Bare slug, unique within its document.
    pub legacy_id: String,
    pub title: String,
    pub content: String,
    /// Lower-case hex SHA-256 of `content`.
    pub content_hash: String,
    /// Whitespace-delimited token count of `content`.
    pub token_count: u64,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub ai_hints: Vec<String>,
    #[serde(default)]
    pub summary: String,
    /// `[start, end]`, 1-based inclusive; empty when unknown.
    #[serde(default)]
    pub line_range: Vec<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl Section {
    /// The document id encoded in [`Section::id`].
    pub fn doc_id(&self) -> &str {
        self.id
            .split_once(ID_SEPARATOR)
            .map(|(doc, _)| doc)
            .unwrap_or("")
    }
}

/// Build the global id for a slug within a document.
pub fn make_section_id(doc_id: &str, slug: &str) -> String {
    format!("{}{}{}", doc_id, ID_SEPARATOR, slug)
}

/// A retrieval result.
///
/// `score` is only set by free-text queries. Scores are backend-specific:
/// the shard backend reports BM25 (higher is better) while the SQLite
/// backend reports FTS5 `bm25()` rank (lower is better). Never compare raw
/// scores across backends.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub doc_id: String,
    pub legacy_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub summary: String,
    pub file_path: Option<String>,
    pub line_range: Vec<u64>,
    #[serde(skip)]
    pub content: String,
}

impl SearchHit {
    pub fn from_section(section: &Section, score: Option<f64>) -> Self {
        Self {
            id: section.id.clone(),
            doc_id: section.doc_id().to_string(),
            legacy_id: section.legacy_id.clone(),
            title: section.title.clone(),
            score,
            summary: section.summary.clone(),
            file_path: section.file_path.clone(),
            line_range: section.line_range.clone(),
            content: section.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_section_id_format() {
        assert_eq!(make_section_id("SKILL", "intro"), "SKILL:intro");
        assert_ne!(
            make_section_id("DOC_A", "section1"),
            make_section_id("DOC_B", "section1")
        );
    }

    #[test]
    fn test_doc_id_from_section_id() {
        let section = Section {
            id: "guide:setup".to_string(),
            legacy_id: "setup".to_string(),
            title: "Setup".to_string(),
            content: String::new(),
            content_hash: String::new(),
            token_count: 0,
            keywords: vec![],
            links: vec![],
            ai_hints: vec![],
            summary: String::new(),
            line_range: vec![],
            file_path: None,
        };
        assert_eq!(section.doc_id(), "guide");
    }
}
