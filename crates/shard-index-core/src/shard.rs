//! The shard artifact: one self-contained serialized form of a document.
//!
//! ```text
//! { meta: { doc_id, generated_at, schema_version, id_format,
//!           bm25: { k1, b, doc_count, avgdl } },
//!   sections: [ … ],
//!   index: { keywords, links, ai_hints, term_index } }
//! ```
//!
//! A shard is always regenerated wholesale. `meta.generated_at` is the only
//! field allowed to differ between two builds of the same input, and
//! [`Shard::fingerprint`] excludes it.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::{build_index, corpus_stats, Bm25Params, Bm25Stats, InvertedIndex};
use crate::models::{make_section_id, Section, ID_FORMAT, ID_SEPARATOR};
use crate::tokenize::{bytes_hash, content_hash, token_count};

/// Schema version written into artifacts and manifests.
pub const SCHEMA_VERSION: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardMeta {
    pub doc_id: String,
    pub generated_at: String,
    pub schema_version: i64,
    pub id_format: String,
    pub bm25: Bm25Stats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    pub meta: ShardMeta,
    pub sections: Vec<Section>,
    pub index: InvertedIndex,
}

impl Shard {
    /// Index `sections` and wrap them into a fresh artifact.
    pub fn build(doc_id: &str, sections: Vec<Section>, params: Bm25Params) -> Self {
        let index = build_index(&sections);
        let bm25 = corpus_stats(&sections, params);
        Self {
            meta: ShardMeta {
                doc_id: doc_id.to_string(),
                generated_at: Utc::now().to_rfc3339(),
                schema_version: SCHEMA_VERSION,
                id_format: ID_FORMAT.to_string(),
                bm25,
            },
            sections,
            index,
        }
    }

    /// Pretty JSON with a trailing newline, as written to disk.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::json(format!("<shard {}>", self.meta.doc_id), e))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Hash of the serialized artifact with `generated_at` blanked out.
    pub fn fingerprint(&self) -> Result<String> {
        let mut copy = self.clone();
        copy.meta.generated_at.clear();
        Ok(bytes_hash(&copy.to_json_bytes()?))
    }
}

/// Section as found in artifacts written by older tooling; every field is
/// optional and camelCase spellings are accepted.
#[derive(Debug, Default, Deserialize)]
struct LegacySection {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "legacyId")]
    legacy_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "contentHash")]
    content_hash: Option<String>,
    #[serde(default, alias = "tokenCount")]
    token_count: Option<u64>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    links: Vec<String>,
    #[serde(default, alias = "aiHints")]
    ai_hints: Vec<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, alias = "lineRange")]
    line_range: Vec<u64>,
    #[serde(default, alias = "filePath", alias = "path")]
    file_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyShard {
    #[serde(default)]
    sections: Vec<LegacySection>,
}

/// Read sections back out of an artifact of any schema version.
///
/// Missing ids are derived from the document id, missing hashes, token
/// counts, and AI hints are recomputed from content. Sections with neither
/// an id nor a slug are skipped.
pub fn sections_from_artifact(doc_id: &str, json: &str) -> serde_json::Result<Vec<Section>> {
    let legacy: LegacyShard = serde_json::from_str(json)?;
    let sections = legacy
        .sections
        .into_iter()
        .filter_map(|s| {
            let raw_id = s.id.filter(|i| !i.is_empty());
            let legacy_id = s.legacy_id.filter(|l| !l.is_empty()).or_else(|| {
                raw_id.as_deref().map(|id| match id.split_once(ID_SEPARATOR) {
                    Some((_, slug)) => slug.to_string(),
                    None => id.to_string(),
                })
            })?;
            // schema 1 artifacts stored the bare slug as the id
            let id = match raw_id {
                Some(id) if id.contains(ID_SEPARATOR) => id,
                _ => make_section_id(doc_id, &legacy_id),
            };
            let content = s.content.unwrap_or_default();
            let ai_hints = if s.ai_hints.is_empty() {
                crate::segment::extract_ai_hints(&content)
            } else {
                s.ai_hints
            };
            Some(Section {
                legacy_id,
                title: s.title.unwrap_or_default(),
                content_hash: s
                    .content_hash
                    .filter(|h| !h.is_empty())
                    .unwrap_or_else(|| content_hash(&content)),
                token_count: s
                    .token_count
                    .filter(|n| *n > 0)
                    .unwrap_or_else(|| token_count(&content)),
                keywords: s.keywords,
                links: s.links,
                ai_hints,
                summary: s.summary.unwrap_or_default(),
                line_range: s.line_range,
                file_path: s.file_path,
                id,
                content,
            })
        })
        .collect();
    Ok(sections)
}
