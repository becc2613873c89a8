//! Backend A: queries against one loaded shard artifact.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;

use crate::bm25;
use crate::error::{Error, Result};
use crate::models::{SearchHit, Section};
use crate::search::{QueryOptions, Retriever};
use crate::shard::{Shard, SCHEMA_VERSION};

/// Read-only view over a [`Shard`].
///
/// Sections are addressable by global id and by bare slug.
pub struct ShardRetriever {
    shard: Shard,
    by_slug: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl ShardRetriever {
    pub fn new(shard: Shard) -> Self {
        let mut by_slug = HashMap::new();
        let mut by_id = HashMap::new();
        for (i, section) in shard.sections.iter().enumerate() {
            by_slug.insert(section.legacy_id.clone(), i);
            by_id.insert(section.id.clone(), i);
        }
        Self {
            shard,
            by_slug,
            by_id,
        }
    }

    /// Parse an artifact, rejecting other schema versions.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::json("<shard>", e))?;
        let found = value
            .pointer("/meta/schema_version")
            .and_then(|v| v.as_i64());
        if found != Some(SCHEMA_VERSION) {
            return Err(Error::Schema {
                found: found.map_or_else(|| "none".to_string(), |v| v.to_string()),
                expected: SCHEMA_VERSION,
            });
        }
        let shard: Shard = serde_json::from_value(value).map_err(|e| Error::json("<shard>", e))?;
        Ok(Self::new(shard))
    }

    pub fn shard(&self) -> &Shard {
        &self.shard
    }

    /// Look a section up by `doc:slug` or by bare slug.
    pub fn get(&self, id_or_slug: &str) -> Option<&Section> {
        self.by_id
            .get(id_or_slug)
            .or_else(|| self.by_slug.get(id_or_slug))
            .map(|&i| &self.shard.sections[i])
    }
}

#[async_trait]
impl Retriever for ShardRetriever {
    async fn keyword_search(&self, keyword: &str, _opts: &QueryOptions) -> Result<Vec<SearchHit>> {
        let Some(slugs) = self.shard.index.keywords.get(keyword) else {
            return Ok(Vec::new());
        };
        Ok(slugs
            .iter()
            .filter_map(|slug| self.get(slug))
            .map(|s| SearchHit::from_section(s, None))
            .collect())
    }

    async fn regex_search(&self, pattern: &Regex, _opts: &QueryOptions) -> Result<Vec<SearchHit>> {
        Ok(self
            .shard
            .sections
            .iter()
            .filter(|s| pattern.is_match(&s.content))
            .map(|s| SearchHit::from_section(s, None))
            .collect())
    }

    async fn bm25_search(&self, query: &str, _opts: &QueryOptions) -> Result<Vec<SearchHit>> {
        let lengths: HashMap<&str, u64> = self
            .shard
            .sections
            .iter()
            .map(|s| (s.legacy_id.as_str(), s.token_count))
            .collect();
        let ranked = bm25::rank(
            &self.shard.index.term_index,
            &self.shard.meta.bm25,
            &lengths,
            query,
        );
        Ok(ranked
            .into_iter()
            .filter_map(|(slug, score)| {
                self.get(&slug)
                    .map(|s| SearchHit::from_section(s, Some(score)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Bm25Params;
    use crate::search::{search, Query};
    use crate::segment::{split_markdown, sections_from_files, SectionFile};

    fn guide() -> ShardRetriever {
        let sections = split_markdown(
            "guide",
            "## Intro\nParsing basics, a few options and `parser` usage.\n\n\
             ## Details\nConfiguration options. Configuration files. Parsing flags.\n",
            2,
            Some("source.md"),
        )
        .unwrap();
        ShardRetriever::new(Shard::build("guide", sections, Bm25Params::default()))
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_keyword_lookup() {
        let r = guide();
        let hits = search(&r, &Query::Keyword("parser".into()), &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(ids(&hits), vec!["guide:intro"]);
        assert!(hits[0].score.is_none());

        let none = search(&r, &Query::Keyword("missing".into()), &QueryOptions::default())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_regex_case_insensitive_by_default() {
        let r = guide();
        let query = Query::Regex {
            pattern: "PARSING".into(),
            case_sensitive: false,
        };
        let hits = search(&r, &query, &QueryOptions::default()).await.unwrap();
        assert_eq!(ids(&hits), vec!["guide:intro", "guide:details"]);

        let strict = Query::Regex {
            pattern: "PARSING".into(),
            case_sensitive: true,
        };
        assert!(search(&r, &strict, &QueryOptions::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_free_text_ranks_details_first() {
        let r = guide();
        let hits = search(
            &r,
            &Query::FreeText("configuration options".into()),
            &QueryOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(ids(&hits), vec!["guide:details", "guide:intro"]);
        assert!(hits[1].score.unwrap() > 0.0);
        assert!(hits[0].score.unwrap() > hits[1].score.unwrap());

        let both = search(&r, &Query::FreeText("parsing".into()), &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(both.len(), 2);
        assert!(both[0].score >= both[1].score);
    }

    #[tokio::test]
    async fn test_adding_term_occurrence_never_lowers_score() {
        async fn score_of(content: &str) -> f64 {
            let files = vec![
                SectionFile {
                    file_name: "01-target.md".into(),
                    path: "sections/01-target.md".into(),
                    content: content.into(),
                },
                SectionFile {
                    file_name: "02-other.md".into(),
                    path: "sections/02-other.md".into(),
                    content: "# Other\nunrelated words here\n".into(),
                },
            ];
            let sections = sections_from_files("doc", &files, None);
            let r = ShardRetriever::new(Shard::build("doc", sections, Bm25Params::default()));
            let hits = search(&r, &Query::FreeText("widget".into()), &QueryOptions::default())
                .await
                .unwrap();
            hits[0].score.unwrap()
        }

        let once = score_of("# Target\nwidget alpha beta gamma\n").await;
        let twice = score_of("# Target\nwidget widget alpha beta gamma\n").await;
        assert!(twice >= once);
    }

    #[tokio::test]
    async fn test_doc_filter_rejected() {
        let r = guide();
        let opts = QueryOptions {
            limit: None,
            doc_id: Some("guide".into()),
        };
        let err = search(&r, &Query::FreeText("parsing".into()), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_get_by_id_or_slug() {
        let r = guide();
        assert_eq!(r.get("guide:details").unwrap().title, "Details");
        assert_eq!(r.get("details").unwrap().id, "guide:details");
        assert!(r.get("guide:nope").is_none());
    }

    #[test]
    fn test_from_json_schema_guard() {
        let r = guide();
        let json = String::from_utf8(r.shard().to_json_bytes().unwrap()).unwrap();
        assert!(ShardRetriever::from_json(&json).is_ok());

        let old = json.replacen("\"schema_version\": 2", "\"schema_version\": 1", 1);
        assert!(matches!(
            ShardRetriever::from_json(&old),
            Err(Error::Schema { .. })
        ));
    }
}
