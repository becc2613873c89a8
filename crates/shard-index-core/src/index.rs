//! Inverted index and BM25 corpus statistics for one document.
//!
//! Every map is a `BTreeMap` so the serialized artifact is byte-stable for
//! identical input. Posting lists are appended in section-processing order,
//! never re-sorted by frequency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Section;
use crate::tokenize::tokenize;

pub const DEFAULT_K1: f64 = 1.5;
pub const DEFAULT_B: f64 = 0.75;

/// `(slug, term_frequency)`; serialized as a two-element array.
pub type Posting = (String, u32);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub links: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub ai_hints: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub term_index: BTreeMap<String, Vec<Posting>>,
}

/// Corpus statistics consumed by the BM25 scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Stats {
    pub k1: f64,
    pub b: f64,
    pub doc_count: u64,
    pub avgdl: f64,
}

/// Tunable BM25 constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
        }
    }
}

/// Build all four inverted indices for `sections`, keyed by legacy slug.
pub fn build_index(sections: &[Section]) -> InvertedIndex {
    let mut index = InvertedIndex::default();

    for section in sections {
        let slug = &section.legacy_id;
        for keyword in &section.keywords {
            push_slug(&mut index.keywords, keyword, slug);
        }
        for link in &section.links {
            push_slug(&mut index.links, link, slug);
        }
        for hint in &section.ai_hints {
            push_slug(&mut index.ai_hints, hint, slug);
        }

        let mut term_freq: BTreeMap<String, u32> = BTreeMap::new();
        for term in tokenize(&section.content) {
            *term_freq.entry(term).or_insert(0) += 1;
        }
        for (term, tf) in term_freq {
            index
                .term_index
                .entry(term)
                .or_default()
                .push((slug.clone(), tf));
        }
    }

    index
}

fn push_slug(map: &mut BTreeMap<String, Vec<String>>, key: &str, slug: &str) {
    map.entry(key.to_string()).or_default().push(slug.to_string());
}

/// Corpus statistics; `avgdl` falls back to 1 when it would be zero.
pub fn corpus_stats(sections: &[Section], params: Bm25Params) -> Bm25Stats {
    let doc_count = sections.len() as u64;
    let total: u64 = sections.iter().map(|s| s.token_count).sum();
    let mean = if doc_count > 0 {
        total as f64 / doc_count as f64
    } else {
        0.0
    };
    Bm25Stats {
        k1: params.k1,
        b: params.b,
        doc_count,
        avgdl: if mean > 0.0 { mean } else { 1.0 },
    }
}
