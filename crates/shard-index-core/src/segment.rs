//! Section segmenter.
//!
//! Turns one document's source into an ordered list of [`Section`]s. Two
//! source shapes are supported:
//!
//! - **Pre-split files** ([`sections_from_files`]): one file per section,
//!   named `NN-slug.md`, optionally described by a metadata index
//!   (`index.json`) keyed by slug.
//! - **Single markdown document** ([`split_markdown`]): split on headings of
//!   a fixed level. Non-blank text before the first heading becomes a leading
//!   `Overview` section.
//!
//! This module performs no I/O; the application layer reads files and hands
//! their contents in.
//!
//! # Slugs
//!
//! Slugs are unique within a document. Repeated slugs are disambiguated in
//! order of appearance with `-2`, `-3`, … so two `Overview` headings yield
//! `overview` and `overview-2`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{make_section_id, Section};
use crate::tokenize::{content_hash, slugify, token_count};

static AI_HINT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*>\s*\[(AI (?:RULE|DECISION|TODO|CONTEXT))\]").expect("valid ai hint regex")
});
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)]+").expect("valid url regex"));
static MD_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]+\]\((https?://[^)]+)\)").expect("valid markdown link regex")
});
static CODE_TERM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid code term regex"));

/// Title given to text that precedes the first heading.
pub const OVERVIEW_TITLE: &str = "Overview";

const MAX_KEYWORD_CHARS: usize = 80;
const MAX_SUMMARY_CHARS: usize = 180;
const FALLBACK_SUMMARY: &str = "Section content.";

/// Per-slug metadata written next to a section directory (`index.json`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataIndex {
    #[serde(default)]
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    #[serde(default)]
    pub slug: Option<String>,
    /// Section title as recorded by the authoring tool.
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub ai_hints: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub line_range: Vec<u64>,
    #[serde(default)]
    pub tokens: Option<u64>,
}

impl MetadataIndex {
    pub fn by_slug(&self) -> HashMap<&str, &IndexEntry> {
        self.entries
            .iter()
            .filter_map(|e| e.slug.as_deref().map(|s| (s, e)))
            .collect()
    }
}

/// A section file read from disk.
#[derive(Debug, Clone)]
pub struct SectionFile {
    /// Bare file name, e.g. `01-intro.md`.
    pub file_name: String,
    /// Path recorded on the section (relative to the document root).
    pub path: String,
    pub content: String,
}

/// Hands out document-unique slugs.
#[derive(Debug, Default)]
pub struct SlugAllocator {
    used: HashSet<String>,
    counters: HashMap<String, usize>,
}

impl SlugAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = if *counter == 1 {
                base.to_string()
            } else {
                format!("{}-{}", base, counter)
            };
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// `01-intro.md` → `intro`; `overview.md` → `overview`.
pub fn slug_from_filename(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    match stem.split_once('-') {
        Some((_, rest)) => rest.to_string(),
        None => stem.to_string(),
    }
}

/// Text of the first line starting with `#`, hashes stripped.
pub fn first_heading(text: &str) -> Option<String> {
    text.lines()
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
}

/// AI annotation tags (`AI RULE`, `AI DECISION`, …), first-seen order, deduplicated.
pub fn extract_ai_hints(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .filter_map(|line| AI_HINT_PATTERN.captures(line))
        .map(|caps| caps[1].to_string())
        .filter(|hint| seen.insert(hint.clone()))
        .collect()
}

/// Bare URLs and markdown link targets, sorted and deduplicated.
pub fn extract_links(text: &str) -> Vec<String> {
    let mut links: BTreeSet<String> = URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    links.extend(
        MD_LINK_PATTERN
            .captures_iter(text)
            .map(|caps| caps[1].to_string()),
    );
    links.into_iter().collect()
}

/// Title, inline code terms, then AI hint tags; trimmed and deduplicated.
pub fn extract_keywords(title: &str, text: &str) -> Vec<String> {
    let mut values = vec![title.to_string()];
    for caps in CODE_TERM_PATTERN.captures_iter(text) {
        let term = caps[1].trim();
        if !term.is_empty() && term.chars().count() <= MAX_KEYWORD_CHARS && !term.starts_with("http")
        {
            values.push(term.to_string());
        }
    }
    values.extend(extract_ai_hints(text));

    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}

/// First prose line of a section, truncated.
pub fn summarize(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty()
                && !line.starts_with('#')
                && !line.starts_with("<!--")
                && !line.starts_with("- ")
                && !line.starts_with('|')
                && !line.starts_with("```")
        })
        .map(|line| line.chars().take(MAX_SUMMARY_CHARS).collect())
        .unwrap_or_else(|| FALLBACK_SUMMARY.to_string())
}

/// Build sections from pre-split files, in the order given.
///
/// Callers pass files sorted by name. Metadata from `index` wins over values
/// derived from the content.
pub fn sections_from_files(
    doc_id: &str,
    files: &[SectionFile],
    index: Option<&MetadataIndex>,
) -> Vec<Section> {
    let by_slug = index.map(MetadataIndex::by_slug).unwrap_or_default();
    let mut slugs = SlugAllocator::new();

    files
        .iter()
        .map(|file| {
            let base_slug = slug_from_filename(&file.file_name);
            let entry = by_slug.get(base_slug.as_str()).copied();
            let slug = slugs.allocate(&base_slug);

            let title = first_heading(&file.content)
                .or_else(|| entry.and_then(|e| e.section.clone()))
                .unwrap_or_else(|| base_slug.clone());

            let ai_hints = match entry {
                Some(e) if !e.ai_hints.is_empty() => e.ai_hints.clone(),
                _ => extract_ai_hints(&file.content),
            };

            let (keywords, links, summary, line_range) = match entry {
                Some(e) => (
                    e.keywords.clone(),
                    e.links.clone(),
                    e.summary.clone().unwrap_or_default(),
                    e.line_range.clone(),
                ),
                None => (
                    extract_keywords(&title, &file.content),
                    extract_links(&file.content),
                    summarize(&file.content),
                    Vec::new(),
                ),
            };

            Section {
                id: make_section_id(doc_id, &slug),
                legacy_id: slug,
                title,
                content_hash: content_hash(&file.content),
                token_count: token_count(&file.content),
                content: file.content.clone(),
                keywords,
                links,
                ai_hints,
                summary,
                line_range,
                file_path: Some(file.path.clone()),
            }
        })
        .collect()
}

/// Split a single markdown document on headings of `heading_level`.
///
/// Fails with [`Error::Validation`] when the document yields no sections.
pub fn split_markdown(
    doc_id: &str,
    text: &str,
    heading_level: usize,
    file_path: Option<&str>,
) -> Result<Vec<Section>> {
    let lines: Vec<&str> = text.lines().collect();
    let body_start = frontmatter_end(&lines);

    // (1-based line number, title)
    let mut headings: Vec<(usize, String)> = Vec::new();
    let mut in_fence = false;
    for (idx, line) in lines.iter().enumerate().skip(body_start) {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(title) = heading_title(line, heading_level) {
            headings.push((idx + 1, title));
        }
    }

    let mut spans: Vec<(String, usize, usize)> = Vec::new();
    let preamble_end = headings.first().map(|(n, _)| n - 1).unwrap_or(lines.len());
    if lines[body_start..preamble_end]
        .iter()
        .any(|l| !l.trim().is_empty())
    {
        spans.push((OVERVIEW_TITLE.to_string(), body_start + 1, preamble_end));
    }
    for (i, (start, title)) in headings.iter().enumerate() {
        let end = headings
            .get(i + 1)
            .map(|(next, _)| next - 1)
            .unwrap_or(lines.len());
        spans.push((title.clone(), *start, end));
    }

    if spans.is_empty() {
        return Err(Error::validation(format!(
            "no level-{} sections found in document '{}'",
            heading_level, doc_id
        )));
    }

    let mut slugs = SlugAllocator::new();
    let sections = spans
        .into_iter()
        .map(|(title, start, end)| {
            let content = format!("{}\n", lines[start - 1..end].join("\n").trim_end());
            let slug = slugs.allocate(&slugify(&title));
            Section {
                id: make_section_id(doc_id, &slug),
                legacy_id: slug,
                content_hash: content_hash(&content),
                token_count: token_count(&content),
                keywords: extract_keywords(&title, &content),
                links: extract_links(&content),
                ai_hints: extract_ai_hints(&content),
                summary: summarize(&content),
                line_range: vec![start as u64, end as u64],
                file_path: file_path.map(str::to_string),
                title,
                content,
            }
        })
        .collect();

    Ok(sections)
}

fn heading_title(line: &str, level: usize) -> Option<String> {
    let rest = line.strip_prefix(&"#".repeat(level))?;
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }
    let title = rest.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Index of the first line after a leading `---` frontmatter block.
fn frontmatter_end(lines: &[&str]) -> usize {
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return 0;
    }
    lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| l.trim_end() == "---")
        .map(|(i, _)| i + 1)
        .unwrap_or(0)
}
