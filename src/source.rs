//! Filesystem section sources.
//!
//! Resolves a document root to its sections. Sources are tried in order:
//!
//! 1. the section directory (`sections/*.md`) plus optional `index.json`,
//! 2. a single markdown document split on headings,
//! 3. a previously built shard artifact (ingestion only).
//!
//! A root with none of these fails with [`Error::NotFound`] naming the
//! missing section directory.

use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use shard_index_core::error::{Error, Result};
use shard_index_core::models::Section;
use shard_index_core::segment::{sections_from_files, split_markdown, MetadataIndex, SectionFile};
use shard_index_core::shard::sections_from_artifact;
use shard_index_core::tokenize::bytes_hash;

use crate::config::SegmenterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    SectionDir,
    Markdown,
    Artifact,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::SectionDir => write!(f, "section directory"),
            SourceKind::Markdown => write!(f, "markdown"),
            SourceKind::Artifact => write!(f, "shard artifact"),
        }
    }
}

/// Sections of one document, plus what the incremental build needs to know
/// about where they came from.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub doc_id: String,
    pub kind: SourceKind,
    pub sections: Vec<Section>,
    /// SHA-256 of the metadata index file, when one was read.
    pub index_hash: Option<String>,
}

/// The document id is the file name of the (absolute) document root.
pub fn doc_id_for(root: &Path) -> Result<String> {
    let absolute = root.canonicalize().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound {
            what: "document root",
            path: root.to_path_buf(),
        },
        _ => Error::io(root, e),
    })?;
    absolute
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::validation(format!("cannot derive a document id from {}", root.display())))
}

/// Load the sections of the document rooted at `root`.
///
/// `allow_artifact` enables the shard-artifact fallback; the build command
/// disables it so an artifact is never rebuilt from itself.
pub fn load_document(
    root: &Path,
    cfg: &SegmenterConfig,
    allow_artifact: bool,
) -> Result<DocumentSource> {
    let doc_id = doc_id_for(root)?;
    let sections_dir = root.join(&cfg.sections_dir);
    let markdown = root.join(&cfg.markdown_source);
    let artifact = root.join(&cfg.artifact_name);

    let (kind, sections, index_hash) = if sections_dir.is_dir() {
        let (sections, index_hash) = load_section_dir(&doc_id, root, cfg)?;
        (SourceKind::SectionDir, sections, index_hash)
    } else if markdown.is_file() {
        let text = read_text(&markdown)?;
        let sections = split_markdown(
            &doc_id,
            &text,
            cfg.heading_level,
            Some(cfg.markdown_source.as_str()),
        )?;
        (SourceKind::Markdown, sections, None)
    } else if allow_artifact && artifact.is_file() {
        let text = read_text(&artifact)?;
        let sections =
            sections_from_artifact(&doc_id, &text).map_err(|e| Error::json(&artifact, e))?;
        (SourceKind::Artifact, sections, None)
    } else {
        return Err(Error::NotFound {
            what: "sections directory",
            path: sections_dir,
        });
    };

    tracing::debug!(
        doc_id = %doc_id,
        source = %kind,
        sections = sections.len(),
        "loaded document"
    );

    Ok(DocumentSource {
        doc_id,
        kind,
        sections,
        index_hash,
    })
}

fn load_section_dir(
    doc_id: &str,
    root: &Path,
    cfg: &SegmenterConfig,
) -> Result<(Vec<Section>, Option<String>)> {
    let dir = root.join(&cfg.sections_dir);
    let matcher = section_matcher(&cfg.section_glob)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| Error::io(&dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !matcher.is_match(&file_name) {
            continue;
        }
        tracing::debug!(file = %file_name, "reading section file");
        files.push(SectionFile {
            content: read_text(entry.path())?,
            path: format!("{}/{}", cfg.sections_dir, file_name),
            file_name,
        });
    }

    let index_path = root.join(&cfg.index_file);
    let (index, index_hash) = if index_path.is_file() {
        let bytes = std::fs::read(&index_path).map_err(|e| Error::io(&index_path, e))?;
        let index: MetadataIndex =
            serde_json::from_slice(&bytes).map_err(|e| Error::json(&index_path, e))?;
        (Some(index), Some(bytes_hash(&bytes)))
    } else {
        (None, None)
    };

    Ok((sections_from_files(doc_id, &files, index.as_ref()), index_hash))
}

fn section_matcher(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| Error::validation(format!("invalid section glob '{}': {}", pattern, e)))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Immediate subdirectories of `corpus_root` that hold any section source,
/// sorted by name.
pub fn discover_documents(corpus_root: &Path, cfg: &SegmenterConfig) -> Result<Vec<PathBuf>> {
    if !corpus_root.is_dir() {
        return Err(Error::NotFound {
            what: "corpus root",
            path: corpus_root.to_path_buf(),
        });
    }

    let mut docs = Vec::new();
    let walker = WalkDir::new(corpus_root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| Error::io(corpus_root, e.into()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        if path.join(&cfg.sections_dir).is_dir()
            || path.join(&cfg.markdown_source).is_file()
            || path.join(&cfg.artifact_name).is_file()
        {
            docs.push(path.to_path_buf());
        }
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn cfg() -> SegmenterConfig {
        SegmenterConfig::default()
    }

    #[test]
    fn test_section_dir_with_index() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("guide");
        fs::create_dir_all(root.join("sections")).unwrap();
        fs::write(root.join("sections/02-details.md"), "# Details\nconfiguration\n").unwrap();
        fs::write(root.join("sections/01-intro.md"), "# Introduction\nparsing\n").unwrap();
        fs::write(root.join("sections/notes.txt"), "ignored").unwrap();
        fs::write(
            root.join("index.json"),
            r#"{"entries": [{"slug": "intro", "keywords": ["parsing"], "summary": "Intro."}]}"#,
        )
        .unwrap();

        let doc = load_document(&root, &cfg(), true).unwrap();
        assert_eq!(doc.doc_id, "guide");
        assert_eq!(doc.kind, SourceKind::SectionDir);
        let ids: Vec<&str> = doc.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["guide:intro", "guide:details"]);
        assert_eq!(doc.sections[0].keywords, vec!["parsing"]);
        assert_eq!(doc.sections[0].file_path.as_deref(), Some("sections/01-intro.md"));
        assert!(doc.index_hash.is_some());
    }

    #[test]
    fn test_empty_section_dir_yields_no_sections() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("empty");
        fs::create_dir_all(root.join("sections")).unwrap();
        let doc = load_document(&root, &cfg(), true).unwrap();
        assert!(doc.sections.is_empty());
    }

    #[test]
    fn test_missing_sources_not_found() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("bare");
        fs::create_dir_all(&root).unwrap();
        let err = load_document(&root, &cfg(), true).unwrap_err();
        assert!(matches!(err, Error::NotFound { what: "sections directory", .. }));
    }

    #[test]
    fn test_markdown_source() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("skill");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join("source.md"),
            "Lead text.\n\n## Overview\nA\n\n## Overview\nB\n",
        )
        .unwrap();
        let doc = load_document(&root, &cfg(), true).unwrap();
        assert_eq!(doc.kind, SourceKind::Markdown);
        let slugs: Vec<&str> = doc.sections.iter().map(|s| s.legacy_id.as_str()).collect();
        assert_eq!(slugs, vec!["overview", "overview-2", "overview-3"]);
    }

    #[test]
    fn test_artifact_fallback_only_when_allowed() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("legacy");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join("shards.json"),
            r#"{"sections": [{"id": "legacy:a", "title": "A", "content": "x"}]}"#,
        )
        .unwrap();
        let doc = load_document(&root, &cfg(), true).unwrap();
        assert_eq!(doc.kind, SourceKind::Artifact);
        assert_eq!(doc.sections[0].id, "legacy:a");
        assert!(matches!(
            load_document(&root, &cfg(), false),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_discover_documents_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("b/sections")).unwrap();
        fs::create_dir_all(tmp.path().join("a/sections")).unwrap();
        fs::create_dir_all(tmp.path().join("c")).unwrap();
        fs::write(tmp.path().join("d.md"), "x").unwrap();
        let docs = discover_documents(tmp.path(), &cfg()).unwrap();
        let names: Vec<String> = docs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
