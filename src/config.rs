//! Configuration parsing and validation.
//!
//! Configuration is a TOML file (default `config/shards.toml`). Every table
//! and field has a default, so a missing file or an empty one yields a
//! working setup rooted at the current directory.
//!
//! ```toml
//! [corpus]
//! root = "docs/map"
//!
//! [db]
//! path = "docs/map/shards.db"
//!
//! [segmenter]
//! sections_dir = "sections"
//! section_glob = "*.md"
//! markdown_source = "source.md"
//! heading_level = 2
//!
//! [bm25]
//! k1 = 1.5
//! b = 0.75
//!
//! [fts]
//! title_weight = 1.0
//! content_weight = 1.0
//! keywords_weight = 1.0
//!
//! [retrieval]
//! default_limit = 5
//! ```

use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use shard_index_core::index::{Bm25Params, DEFAULT_B, DEFAULT_K1};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub bm25: Bm25Config,
    #[serde(default)]
    pub fts: FtsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Directory whose immediate subdirectories are documents.
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
        }
    }
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DbConfig {
    /// Defaults to `<corpus.root>/shards.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmenterConfig {
    #[serde(default = "default_sections_dir")]
    pub sections_dir: String,
    #[serde(default = "default_section_glob")]
    pub section_glob: String,
    #[serde(default = "default_index_file")]
    pub index_file: String,
    #[serde(default = "default_markdown_source")]
    pub markdown_source: String,
    #[serde(default = "default_heading_level")]
    pub heading_level: usize,
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sections_dir: default_sections_dir(),
            section_glob: default_section_glob(),
            index_file: default_index_file(),
            markdown_source: default_markdown_source(),
            heading_level: default_heading_level(),
            artifact_name: default_artifact_name(),
            manifest_name: default_manifest_name(),
        }
    }
}

fn default_sections_dir() -> String {
    "sections".to_string()
}
fn default_section_glob() -> String {
    "*.md".to_string()
}
fn default_index_file() -> String {
    "index.json".to_string()
}
fn default_markdown_source() -> String {
    "source.md".to_string()
}
fn default_heading_level() -> usize {
    2
}
fn default_artifact_name() -> String {
    "shards.json".to_string()
}
fn default_manifest_name() -> String {
    ".manifest.json".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Bm25Config {
    #[serde(default = "default_k1")]
    pub k1: f64,
    #[serde(default = "default_b")]
    pub b: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
        }
    }
}

impl Bm25Config {
    pub fn params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.k1,
            b: self.b,
        }
    }
}

fn default_k1() -> f64 {
    DEFAULT_K1
}
fn default_b() -> f64 {
    DEFAULT_B
}

/// Column weights passed to FTS5 `bm25()`. FTS5 fixes its own k1/b.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct FtsConfig {
    #[serde(default = "default_weight")]
    pub title_weight: f64,
    #[serde(default = "default_weight")]
    pub content_weight: f64,
    #[serde(default = "default_weight")]
    pub keywords_weight: f64,
}

impl Default for FtsConfig {
    fn default() -> Self {
        Self {
            title_weight: default_weight(),
            content_weight: default_weight(),
            keywords_weight: default_weight(),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    5
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.db
            .path
            .clone()
            .unwrap_or_else(|| self.corpus.root.join("shards.db"))
    }
}

/// Load and validate the config at `path`; a missing file means defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if !config.bm25.k1.is_finite() || config.bm25.k1 <= 0.0 {
        bail!("bm25.k1 must be a finite number > 0");
    }
    if !(0.0..=1.0).contains(&config.bm25.b) {
        bail!("bm25.b must be in [0.0, 1.0]");
    }

    if !(1..=6).contains(&config.segmenter.heading_level) {
        bail!("segmenter.heading_level must be between 1 and 6");
    }
    Glob::new(&config.segmenter.section_glob).with_context(|| {
        format!(
            "segmenter.section_glob is not a valid glob: '{}'",
            config.segmenter.section_glob
        )
    })?;

    if config.retrieval.default_limit < 1 {
        bail!("retrieval.default_limit must be >= 1");
    }

    let fts = &config.fts;
    for (name, weight) in [
        ("title_weight", fts.title_weight),
        ("content_weight", fts.content_weight),
        ("keywords_weight", fts.keywords_weight),
    ] {
        if !weight.is_finite() || weight < 0.0 {
            bail!("fts.{} must be a finite number >= 0", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.segmenter.heading_level, 2);
        assert_eq!(config.segmenter.sections_dir, "sections");
        assert_eq!(config.bm25.k1, 1.5);
        assert_eq!(config.bm25.b, 0.75);
        assert_eq!(config.retrieval.default_limit, 5);
        assert_eq!(config.db_path(), PathBuf::from("./shards.db"));
    }

    #[test]
    fn test_db_path_follows_corpus_root() {
        let config = parse("[corpus]\nroot = \"/data/map\"\n").unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/data/map/shards.db"));

        let config = parse("[db]\npath = \"/tmp/x.db\"\n").unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_rejects_bad_bm25() {
        assert!(parse("[bm25]\nk1 = 0.0\n").is_err());
        assert!(parse("[bm25]\nb = 1.5\n").is_err());
    }

    #[test]
    fn test_rejects_non_finite_numbers() {
        assert!(parse("[bm25]\nk1 = nan\n").is_err());
        assert!(parse("[bm25]\nk1 = inf\n").is_err());
        assert!(parse("[bm25]\nb = nan\n").is_err());
        assert!(parse("[fts]\ncontent_weight = inf\n").is_err());
        assert!(parse("[fts]\nkeywords_weight = nan\n").is_err());
        assert!(parse("[fts]\ntitle_weight = 0.0\n").is_ok());
    }

    #[test]
    fn test_rejects_bad_heading_level() {
        assert!(parse("[segmenter]\nheading_level = 0\n").is_err());
        assert!(parse("[segmenter]\nheading_level = 7\n").is_err());
        assert!(parse("[segmenter]\nheading_level = 3\n").is_ok());
    }

    #[test]
    fn test_rejects_bad_glob_and_limit() {
        assert!(parse("[segmenter]\nsection_glob = \"[\"\n").is_err());
        assert!(parse("[retrieval]\ndefault_limit = 0\n").is_err());
        assert!(parse("[fts]\ntitle_weight = -1.0\n").is_err());
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let config = load_config(Path::new("/nonexistent/shards.toml")).unwrap();
        assert_eq!(config.segmenter.markdown_source, "source.md");
    }
}
