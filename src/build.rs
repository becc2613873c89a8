//! Incremental shard artifact build (`shards build`).
//!
//! 1. Load the document's sections (section directory or markdown source).
//! 2. Diff them against `<doc_root>/.manifest.json`.
//! 3. With `--changed`, stop if nothing was added, changed, or removed, the
//!    metadata index hash is stable, and the artifact still exists.
//! 4. Otherwise regenerate the whole artifact, then the manifest, each with
//!    an atomic replace.
//!
//! `--dry-run` stops after step 3 and reports the would-be artifact size.

use std::path::{Path, PathBuf};

use shard_index_core::error::{Error, Result};
use shard_index_core::manifest::{diff, ChangeSet, Manifest};
use shard_index_core::shard::Shard;

use crate::config::Config;
use crate::fsutil::write_atomic;
use crate::source::load_document;

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub doc_root: PathBuf,
    pub output: Option<PathBuf>,
    pub changed_only: bool,
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub doc_id: String,
    pub artifact_path: PathBuf,
    pub changes: ChangeSet,
    /// Nothing to do under `--changed`.
    pub skipped: bool,
    /// Artifact and manifest were replaced.
    pub written: bool,
    /// Serialized artifact size; zero when skipped.
    pub artifact_bytes: usize,
    /// Artifact hash ignoring `generated_at`; `None` when skipped.
    pub fingerprint: Option<String>,
}

/// Run one build without printing.
pub fn build_document(config: &Config, opts: &BuildOptions) -> Result<BuildOutcome> {
    let seg = &config.segmenter;
    let source = load_document(&opts.doc_root, seg, false)?;
    let artifact_path = opts
        .output
        .clone()
        .unwrap_or_else(|| opts.doc_root.join(&seg.artifact_name));
    let manifest_path = opts.doc_root.join(&seg.manifest_name);

    let previous = read_manifest(&manifest_path)?;
    let changes = diff(
        previous.as_ref(),
        &source.sections,
        source.index_hash.as_deref(),
    );

    tracing::info!(
        doc_id = %source.doc_id,
        added = changes.added.len(),
        changed = changes.changed.len(),
        removed = changes.removed.len(),
        unchanged = changes.unchanged.len(),
        index_changed = changes.index_changed,
        "computed change set"
    );

    if opts.changed_only && changes.can_skip(opts.force) && artifact_path.is_file() {
        return Ok(BuildOutcome {
            doc_id: source.doc_id,
            artifact_path,
            changes,
            skipped: true,
            written: false,
            artifact_bytes: 0,
            fingerprint: None,
        });
    }

    let manifest = Manifest::from_sections(&source.sections, source.index_hash.clone());
    let shard = Shard::build(&source.doc_id, source.sections, config.bm25.params());
    let bytes = shard.to_json_bytes()?;
    let fingerprint = shard.fingerprint()?;
    tracing::info!(doc_id = %source.doc_id, fingerprint = %fingerprint, "artifact built");

    if !opts.dry_run {
        write_atomic(&artifact_path, &bytes)?;
        write_atomic(&manifest_path, &manifest.to_json_bytes()?)?;
        tracing::debug!(path = %artifact_path.display(), bytes = bytes.len(), "artifact written");
    }

    Ok(BuildOutcome {
        doc_id: source.doc_id,
        artifact_path,
        changes,
        skipped: false,
        written: !opts.dry_run,
        artifact_bytes: bytes.len(),
        fingerprint: Some(fingerprint),
    })
}

/// Previous manifest, or `None` when absent, unreadable as JSON, or from
/// another schema version. The latter two force a full rebuild.
fn read_manifest(path: &Path) -> Result<Option<Manifest>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    match Manifest::parse(&text) {
        Ok(manifest) => Ok(Some(manifest)),
        Err(e @ Error::Schema { .. }) => {
            tracing::warn!(path = %path.display(), "{}; forcing full rebuild", e);
            Ok(None)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring unreadable manifest: {}", e);
            Ok(None)
        }
    }
}

/// `shards build`: run a build and print its outcome.
pub fn run_build(config: &Config, opts: &BuildOptions, report: bool) -> anyhow::Result<()> {
    let outcome = build_document(config, opts)?;
    let changes = &outcome.changes;

    if report || opts.dry_run {
        print_change_report(changes);
    }

    if outcome.skipped {
        println!(
            "No changes for {}; {} left untouched.",
            outcome.doc_id,
            outcome.artifact_path.display()
        );
        return Ok(());
    }

    if opts.dry_run {
        println!(
            "build {} (dry-run)\n  added: {}\n  changed: {}\n  removed: {}\n  unchanged: {}\n  index changed: {}\n  would write {} bytes to {}",
            outcome.doc_id,
            changes.added.len(),
            changes.changed.len(),
            changes.removed.len(),
            changes.unchanged.len(),
            changes.index_changed,
            outcome.artifact_bytes,
            outcome.artifact_path.display()
        );
        return Ok(());
    }

    println!("Wrote shards JSON: {}", outcome.artifact_path.display());
    Ok(())
}

fn print_change_report(changes: &ChangeSet) {
    for (label, ids) in [
        ("added", &changes.added),
        ("changed", &changes.changed),
        ("removed", &changes.removed),
    ] {
        println!("{} ({}):", label, ids.len());
        for id in ids {
            println!("  {}", id);
        }
    }
    println!("unchanged: {}", changes.unchanged.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn doc(tmp: &TempDir) -> PathBuf {
        let root = tmp.path().join("guide");
        fs::create_dir_all(root.join("sections")).unwrap();
        fs::write(root.join("sections/01-intro.md"), "# Introduction\nparsing\n").unwrap();
        fs::write(root.join("sections/02-details.md"), "# Details\nconfiguration\n").unwrap();
        root
    }

    fn opts(root: &Path) -> BuildOptions {
        BuildOptions {
            doc_root: root.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_build_writes_artifact_and_manifest() {
        let tmp = TempDir::new().unwrap();
        let root = doc(&tmp);
        let outcome = build_document(&Config::default(), &opts(&root)).unwrap();
        assert!(outcome.written);
        assert_eq!(outcome.changes.added.len(), 2);
        assert!(root.join("shards.json").is_file());
        assert!(root.join(".manifest.json").is_file());
    }

    #[test]
    fn test_changed_with_no_edits_skips_without_rewrite() {
        let tmp = TempDir::new().unwrap();
        let root = doc(&tmp);
        build_document(&Config::default(), &opts(&root)).unwrap();
        let before = fs::read(root.join("shards.json")).unwrap();

        let changed = BuildOptions {
            changed_only: true,
            ..opts(&root)
        };
        let outcome = build_document(&Config::default(), &changed).unwrap();
        assert!(outcome.skipped);
        assert!(!outcome.changes.has_section_changes());
        assert_eq!(fs::read(root.join("shards.json")).unwrap(), before);

        let forced = BuildOptions {
            force: true,
            ..changed
        };
        assert!(build_document(&Config::default(), &forced).unwrap().written);
    }

    #[test]
    fn test_edit_is_detected_as_changed() {
        let tmp = TempDir::new().unwrap();
        let root = doc(&tmp);
        build_document(&Config::default(), &opts(&root)).unwrap();
        fs::write(root.join("sections/02-details.md"), "# Details\nconfiguration!\n").unwrap();
        fs::remove_file(root.join("sections/01-intro.md")).unwrap();

        let outcome = build_document(
            &Config::default(),
            &BuildOptions {
                changed_only: true,
                ..opts(&root)
            },
        )
        .unwrap();
        assert!(outcome.written);
        assert_eq!(outcome.changes.changed, vec!["guide:details"]);
        assert_eq!(outcome.changes.removed, vec!["guide:intro"]);
    }

    #[test]
    fn test_renamed_section_file_triggers_rebuild() {
        let tmp = TempDir::new().unwrap();
        let root = doc(&tmp);
        build_document(&Config::default(), &opts(&root)).unwrap();
        fs::rename(
            root.join("sections/01-intro.md"),
            root.join("sections/03-intro.md"),
        )
        .unwrap();

        let outcome = build_document(
            &Config::default(),
            &BuildOptions {
                changed_only: true,
                ..opts(&root)
            },
        )
        .unwrap();
        assert!(!outcome.skipped);
        assert!(outcome.written);
        assert_eq!(outcome.changes.changed, vec!["guide:intro"]);

        let artifact = fs::read_to_string(root.join("shards.json")).unwrap();
        assert!(artifact.contains("sections/03-intro.md"));
        assert!(!artifact.contains("sections/01-intro.md"));
    }

    #[test]
    fn test_rebuild_fingerprint_is_stable() {
        let tmp = TempDir::new().unwrap();
        let root = doc(&tmp);
        let first = build_document(&Config::default(), &opts(&root)).unwrap();
        let second = build_document(&Config::default(), &opts(&root)).unwrap();
        assert!(first.fingerprint.is_some());
        assert_eq!(first.fingerprint, second.fingerprint);

        let skipped = build_document(
            &Config::default(),
            &BuildOptions {
                changed_only: true,
                ..opts(&root)
            },
        )
        .unwrap();
        assert!(skipped.skipped);
        assert!(skipped.fingerprint.is_none());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let root = doc(&tmp);
        let outcome = build_document(
            &Config::default(),
            &BuildOptions {
                dry_run: true,
                ..opts(&root)
            },
        )
        .unwrap();
        assert!(!outcome.written);
        assert!(outcome.artifact_bytes > 0);
        assert!(!root.join("shards.json").exists());
        assert!(!root.join(".manifest.json").exists());
    }

    #[test]
    fn test_old_manifest_schema_forces_rebuild() {
        let tmp = TempDir::new().unwrap();
        let root = doc(&tmp);
        build_document(&Config::default(), &opts(&root)).unwrap();
        fs::write(
            root.join(".manifest.json"),
            r#"{"schema_version": 1, "sections": {}, "generated_at": ""}"#,
        )
        .unwrap();
        let outcome = build_document(
            &Config::default(),
            &BuildOptions {
                changed_only: true,
                ..opts(&root)
            },
        )
        .unwrap();
        assert!(outcome.written);
        assert_eq!(outcome.changes.added.len(), 2);
    }

    #[test]
    fn test_output_override() {
        let tmp = TempDir::new().unwrap();
        let root = doc(&tmp);
        let out = tmp.path().join("out/guide.json");
        build_document(
            &Config::default(),
            &BuildOptions {
                output: Some(out.clone()),
                ..opts(&root)
            },
        )
        .unwrap();
        assert!(out.is_file());
        assert!(!root.join("shards.json").exists());
    }
}
