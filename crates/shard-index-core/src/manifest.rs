//! Build manifest and incremental change detection.
//!
//! The manifest records, per section id, the content hash and source file
//! seen at the last successful full rebuild, plus the hash of the auxiliary
//! metadata file. [`diff`] partitions a fresh scan against it into four
//! disjoint sets; [`ChangeSet::can_skip`] applies the skip-if-unchanged
//! policy.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Section;
use crate::shard::SCHEMA_VERSION;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub content_hash: String,
    /// Source file, relative to the document root.
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: i64,
    pub sections: BTreeMap<String, ManifestEntry>,
    /// Hash of the metadata index file, if one existed.
    #[serde(default)]
    pub index_hash: Option<String>,
    pub generated_at: String,
}

impl Manifest {
    pub fn from_sections(sections: &[Section], index_hash: Option<String>) -> Self {
        let sections = sections
            .iter()
            .map(|s| {
                (
                    s.id.clone(),
                    ManifestEntry {
                        content_hash: s.content_hash.clone(),
                        file: s.file_path.clone().unwrap_or_default(),
                    },
                )
            })
            .collect();
        Self {
            schema_version: SCHEMA_VERSION,
            sections,
            index_hash,
            generated_at: Utc::now().to_rfc3339(),
        }
    }

    /// Parse a manifest, rejecting other schema versions.
    pub fn parse(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::json("<manifest>", e))?;
        let found = value.get("schema_version").and_then(|v| v.as_i64());
        if found != Some(SCHEMA_VERSION) {
            return Err(Error::Schema {
                found: found.map_or_else(|| "none".to_string(), |v| v.to_string()),
                expected: SCHEMA_VERSION,
            });
        }
        serde_json::from_value(value).map_err(|e| Error::json("<manifest>", e))
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes =
            serde_json::to_vec_pretty(self).map_err(|e| Error::json("<manifest>", e))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Result of comparing a fresh scan against the previous manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
    pub index_changed: bool,
}

impl ChangeSet {
    pub fn has_section_changes(&self) -> bool {
        !(self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty())
    }

    /// Skip-if-unchanged policy: nothing added, changed, or removed, the
    /// metadata hash is stable, and no force flag.
    pub fn can_skip(&self, force: bool) -> bool {
        !force && !self.has_section_changes() && !self.index_changed
    }
}

/// Partition `current` against `previous`.
///
/// With no previous manifest every section is `added` and the index is
/// considered changed. A section whose source file moved counts as
/// `changed` even when its hash is stable, since order and `file_path` follow
/// the file. `added`/`changed`/`unchanged` follow scan order;
/// `removed` follows manifest (sorted id) order.
pub fn diff(
    previous: Option<&Manifest>,
    current: &[Section],
    index_hash: Option<&str>,
) -> ChangeSet {
    let mut changes = ChangeSet::default();

    let Some(previous) = previous else {
        changes.added = current.iter().map(|s| s.id.clone()).collect();
        changes.index_changed = true;
        return changes;
    };

    let mut seen: HashSet<&str> = HashSet::new();
    for section in current {
        seen.insert(section.id.as_str());
        match previous.sections.get(&section.id) {
            None => changes.added.push(section.id.clone()),
            Some(entry)
                if entry.content_hash != section.content_hash
                    || entry.file != section.file_path.as_deref().unwrap_or_default() =>
            {
                changes.changed.push(section.id.clone())
            }
            Some(_) => changes.unchanged.push(section.id.clone()),
        }
    }
    changes.removed = previous
        .sections
        .keys()
        .filter(|id| !seen.contains(id.as_str()))
        .cloned()
        .collect();
    changes.index_changed = previous.index_hash.as_deref() != index_hash;

    changes
}
