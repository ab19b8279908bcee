//! Per-version manifest document.
//!
//! The same types are read by the deploy path and written by packaging, so
//! they round-trip through `serde`. Optional sections are omitted on write
//! when empty.

use super::model::ChannelMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A version manifest: one firmware version and its artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionManifest {
    /// Version identifier; must equal the id the root manifest files it under.
    pub version: String,
    /// Authoring timestamp in RFC 3339 form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Version-tier channel overrides.
    #[serde(default, skip_serializing_if = "ChannelMap::is_empty")]
    pub channels: ChannelMap,
    /// Directory holding the artifact files, relative to this manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    /// Declared artifacts in deployment order.
    pub artifacts: Vec<ArtifactSpec>,
    /// Location the document was read from; empty for unsaved documents.
    #[serde(skip)]
    pub path: PathBuf,
}

impl VersionManifest {
    /// Return the directory that relative artifact paths resolve against.
    ///
    /// This is the manifest's own directory, joined with `base_path` when the
    /// document declares one.
    #[must_use]
    pub fn artifact_root(&self) -> PathBuf {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        match &self.base_path {
            Some(base) => dir.join(base),
            None => dir.to_path_buf(),
        }
    }
}

/// One artifact entry as declared in a version manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Artifact name, used in logs and default client identities.
    pub name: String,
    /// File name relative to the artifact root.
    pub filename: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Declared SHA-256 digest as lowercase hex.
    pub sha256: String,
    /// Protocols to deliver over; the root defaults apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<String>>,
    /// Artifact-tier channel overrides.
    #[serde(default, skip_serializing_if = "ChannelMap::is_empty")]
    pub channels: ChannelMap,
}
