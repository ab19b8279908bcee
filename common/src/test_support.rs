//! On-disk release tree builder for tests.
//!
//! [`ReleaseTree`] owns a temporary directory and writes a root manifest,
//! version manifests, and firmware binaries into it so tests exercise the
//! same filesystem layout the release tools see in production:
//!
//! ```text
//! <root>/manifest.json
//! <root>/versions/<id>/ota.json
//! <root>/versions/<id>/<artifact file>
//! ```

use crate::digest::sha256_hex;
use serde_json::{Value, json};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary release tree rooted at a single directory.
#[derive(Debug)]
pub struct ReleaseTree {
    dir: TempDir,
}

impl ReleaseTree {
    /// Create an empty tree in a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Return the root directory of the tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Return the path of the root manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("manifest.json")
    }

    /// Return the directory holding the files for `version`.
    #[must_use]
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.root().join("versions").join(version)
    }

    /// Write `document` as the root manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or the write fails.
    pub fn write_root(&self, document: &Value) -> io::Result<PathBuf> {
        let path = self.manifest_path();
        write_json(&path, document)?;
        Ok(path)
    }

    /// Write `document` as the version manifest for `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the write fails.
    pub fn write_version(&self, version: &str, document: &Value) -> io::Result<PathBuf> {
        let dir = self.version_dir(version);
        fs::create_dir_all(&dir)?;
        let path = dir.join("ota.json");
        write_json(&path, document)?;
        Ok(path)
    }

    /// Write an artifact file for `version` and return its declared entry.
    ///
    /// The returned JSON object carries `name`, `filename`, `size`, and
    /// `sha256` computed from `contents`, ready to be placed in an
    /// `artifacts` list.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the write fails.
    pub fn write_artifact(
        &self,
        version: &str,
        name: &str,
        filename: &str,
        contents: &[u8],
    ) -> io::Result<Value> {
        let dir = self.version_dir(version);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(filename), contents)?;
        Ok(artifact_entry(name, filename, contents))
    }

    /// Lay out a complete single-version tree.
    ///
    /// The root manifest declares `version` with `channels` as its deployment
    /// defaults; the version manifest declares the given artifact entries.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be written.
    pub fn write_release(
        &self,
        version: &str,
        channels: &Value,
        artifacts: Vec<Value>,
    ) -> io::Result<PathBuf> {
        self.write_version(
            version,
            &json!({
                "version": version,
                "created_at": "2026-01-01T00:00:00Z",
                "artifacts": artifacts,
            }),
        )?;
        self.write_root(&json!({
            "schema_version": 1,
            "product": { "name": "Gateway Firmware" },
            "deployment": {
                "channels": channels,
                "default_protocols": ["mqtt", "https"],
            },
            "versions": [
                { "id": version, "manifest": format!("versions/{version}/ota.json") }
            ],
        }))
    }
}

/// Build a declared artifact entry whose size and digest match `contents`.
#[must_use]
pub fn artifact_entry(name: &str, filename: &str, contents: &[u8]) -> Value {
    json!({
        "name": name,
        "filename": filename,
        "size": contents.len(),
        "sha256": sha256_hex(contents).into_inner(),
    })
}

fn write_json(path: &Path, document: &Value) -> io::Result<()> {
    let text = serde_json::to_string_pretty(document).map_err(io::Error::other)?;
    fs::write(path, text)
}
