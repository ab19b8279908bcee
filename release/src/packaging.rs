//! Release packaging: version manifest authoring and root index updates.
//!
//! Packaging copies a built binary into the release tree, writes a version
//! manifest describing it, and optionally files the version in the root
//! manifest:
//!
//! ```text
//! <output>/<version>/<artifact filename>
//! <output>/<version>/ota.json
//! ```
//!
//! The root manifest rewrite takes an exclusive lock on a sidecar
//! `<manifest>.lock` file, re-reads the manifest under the lock, and replaces
//! it through a temporary file renamed into place. Concurrent packaging runs
//! against one manifest therefore serialise instead of losing updates.
//!
//! In dry-run mode the binary is still hashed, but every write is logged
//! instead of performed.

use crate::manifest::{ArtifactSpec, ManifestError, VersionManifest, load_manifest};
use crate::packaging_error::PackagingError;
use chrono::{SecondsFormat, Utc};
use fs2::FileExt;
use log::{debug, info};
use otaship_common::compute_sha256;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of every version manifest.
pub const VERSION_MANIFEST_NAME: &str = "ota.json";

/// Inputs for [`package_build`].
#[derive(Debug, Clone, Default)]
pub struct PackageParams {
    /// Root manifest path.
    pub manifest: PathBuf,
    /// Built firmware binary.
    pub binary: PathBuf,
    /// Version identifier to package.
    pub version: String,
    /// Artifact name; defaults to the product name.
    pub project: Option<String>,
    /// Output directory; defaults to `versions/` beside the root manifest.
    pub output_dir: Option<PathBuf>,
    /// Artifact file name; defaults to `<project>-<version>.bin`.
    pub artifact_name: Option<String>,
    /// Label recorded in the root manifest's version entry.
    pub label: Option<String>,
    /// File the version in the root manifest.
    pub update_manifest: bool,
    /// Log writes instead of performing them.
    pub dry_run: bool,
}

/// Result of [`package_build`].
#[derive(Debug, Clone)]
pub struct PackageOutput {
    /// Path of the version manifest (written, or that would be written).
    pub version_manifest: PathBuf,
    /// Destination of the copied binary.
    pub artifact_path: PathBuf,
    /// The version manifest document.
    pub document: VersionManifest,
    /// Whether the root manifest was rewritten.
    pub manifest_updated: bool,
}

/// A version entry for the root manifest's `versions` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    /// Version identifier.
    pub id: String,
    /// Version manifest path relative to the root manifest, `/`-separated.
    pub manifest: String,
    /// Optional human-readable label.
    pub label: Option<String>,
}

/// Package a built binary as a release version.
///
/// # Errors
///
/// Returns [`PackagingError::Manifest`] when the root manifest or the version
/// id is invalid, [`PackagingError::BinaryNotFound`] for a missing binary,
/// [`PackagingError::OutsideManifestRoot`] when the root manifest cannot
/// reference the output, and I/O, lock, or serialisation errors otherwise.
pub fn package_build(params: &PackageParams) -> Result<PackageOutput, PackagingError> {
    check_version_id(&params.version)?;
    let manifest = load_manifest(&params.manifest)?;
    let project = params
        .project
        .clone()
        .unwrap_or_else(|| manifest.product_name().to_owned());

    let manifest_dir = absolute(manifest.base_dir())?;
    let output_dir = match &params.output_dir {
        Some(dir) => absolute(dir)?,
        None => manifest_dir.join("versions"),
    };
    let version_dir = output_dir.join(&params.version);
    let filename = params
        .artifact_name
        .clone()
        .unwrap_or_else(|| format!("{project}-{}.bin", params.version));
    check_file_name(&filename)?;
    let artifact_path = version_dir.join(&filename);
    let version_manifest = version_dir.join(VERSION_MANIFEST_NAME);

    if !params.binary.is_file() {
        return Err(PackagingError::BinaryNotFound {
            path: params.binary.clone(),
        });
    }
    let sha256 = compute_sha256(&params.binary).map_err(PackagingError::io(&params.binary))?;
    let size = fs::metadata(&params.binary)
        .map_err(PackagingError::io(&params.binary))?
        .len();
    debug!("{} is {size} bytes, sha256 {sha256}", params.binary.display());

    let channels = manifest.deployment().channel_configs();
    let document = VersionManifest {
        version: params.version.clone(),
        created_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        channels: channels.clone(),
        base_path: None,
        artifacts: vec![ArtifactSpec {
            name: project,
            filename,
            size,
            sha256: sha256.into_inner(),
            protocols: Some(manifest.deployment().default_protocols().to_vec()),
            channels,
        }],
        path: version_manifest.clone(),
    };

    copy_binary(&params.binary, &artifact_path, params.dry_run)?;
    write_json(&version_manifest, &document, params.dry_run)?;

    let manifest_updated = if params.update_manifest {
        let relative = version_manifest
            .strip_prefix(&manifest_dir)
            .map_err(|_| PackagingError::OutsideManifestRoot {
                path: version_manifest.clone(),
                root: manifest_dir.clone(),
            })?;
        let entry = VersionEntry {
            id: params.version.clone(),
            manifest: posix(relative),
            label: params.label.clone(),
        };
        update_root_manifest(manifest.path(), &entry, params.dry_run)?
    } else {
        false
    };

    Ok(PackageOutput {
        version_manifest,
        artifact_path,
        document,
        manifest_updated,
    })
}

/// File `entry` in the root manifest at `manifest_path`.
///
/// An entry with the same id is updated in place; otherwise the entry is
/// appended. Every other field of the manifest is preserved. Returns whether
/// the manifest was rewritten, which is never the case in dry-run mode.
///
/// # Errors
///
/// Returns [`PackagingError::Lock`] when the lock cannot be taken,
/// [`PackagingError::Manifest`] when the manifest is unreadable as JSON or
/// has no `versions` list, and I/O errors from the rewrite.
pub fn update_root_manifest(
    manifest_path: &Path,
    entry: &VersionEntry,
    dry_run: bool,
) -> Result<bool, PackagingError> {
    if dry_run {
        info!(
            "[dry-run] Would update manifest {} with version {} -> {}",
            manifest_path.display(),
            entry.id,
            entry.manifest
        );
        return Ok(false);
    }

    let lock_path = lock_path(manifest_path);
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|source| PackagingError::Lock {
            path: lock_path.clone(),
            source,
        })?;
    lock.lock_exclusive().map_err(|source| PackagingError::Lock {
        path: lock_path.clone(),
        source,
    })?;
    debug!("locked {}", lock_path.display());

    let text = fs::read_to_string(manifest_path).map_err(|source| ManifestError::Read {
        path: manifest_path.to_path_buf(),
        source,
    })?;
    let mut document: Value = serde_json::from_str(&text).map_err(|err| ManifestError::Parse {
        path: manifest_path.to_path_buf(),
        reason: err.to_string(),
    })?;
    apply_entry(&mut document, entry)?;
    replace_file(manifest_path, &to_pretty_json(&document)?)?;

    FileExt::unlock(&lock).map_err(|source| PackagingError::Lock {
        path: lock_path,
        source,
    })?;
    info!(
        "updated {} with version {} -> {}",
        manifest_path.display(),
        entry.id,
        entry.manifest
    );
    Ok(true)
}

fn apply_entry(document: &mut Value, entry: &VersionEntry) -> Result<(), ManifestError> {
    let versions = document
        .get_mut("versions")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ManifestError::invalid("'versions' must be a list"))?;

    let existing = versions
        .iter_mut()
        .filter_map(Value::as_object_mut)
        .find(|record| record.get("id").and_then(Value::as_str) == Some(entry.id.as_str()));
    match existing {
        Some(record) => {
            record.insert("manifest".to_owned(), Value::from(entry.manifest.clone()));
            if let Some(label) = &entry.label {
                record.insert("label".to_owned(), Value::from(label.clone()));
            }
        }
        None => {
            let mut record = Map::new();
            record.insert("id".to_owned(), Value::from(entry.id.clone()));
            record.insert("manifest".to_owned(), Value::from(entry.manifest.clone()));
            if let Some(label) = &entry.label {
                record.insert("label".to_owned(), Value::from(label.clone()));
            }
            versions.push(Value::Object(record));
        }
    }
    Ok(())
}

fn copy_binary(source: &Path, destination: &Path, dry_run: bool) -> Result<(), PackagingError> {
    if dry_run {
        info!(
            "[dry-run] Would copy {} -> {}",
            source.display(),
            destination.display()
        );
        return Ok(());
    }
    if absolute(source)? == destination {
        debug!("{} already in place", destination.display());
        return Ok(());
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(PackagingError::io(parent))?;
    }
    fs::copy(source, destination).map_err(PackagingError::io(destination))?;
    info!("copied {} -> {}", source.display(), destination.display());
    Ok(())
}

fn write_json(path: &Path, document: &impl Serialize, dry_run: bool) -> Result<(), PackagingError> {
    let text = to_pretty_json(document)?;
    if dry_run {
        info!("[dry-run] Would write JSON to {}", path.display());
        debug!("{text}");
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(PackagingError::io(parent))?;
    }
    fs::write(path, text).map_err(PackagingError::io(path))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Pretty-print with two-space indentation, sorted keys, and a trailing
/// newline.
fn to_pretty_json(document: &impl Serialize) -> Result<String, PackagingError> {
    let value = serde_json::to_value(document)?;
    let mut text = serde_json::to_string_pretty(&value)?;
    text.push('\n');
    Ok(text)
}

fn replace_file(path: &Path, contents: &str) -> Result<(), PackagingError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir).map_err(PackagingError::io(dir))?;
    file.write_all(contents.as_bytes())
        .map_err(PackagingError::io(file.path()))?;
    file.as_file()
        .sync_all()
        .map_err(PackagingError::io(file.path()))?;
    file.persist(path)
        .map_err(|err| PackagingError::io(path)(err.error))?;
    Ok(())
}

fn lock_path(manifest_path: &Path) -> PathBuf {
    let mut name = manifest_path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".lock");
    manifest_path.with_file_name(name)
}

fn check_version_id(version: &str) -> Result<(), ManifestError> {
    if version.trim().is_empty() {
        return Err(ManifestError::invalid("version id must not be empty"));
    }
    if version.contains(['/', '\\']) || version == "." || version == ".." {
        return Err(ManifestError::invalid(format!(
            "version id '{version}' must not contain path separators"
        )));
    }
    Ok(())
}

fn check_file_name(name: &str) -> Result<(), ManifestError> {
    if Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name) {
        Ok(())
    } else {
        Err(ManifestError::invalid(format!(
            "artifact file name '{name}' must be a plain file name"
        )))
    }
}

/// Absolute form of `path` with `.` and `..` components folded lexically.
fn absolute(path: &Path) -> Result<PathBuf, PackagingError> {
    let path = std::path::absolute(path).map_err(PackagingError::io(path))?;
    let mut normalised = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalised.pop();
            }
            other => normalised.push(other),
        }
    }
    Ok(normalised)
}

fn posix(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[path = "packaging_tests.rs"]
mod tests;
