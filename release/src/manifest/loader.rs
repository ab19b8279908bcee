//! Two-phase manifest loading.
//!
//! The root manifest is read and validated eagerly by [`load_manifest`];
//! version manifests are only read when a caller asks for one through
//! [`load_version_manifest`]. Both phases go through a [`ManifestStore`] so
//! tests can supply documents without touching the filesystem.

use super::error::{ManifestError, Result};
use super::model::{Manifest, ManifestVersion};
use super::validation::{validate_manifest_with, validate_version_manifest};
use super::version::VersionManifest;
use serde_json::Value;
use std::io;
use std::path::Path;

/// Read access to manifest documents.
#[cfg_attr(test, mockall::automock)]
pub trait ManifestStore {
    /// Read the whole file at `path` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be read.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Report whether a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;
}

/// [`ManifestStore`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl ManifestStore for FsStore {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Load and validate the root manifest at `path` from the filesystem.
///
/// # Errors
///
/// Returns [`ManifestError`] when the file cannot be read or parsed, or when
/// any structural constraint fails, including a version entry whose
/// manifest file does not exist.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    load_manifest_with(path, &FsStore)
}

/// Load and validate the root manifest at `path` through `store`.
///
/// Version manifest references are checked against the directory holding
/// the root manifest.
///
/// # Errors
///
/// See [`load_manifest`].
pub fn load_manifest_with(path: &Path, store: &dyn ManifestStore) -> Result<Manifest> {
    let document = read_document(path, store)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    validate_manifest_with(document, path, Some(base_dir), store)
}

/// Look up the version entry for `id`.
///
/// # Errors
///
/// Returns [`ManifestError::UnknownVersion`] listing every declared id, in
/// sorted order, when `id` is not declared.
pub fn resolve_version<'a>(manifest: &'a Manifest, id: &str) -> Result<&'a ManifestVersion> {
    manifest.version(id).ok_or_else(|| {
        let mut known: Vec<&str> = manifest
            .versions()
            .iter()
            .map(ManifestVersion::identifier)
            .collect();
        known.sort_unstable();
        let known = if known.is_empty() {
            "<none>".to_owned()
        } else {
            known.join(", ")
        };
        ManifestError::UnknownVersion {
            requested: id.to_owned(),
            known,
        }
    })
}

/// Read and validate the version manifest for `version` from the filesystem.
///
/// # Errors
///
/// Returns [`ManifestError`] when the file cannot be read or parsed, when its
/// `version` field differs from the requested identifier, or when any
/// artifact entry is malformed.
pub fn load_version_manifest(version: &ManifestVersion) -> Result<VersionManifest> {
    load_version_manifest_with(version, &FsStore)
}

/// Read and validate the version manifest for `version` through `store`.
///
/// # Errors
///
/// See [`load_version_manifest`].
pub fn load_version_manifest_with(
    version: &ManifestVersion,
    store: &dyn ManifestStore,
) -> Result<VersionManifest> {
    let path = version.manifest_path();
    log::debug!(
        "loading version manifest for {} from {}",
        version.identifier(),
        path.display()
    );
    let document = read_document(path, store)?;
    validate_version_manifest(document, path, version.identifier())
}

fn read_document(path: &Path, store: &dyn ManifestStore) -> Result<Value> {
    let text = store
        .read_to_string(path)
        .map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&text).map_err(|err| ManifestError::Parse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
