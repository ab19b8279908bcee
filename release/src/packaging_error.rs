//! Error types for release packaging.

use crate::manifest::ManifestError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors arising while packaging a build or updating the root manifest.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// The root manifest, or a package parameter, failed validation.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The firmware binary to package does not exist.
    #[error("binary not found: {path}")]
    BinaryNotFound {
        /// Path given for the binary.
        path: PathBuf,
    },

    /// The version manifest would be written outside the root manifest's
    /// directory, so the root manifest cannot reference it.
    #[error("version manifest {path} is outside the manifest directory {root}")]
    OutsideManifestRoot {
        /// Path of the version manifest.
        path: PathBuf,
        /// Directory holding the root manifest.
        root: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The exclusive lock on the root manifest could not be taken.
    #[error("cannot lock {path}: {source}")]
    Lock {
        /// Path of the lock file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialisation of a manifest failed.
    #[error("manifest serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PackagingError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
