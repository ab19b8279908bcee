//! Validation errors for release manifests and resolved artifacts.
//!
//! Every variant is a manifest-validation failure: the release tools map the
//! whole enum to exit code 2. Messages name the field, version, artifact, or
//! channel at fault, and carry expected versus actual values where a
//! comparison failed.

use otaship_common::DigestError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating, or resolving manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A structural constraint on a manifest field was violated.
    #[error("{message}")]
    InvalidField {
        /// Description of the violated constraint.
        message: String,
    },

    /// A manifest file could not be read.
    #[error("cannot read manifest {path}: {source}")]
    Read {
        /// Path of the unreadable file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A manifest file is not valid JSON or has mistyped fields.
    #[error("cannot parse manifest {path}: {reason}")]
    Parse {
        /// Path of the malformed file.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// The version manifest referenced by a version entry does not exist.
    #[error("referenced version manifest '{manifest}' for version '{version}' is missing")]
    MissingVersionManifest {
        /// The version identifier owning the reference.
        version: String,
        /// The manifest path as written in the root manifest.
        manifest: String,
    },

    /// The same version identifier is declared more than once.
    #[error("version '{version}' is declared more than once")]
    DuplicateVersion {
        /// The repeated identifier.
        version: String,
    },

    /// The requested version is not declared in the root manifest.
    #[error("version '{requested}' is not declared in the manifest (known: {known})")]
    UnknownVersion {
        /// The identifier that was asked for.
        requested: String,
        /// Comma-separated, sorted list of declared identifiers.
        known: String,
    },

    /// A version manifest declares a different version than requested.
    #[error("version manifest declares version '{found}' but '{expected}' was requested")]
    VersionMismatch {
        /// The identifier that was requested.
        expected: String,
        /// The identifier found in the version manifest.
        found: String,
    },

    /// An artifact's source file does not exist.
    #[error("artifact '{artifact}' file '{path}' is missing")]
    MissingArtifactFile {
        /// The artifact name.
        artifact: String,
        /// The resolved source path.
        path: PathBuf,
    },

    /// An artifact's source file exists but could not be inspected or read.
    #[error("cannot read artifact '{artifact}' at {path}: {source}")]
    ArtifactRead {
        /// The artifact name.
        artifact: String,
        /// The resolved source path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An artifact's on-disk size differs from its declared size.
    #[error("artifact '{artifact}' size mismatch: manifest={expected} actual={actual}")]
    SizeMismatch {
        /// The artifact name.
        artifact: String,
        /// The declared size in bytes.
        expected: u64,
        /// The size found on disk.
        actual: u64,
    },

    /// An artifact's content hash differs from its declared digest.
    #[error("artifact '{artifact}' checksum mismatch: manifest={expected} actual={actual}")]
    ChecksumMismatch {
        /// The artifact name.
        artifact: String,
        /// The declared SHA-256 digest.
        expected: String,
        /// The digest computed from the file.
        actual: String,
    },

    /// An artifact declares a digest that is not 64 lowercase hex characters.
    #[error("artifact '{artifact}' declares an invalid sha256: {source}")]
    InvalidDigest {
        /// The artifact name.
        artifact: String,
        /// What is wrong with the digest.
        #[source]
        source: DigestError,
    },

    /// An artifact declares a protocol with no matching channel configuration.
    #[error("artifact '{artifact}' declares protocol '{protocol}' without a channel configuration")]
    MissingChannel {
        /// The artifact name.
        artifact: String,
        /// The protocol without a channel.
        protocol: String,
    },

    /// A protocol name has no built-in transport handler.
    #[error("unsupported protocol '{protocol}'")]
    UnsupportedProtocol {
        /// The rejected protocol name.
        protocol: String,
    },

    /// A broker or upload URL uses a scheme the handler does not speak.
    #[error("unsupported {protocol} scheme '{scheme}': expected {expected}")]
    UnsupportedScheme {
        /// The protocol whose channel carries the URL.
        protocol: &'static str,
        /// The rejected scheme.
        scheme: String,
        /// Human-readable list of accepted schemes.
        expected: &'static str,
    },

    /// A channel is missing a required key or carries an invalid value.
    #[error("{protocol} channel field '{field}' {problem}")]
    ChannelField {
        /// The protocol whose channel is at fault.
        protocol: &'static str,
        /// The offending key.
        field: &'static str,
        /// What is wrong with it.
        problem: String,
    },
}

impl ManifestError {
    /// Build an [`InvalidField`](Self::InvalidField) error from a message.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidField {
            message: message.into(),
        }
    }

    /// Build a [`ChannelField`](Self::ChannelField) error.
    #[must_use]
    pub fn channel_field(
        protocol: &'static str,
        field: &'static str,
        problem: impl Into<String>,
    ) -> Self {
        Self::ChannelField {
            protocol,
            field,
            problem: problem.into(),
        }
    }
}

/// Result type alias using [`ManifestError`].
pub type Result<T> = std::result::Result<T, ManifestError>;
