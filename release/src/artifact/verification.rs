//! Integrity gate for artifact source files.
//!
//! Checks run in a fixed order: existence, byte size, then SHA-256. The hash
//! is only computed once the cheaper checks pass.

use crate::manifest::error::{ManifestError, Result};
use crate::manifest::ArtifactSpec;
use otaship_common::{Sha256Digest, compute_sha256};
use std::io;
use std::path::Path;

/// Verify that the file at `source` matches the size and digest `spec`
/// declares.
///
/// Returns the verified digest.
///
/// # Errors
///
/// Returns [`ManifestError::MissingArtifactFile`], [`ManifestError::SizeMismatch`],
/// or [`ManifestError::ChecksumMismatch`] naming the artifact and the
/// expected versus actual value; [`ManifestError::InvalidDigest`] when the
/// declared digest is malformed.
pub fn verify_integrity(spec: &ArtifactSpec, source: &Path) -> Result<Sha256Digest> {
    let expected = spec.sha256.parse::<Sha256Digest>().map_err(|err| {
        ManifestError::InvalidDigest {
            artifact: spec.name.clone(),
            source: err,
        }
    })?;

    let metadata = match std::fs::metadata(source) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(missing(spec, source)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(missing(spec, source)),
        Err(err) => return Err(read_error(spec, source, err)),
    };

    if metadata.len() != spec.size {
        return Err(ManifestError::SizeMismatch {
            artifact: spec.name.clone(),
            expected: spec.size,
            actual: metadata.len(),
        });
    }

    let actual = compute_sha256(source).map_err(|err| read_error(spec, source, err))?;
    if actual != expected {
        return Err(ManifestError::ChecksumMismatch {
            artifact: spec.name.clone(),
            expected: expected.into_inner(),
            actual: actual.into_inner(),
        });
    }

    log::debug!("verified artifact {} ({} bytes, sha256 {actual})", spec.name, spec.size);
    Ok(actual)
}

fn missing(spec: &ArtifactSpec, source: &Path) -> ManifestError {
    ManifestError::MissingArtifactFile {
        artifact: spec.name.clone(),
        path: source.to_path_buf(),
    }
}

fn read_error(spec: &ArtifactSpec, source: &Path, err: io::Error) -> ManifestError {
    ManifestError::ArtifactRead {
        artifact: spec.name.clone(),
        path: source.to_path_buf(),
        source: err,
    }
}
