//! Resolution of declared artifacts into verified deployment units.

use super::merge::merge_channels;
use super::verification::verify_integrity;
use crate::manifest::error::{ManifestError, Result};
use crate::manifest::{ArtifactSpec, ChannelConfig, ChannelMap, Manifest, VersionManifest};
use otaship_common::Sha256Digest;
use std::path::{Path, PathBuf};

/// A verified, fully configured artifact ready for dispatch.
///
/// Only produced by [`ArtifactResolver`] after the integrity gate passes.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionArtifact {
    name: String,
    source: PathBuf,
    filename: String,
    size: u64,
    sha256: Sha256Digest,
    protocols: Vec<String>,
    channels: ChannelMap,
}

impl VersionArtifact {
    pub(crate) fn new(
        spec: &ArtifactSpec,
        source: PathBuf,
        sha256: Sha256Digest,
        protocols: Vec<String>,
        channels: ChannelMap,
    ) -> Self {
        Self {
            name: spec.name.clone(),
            source,
            filename: spec.filename.clone(),
            size: spec.size,
            sha256,
            protocols,
            channels,
        }
    }

    /// Return the artifact name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the absolute path of the source file.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Return the declared file name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Return the verified size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Return the verified SHA-256 digest.
    #[must_use]
    pub fn sha256(&self) -> &Sha256Digest {
        &self.sha256
    }

    /// Return the protocols to deliver over, in order.
    #[must_use]
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Return the merged channel configurations.
    #[must_use]
    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    /// Return the merged configuration for `channel`, if any.
    #[must_use]
    pub fn channel(&self, channel: &str) -> Option<&ChannelConfig> {
        self.channels.get(channel)
    }
}

/// Lazily resolves the artifacts of one version, in declaration order.
///
/// Each step merges the artifact's channel overrides over the version tier,
/// applies protocol defaulting, and runs the integrity gate. Iteration
/// yields the first failure and then stops.
#[derive(Debug)]
pub struct ArtifactResolver<'a> {
    manifest: &'a Manifest,
    artifacts: std::slice::Iter<'a, ArtifactSpec>,
    version_channels: ChannelMap,
    root: PathBuf,
    failed: bool,
}

impl<'a> ArtifactResolver<'a> {
    /// Create a resolver for `version` under `manifest`.
    #[must_use]
    pub fn new(manifest: &'a Manifest, version: &'a VersionManifest) -> Self {
        Self {
            manifest,
            artifacts: version.artifacts.iter(),
            version_channels: manifest.deployment().merge_channels(&version.channels),
            root: version.artifact_root(),
            failed: false,
        }
    }

    fn resolve(&self, spec: &ArtifactSpec) -> Result<VersionArtifact> {
        let joined = self.root.join(&spec.filename);
        let source = std::path::absolute(&joined).map_err(|source| ManifestError::ArtifactRead {
            artifact: spec.name.clone(),
            path: joined.clone(),
            source,
        })?;
        let sha256 = verify_integrity(spec, &source)?;
        let protocols = spec
            .protocols
            .clone()
            .unwrap_or_else(|| self.manifest.deployment().default_protocols().to_vec());
        let channels = merge_channels(&self.version_channels, &spec.channels);
        Ok(VersionArtifact::new(spec, source, sha256, protocols, channels))
    }
}

impl Iterator for ArtifactResolver<'_> {
    type Item = Result<VersionArtifact>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let spec = self.artifacts.next()?;
        let resolved = self.resolve(spec);
        self.failed = resolved.is_err();
        Some(resolved)
    }
}

/// Resolve the artifacts of `version` lazily.
///
/// # Examples
///
/// ```no_run
/// use otaship_release::artifact::iter_artifacts;
/// use otaship_release::manifest::{load_manifest, load_version_manifest, resolve_version};
/// use std::path::Path;
///
/// let manifest = load_manifest(Path::new("ota/manifest.json"))?;
/// let entry = resolve_version(&manifest, "0.0.1")?;
/// let version = load_version_manifest(entry)?;
/// for artifact in iter_artifacts(&manifest, &version) {
///     let artifact = artifact?;
///     println!("{} -> {}", artifact.name(), artifact.source().display());
/// }
/// # Ok::<(), otaship_release::manifest::ManifestError>(())
/// ```
#[must_use]
pub fn iter_artifacts<'a>(
    manifest: &'a Manifest,
    version: &'a VersionManifest,
) -> ArtifactResolver<'a> {
    ArtifactResolver::new(manifest, version)
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
