//! Release manifest model, validation, and loading.
//!
//! # Sub-modules
//!
//! - [`error`]: the validation error type shared by the whole release path.
//! - [`model`]: root manifest types (`Manifest`, `ManifestVersion`,
//!   `DeploymentConfig`, `Channel`).
//! - [`version`]: per-version manifest document (`VersionManifest`,
//!   `ArtifactSpec`).
//! - [`validation`]: structural checks for both document kinds.
//! - [`loader`]: two-phase loading behind the `ManifestStore` seam.

pub mod error;
pub mod loader;
pub mod model;
pub mod validation;
pub mod version;

pub use error::ManifestError;
pub use loader::{
    FsStore, ManifestStore, load_manifest, load_manifest_with, load_version_manifest,
    load_version_manifest_with, resolve_version,
};
pub use model::{
    Channel, ChannelConfig, ChannelMap, DeploymentConfig, Manifest, ManifestVersion,
};
pub use validation::{validate_manifest, validate_manifest_with, validate_version_manifest};
pub use version::{ArtifactSpec, VersionManifest};
