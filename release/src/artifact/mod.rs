//! Channel merge, artifact resolution, and the integrity gate.
//!
//! # Sub-modules
//!
//! - [`merge`]: shallow three-tier channel merge.
//! - [`resolver`]: lazy production of verified `VersionArtifact` descriptors.
//! - [`verification`]: size and SHA-256 checks against declared metadata.

pub mod merge;
pub mod resolver;
pub mod verification;

pub use merge::merge_channels;
pub use resolver::{ArtifactResolver, VersionArtifact, iter_artifacts};
pub use verification::verify_integrity;
