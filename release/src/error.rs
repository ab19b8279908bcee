//! Top-level error type for the release tools.
//!
//! [`ReleaseError`] gathers every failure the deploy and package tools can
//! report and decides the process exit code: validation failures exit with
//! 2, everything else with 1.

use crate::config::ConfigError;
use crate::dispatch::DispatchFailure;
use crate::manifest::ManifestError;
use crate::packaging_error::PackagingError;
use thiserror::Error;

/// Exit code for manifest and validation failures.
pub const EXIT_VALIDATION: i32 = 2;

/// Exit code for any other failure.
pub const EXIT_FAILURE: i32 = 1;

/// Errors reported by the deploy and package tools.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// Loading, validating, or verifying a manifest failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Delivery stopped on its first failing leaf.
    #[error(transparent)]
    Dispatch(#[from] DispatchFailure),

    /// Packaging a build failed.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// The settings file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ReleaseError {
    /// Return the process exit code for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use otaship_release::error::ReleaseError;
    /// use otaship_release::manifest::ManifestError;
    ///
    /// let err = ReleaseError::from(ManifestError::invalid("'product' section is required"));
    /// assert_eq!(err.exit_code(), 2);
    /// ```
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        let validation = match self {
            Self::Manifest(_) | Self::Packaging(PackagingError::Manifest(_)) => true,
            Self::Dispatch(failure) => failure.is_validation(),
            Self::Packaging(_) | Self::Config(_) => false,
        };
        if validation { EXIT_VALIDATION } else { EXIT_FAILURE }
    }
}
