//! Manifest-driven firmware release engine.
//!
//! This crate validates a two-level release manifest, resolves and verifies
//! the artifacts of one version, and delivers them over MQTT and HTTPS. It
//! also authors new versions from built binaries. The `ota-deploy` and
//! `ota-package` binaries are thin wrappers over [`cli`].
//!
//! # Modules
//!
//! - [`artifact`] - Channel merging, artifact resolution and integrity checks
//! - [`cli`] - Command-line definitions and entry points
//! - [`config`] - Optional TOML settings supplying transport fallbacks
//! - [`dispatch`] - Ordered delivery with dry-run and a per-leaf report
//! - [`error`] - Top-level error type and exit codes
//! - [`manifest`] - Manifest model, validation and loading
//! - [`packaging`] - Version manifest authoring and root manifest updates
//! - [`packaging_error`] - Packaging error type
//! - [`transport`] - MQTT and HTTPS handlers behind mockable seams

pub mod artifact;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod manifest;
pub mod packaging;
pub mod packaging_error;
pub mod transport;
