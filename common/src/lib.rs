//! Shared utilities for the otaship release tools.
//!
//! - [`digest`]: SHA-256 digest newtype and streamed file hashing.
//! - [`logging`]: stderr logging setup shared by the binaries.
//! - `test_support`: on-disk release tree builder (feature `test-support`).

pub mod digest;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use digest::{DigestError, Sha256Digest, compute_sha256, sha256_hex};
