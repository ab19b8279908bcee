//! SHA-256 digest newtype and file hashing.
//!
//! Digests are carried as 64-character lowercase hexadecimal strings, the
//! form used by release manifests. Hashing streams the file in fixed-size
//! chunks so large firmware images never need to fit in memory.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Read buffer size used while hashing files.
const CHUNK_SIZE: usize = 64 * 1024;

/// Ways a declared digest string can be malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// The string is not 64 characters long.
    #[error("expected {DIGEST_HEX_LEN} hex characters, got {found}")]
    Length {
        /// Number of characters supplied.
        found: usize,
    },
    /// A character outside `0-9a-f` was found.
    #[error("character {found:?} at offset {offset} is not lowercase hex")]
    Character {
        /// Offending character.
        found: char,
        /// Its byte offset in the string.
        offset: usize,
    },
}

/// A SHA-256 digest in the lowercase hex form release manifests carry.
///
/// Parsed digests are checked for shape only; use [`compute_sha256`] or
/// [`sha256_hex`] to produce one from content.
///
/// # Examples
///
/// ```
/// use otaship_common::{Sha256Digest, sha256_hex};
///
/// let declared: Sha256Digest = sha256_hex(b"fw").as_str().parse().expect("valid digest");
/// assert_eq!(declared, sha256_hex(b"fw"));
/// assert!("CAFE".parse::<Sha256Digest>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    fn from_hasher(hasher: Sha256) -> Self {
        Self(format!("{:x}", hasher.finalize()))
    }
}

impl FromStr for Sha256Digest {
    type Err = DigestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let found = value.chars().count();
        if found != DIGEST_HEX_LEN {
            return Err(DigestError::Length { found });
        }
        match value
            .char_indices()
            .find(|(_, c)| !matches!(c, '0'..='9' | 'a'..='f'))
        {
            Some((offset, found)) => Err(DigestError::Character { found, offset }),
            None => Ok(Self(value.to_owned())),
        }
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be opened or read.
pub fn compute_sha256(path: &Path) -> io::Result<Sha256Digest> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(Sha256Digest::from_hasher(hasher))
}

/// Return the SHA-256 digest of an in-memory byte slice.
///
/// # Examples
///
/// ```
/// use otaship_common::sha256_hex;
///
/// let digest = sha256_hex(b"");
/// assert!(digest.as_str().starts_with("e3b0c442"));
/// ```
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> Sha256Digest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Sha256Digest::from_hasher(hasher)
}
