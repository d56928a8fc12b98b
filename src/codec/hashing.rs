//! SHA-256 over canonical bytes.

use core::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::to_canonical;
use crate::error::CodecError;

/// A 32-byte SHA-256 output.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash(0x{})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hashes a record's canonical serialization.
///
/// This is the digest every signature in the system commits to: serialize
/// canonically, then one round of SHA-256.
pub fn to_hash<T: Serialize>(value: &T) -> Result<Hash, CodecError> {
    let bytes = to_canonical(value)?;
    Ok(sha256(&bytes))
}

/// One SHA-256 round over raw bytes.
pub fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash(out)
}

/// Double SHA-256, the checksum primitive behind Base58Check.
pub fn sha256d(bytes: &[u8]) -> Hash {
    sha256(sha256(bytes).as_ref())
}
