//! Address derivation.
//!
//! Both flavors share one pipeline: SHA-256 over the key material,
//! RIPEMD-160 over that, a version byte, Base58Check. Key material is the
//! hex string encoding of the public key(s), which keeps the hashing domain
//! identical to the sort domain used for multisig ordering.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use super::base58;
use crate::error::CodecError;

/// Version byte for jointly controlled (2-of-2) addresses.
pub const VERSION_MULTISIG: u8 = 0x05;

/// Version byte for ordinary single-key addresses.
pub const VERSION_SINGLE: u8 = 0x00;

/// Derives the joint address the channel's funds are locked under.
///
/// The two public keys are sorted lexicographically first, so the result is
/// a function of the key *set*: either argument order produces the same
/// address.
pub fn derive_multisig_address(pubkey_a: &str, pubkey_b: &str) -> String {
    let (first, second) = if pubkey_a.as_bytes() <= pubkey_b.as_bytes() {
        (pubkey_a, pubkey_b)
    } else {
        (pubkey_b, pubkey_a)
    };
    let mut joined = String::with_capacity(first.len() + second.len());
    joined.push_str(first);
    joined.push_str(second);
    versioned_key_hash(VERSION_MULTISIG, joined.as_bytes())
}

/// Derives an ordinary single-key address.
pub fn derive_address(pubkey: &str) -> String {
    versioned_key_hash(VERSION_SINGLE, pubkey.as_bytes())
}

fn versioned_key_hash(version: u8, key_material: &[u8]) -> String {
    let sha = Sha256::digest(key_material);
    let rip = Ripemd160::digest(sha);
    base58::check_encode(version, &rip)
}

/// Checks that `address` is a well-formed Base58Check address string with a
/// 20-byte hash payload.
pub fn validate_address(address: &str) -> Result<(), CodecError> {
    let (_, payload) = base58::check_decode(address)?;
    if payload.len() != 20 {
        return Err(CodecError::Base58(format!(
            "address payload is {} bytes, expected 20",
            payload.len()
        )));
    }
    Ok(())
}
