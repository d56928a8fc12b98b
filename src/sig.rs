//! State-update signatures.
//!
//! A candidate state is authorized by two ECDSA (secp256k1) signatures,
//! one per party, over the SHA-256 hash of the state's canonical form.
//! Signatures cross the boundary as base64 strings of the 64-byte compact
//! encoding, `r` in bytes 0..32 and `s` in bytes 32..64; public keys as
//! hex point encodings. Verification fails closed: malformed keys,
//! malformed signatures, and failed verification all collapse to `false`.
//!
//! The context is created once and passed by reference; nothing in here
//! holds state.

use secp256k1::ecdsa::Signature;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

use crate::channel::{ChannelState, PartyAddress};
use crate::codec::{address, base64, Hash};

/// Width of the compact signature encoding.
pub const SIGNATURE_SIZE: usize = 64;

/// Checks both signatures on a candidate state against the two parties'
/// public keys.
///
/// The hash is recomputed over the state's own `channelId`, `balance1`,
/// `balance2` and `nonce`; the signature fields themselves are excluded.
/// `signature1` must verify against `party1`, `signature2` against
/// `party2`. Never fails with an error, only with `false`.
pub fn validate_state(
    secp: &Secp256k1<All>,
    state: &ChannelState,
    party1: &PartyAddress,
    party2: &PartyAddress,
) -> bool {
    let hash = match state.digest() {
        Ok(h) => h,
        Err(_) => return false,
    };
    verify(secp, &hash, &state.signature1, &party1.public_key)
        && verify(secp, &hash, &state.signature2, &party2.public_key)
}

/// Verifies one base64 compact signature over `hash` against a hex-encoded
/// public key. Fails closed.
pub fn verify(secp: &Secp256k1<All>, hash: &Hash, signature_b64: &str, pubkey_hex: &str) -> bool {
    let sig_bytes = match base64::decode(signature_b64) {
        Ok(b) => b,
        Err(_) => return false,
    };
    if sig_bytes.len() != SIGNATURE_SIZE {
        return false;
    }
    let mut sig = match Signature::from_compact(&sig_bytes) {
        Ok(s) => s,
        Err(_) => return false,
    };
    // Accept either s form; the content commitment is what matters here.
    sig.normalize_s();

    let key_bytes = match hex::decode(pubkey_hex) {
        Ok(b) => b,
        Err(_) => return false,
    };
    let key = match PublicKey::from_slice(&key_bytes) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let msg = match Message::from_slice(hash.as_ref()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    secp.verify_ecdsa(&msg, &sig, &key).is_ok()
}

/// Signs `hash` with `secret`, returning the base64 compact encoding the
/// verifier expects.
pub fn sign(
    secp: &Secp256k1<All>,
    hash: &Hash,
    secret: &SecretKey,
) -> Result<String, secp256k1::Error> {
    let msg = Message::from_slice(hash.as_ref())?;
    let compact = secp.sign_ecdsa(&msg, secret).serialize_compact();
    Ok(base64::encode(&compact))
}

/// Key material for one channel party.
///
/// Bundles the secret key with the derived hex public key and single-key
/// address, which is what a party hands to `propose`.
pub struct Keypair {
    secret: SecretKey,
    public_hex: String,
    address: String,
}

impl Keypair {
    /// Generates a fresh keypair from the given randomness source.
    pub fn random<R: rand::Rng + ?Sized>(secp: &Secp256k1<All>, rng: &mut R) -> Self {
        let secret = SecretKey::new(rng);
        let public = PublicKey::from_secret_key(secp, &secret);
        let public_hex = hex::encode(public.serialize());
        let address = address::derive_address(&public_hex);
        Keypair {
            secret,
            public_hex,
            address,
        }
    }

    /// Hex encoding of the compressed public key point.
    pub fn public_key_hex(&self) -> &str {
        &self.public_hex
    }

    /// The party's single-key address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The secret key, for externally driven signing.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// The address/public-key pair as it appears in a channel record.
    pub fn party_address(&self) -> PartyAddress {
        PartyAddress {
            address: self.address.clone(),
            public_key: self.public_hex.clone(),
        }
    }

    /// Signs a candidate state's hash.
    pub fn sign_state(
        &self,
        secp: &Secp256k1<All>,
        state: &ChannelState,
    ) -> Result<String, SignError> {
        let hash = state.digest().map_err(|_| SignError::Digest)?;
        sign(secp, &hash, &self.secret).map_err(SignError::Backend)
    }
}

impl core::fmt::Debug for Keypair {
    // The secret key stays out of logs.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address)
            .field("public_key", &self.public_hex)
            .finish()
    }
}

/// Failure while producing a state signature.
#[derive(Debug)]
pub enum SignError {
    /// The state could not be canonicalized for hashing.
    Digest,
    /// The signing backend rejected the input.
    Backend(secp256k1::Error),
}
