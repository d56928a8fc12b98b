//! Deterministic encoding shared by every component: canonical JSON,
//! SHA-256 hashing, Base58Check addresses, and the base64 signature
//! transport.
//!
//! Everything in here is a pure function over its arguments. Two executors
//! given the same logical record must produce the same bytes, the same
//! hash, and the same address, or state verification falls apart.

pub mod address;
pub mod base58;
pub mod base64;
mod canonical;
mod hashing;

pub use canonical::to_canonical;
pub use hashing::{sha256, sha256d, to_hash, Hash};
