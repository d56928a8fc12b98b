//! Error types shared across the crate.
//!
//! Every lifecycle and scheduler failure maps to exactly one
//! [`ChannelError`] variant so callers can branch on the kind. Operations
//! are all-or-nothing: an error means nothing was persisted.

use thiserror::Error;

use crate::channel::ChannelStatus;

/// Alias for results carrying a [`ChannelError`].
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Terminal failure of a single lifecycle or scheduler invocation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChannelError {
    /// A record already occupies the key a create-style operation targets.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// No record under the requested key.
    #[error("not found: {0}")]
    NotFound(String),

    /// The channel is not in the status the transition requires.
    #[error("channel {id} is {actual}, operation requires {required}")]
    InvalidState {
        /// Channel identifier.
        id: String,
        /// Status the operation requires.
        required: ChannelStatus,
        /// Status the channel is actually in.
        actual: ChannelStatus,
    },

    /// One or both signatures on a candidate state failed verification.
    #[error("state update carries an invalid or missing signature")]
    SignatureInvalid,

    /// The candidate state's nonce does not strictly exceed the channel's.
    #[error("nonce {submitted} does not supersede current nonce {current}")]
    StaleNonce {
        /// Nonce carried by the submitted state.
        submitted: u64,
        /// Nonce the channel currently holds.
        current: u64,
    },

    /// The funding transaction or the candidate balances misstate the
    /// channel's locked total.
    #[error("funding rejected: {0}")]
    FundingInvalid(String),

    /// The timelock on a pending state has not elapsed.
    #[error("timelock holds until {unlock_at}, ledger time is {now}")]
    TimelockNotExpired {
        /// Earliest execution timestamp of the pending state.
        unlock_at: u64,
        /// Current ledger time.
        now: u64,
    },

    /// The dispute window has not elapsed since channel creation.
    #[error("dispute window open until {until}, ledger time is {now}")]
    DisputeWindowOpen {
        /// Timestamp at which the window closes.
        until: u64,
        /// Current ledger time.
        now: u64,
    },

    /// A party's wallet cannot cover its lock amount.
    #[error("wallet {address} holds {available}, lock requires {required}")]
    InsufficientFunds {
        /// Wallet address that was checked.
        address: String,
        /// Balance the wallet reported.
        available: u64,
        /// Amount the lock requires.
        required: u64,
    },

    /// Stored bytes under the key did not decode into the expected record.
    #[error("record under {key} is corrupt: {reason}")]
    Corrupt {
        /// Key whose bytes were rejected.
        key: String,
        /// What failed while decoding.
        reason: String,
    },

    /// Canonicalization or parsing failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Transport-level store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error produced by the deterministic codec.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CodecError {
    /// Float values have ambiguous textual forms and are rejected outright;
    /// amounts are integers.
    #[error("float values are not canonicalizable: {0}")]
    FloatRejected(f64),

    /// JSON (de)serialization failed.
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Input was not valid base58 / Base58Check.
    #[error("invalid base58: {0}")]
    Base58(String),

    /// Input was not valid base64.
    #[error("invalid base64: {0}")]
    Base64(String),
}

/// Transport failure reported by a [`LedgerStore`](crate::store::LedgerStore)
/// implementation.
#[derive(Error, Debug)]
#[error("ledger store: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Wraps a backend failure message.
    pub fn new(msg: impl Into<String>) -> Self {
        StoreError(msg.into())
    }
}
