//! Channel data model and the stored record envelope.
//!
//! Everything here is plain data: the lifecycle logic lives in
//! [`crate::service`], persistence behind [`crate::store::LedgerStore`].
//! Field names follow the wire form (camelCase) so a record's canonical
//! bytes read the same as its API shape.

use core::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::{to_canonical, to_hash, Hash};
use crate::error::CodecError;

/// Fixed dispute window, in ledger seconds (24 hours).
pub const DISPUTE_PERIOD_SECS: u64 = 86_400;

/// Schema version stamped into every stored record.
pub const SCHEMA_VERSION: u32 = 1;

/// Lifecycle states of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    Proposed,
    Active,
    Closing,
    Closed,
    Disputed,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Proposed => "PROPOSED",
            ChannelStatus::Active => "ACTIVE",
            ChannelStatus::Closing => "CLOSING",
            ChannelStatus::Closed => "CLOSED",
            ChannelStatus::Disputed => "DISPUTED",
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One party's identity: settlement address plus the hex public key its
/// signatures verify against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyAddress {
    pub address: String,
    pub public_key: String,
}

/// The authoritative on-ledger view of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub channel_id: String,
    pub party1: PartyAddress,
    pub party2: PartyAddress,
    /// party1's share of the locked funds.
    pub balance1: u64,
    /// party2's share of the locked funds.
    pub balance2: u64,
    /// Version of the last state applied on-ledger. Starts at 0; any
    /// accepted update must carry a strictly greater one.
    pub nonce: u64,
    pub status: ChannelStatus,
    /// Joint address the funding must pay into.
    pub multi_sig_address: String,
    pub created_at: u64,
    pub closed_at: Option<u64>,
    pub funding_tx_id: Option<String>,
    pub settlement_tx1: Option<String>,
    pub settlement_tx2: Option<String>,
}

impl Channel {
    /// Sum of both balances, `None` on overflow.
    pub fn locked_total(&self) -> Option<u64> {
        self.balance1.checked_add(self.balance2)
    }
}

/// A candidate state as exchanged between the parties.
///
/// The signature fields default to empty so partially signed states
/// deserialize; an empty signature never verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    pub channel_id: String,
    pub balance1: u64,
    pub balance2: u64,
    pub nonce: u64,
    #[serde(default)]
    pub signature1: String,
    #[serde(default)]
    pub signature2: String,
}

/// The exact fields both parties sign, in their canonical form.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateDigest<'a> {
    channel_id: &'a str,
    balance1: u64,
    balance2: u64,
    nonce: u64,
}

impl ChannelState {
    /// A state with empty signature slots.
    pub fn unsigned(
        channel_id: impl Into<String>,
        balance1: u64,
        balance2: u64,
        nonce: u64,
    ) -> Self {
        ChannelState {
            channel_id: channel_id.into(),
            balance1,
            balance2,
            nonce,
            signature1: String::new(),
            signature2: String::new(),
        }
    }

    /// Parses a state from its JSON form. Field order does not matter;
    /// missing signature fields come back empty.
    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(json)?)
    }

    /// SHA-256 over the canonical encoding of `channelId`, `balance1`,
    /// `balance2` and `nonce`. Signatures are not part of the hash.
    pub fn digest(&self) -> Result<Hash, CodecError> {
        to_hash(&StateDigest {
            channel_id: &self.channel_id,
            balance1: self.balance1,
            balance2: self.balance2,
            nonce: self.nonce,
        })
    }

    /// Sum of both balances, `None` on overflow.
    pub fn total(&self) -> Option<u64> {
        self.balance1.checked_add(self.balance2)
    }
}

/// A signed state parked behind a timelock, waiting to be forced onto the
/// channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLockState {
    pub channel_id: String,
    pub state: ChannelState,
    /// Ledger time after which the state may be executed.
    pub timelock: u64,
    /// The wrapped state's nonce, also part of the storage key.
    pub sequence: u64,
    /// Address of the party that submitted the candidate.
    pub submitted_by: String,
    /// Set once the state has been applied; an executed record no longer
    /// resolves.
    #[serde(default)]
    pub executed: bool,
}

/// Confirmation states of a funding transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundingStatus {
    Pending,
    Confirmed,
    Failed,
}

impl fmt::Display for FundingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FundingStatus::Pending => "PENDING",
            FundingStatus::Confirmed => "CONFIRMED",
            FundingStatus::Failed => "FAILED",
        })
    }
}

/// A funding transaction as recorded on the ledger, keyed by its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingTx {
    pub tx_id: String,
    pub recipient: String,
    pub amount: u64,
    pub status: FundingStatus,
}

/// On-ledger balance of a single address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub address: String,
    pub balance: u64,
}

/// Payout record written for each party when a channel settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub channel_id: String,
    pub payer: String,
    pub payee: String,
    pub amount: u64,
    pub settled_at: u64,
}

/// Tag identifying what a stored record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Channel,
    Wallet,
    Timelock,
    Funding,
    Settlement,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Channel => "channel",
            RecordKind::Wallet => "wallet",
            RecordKind::Timelock => "timelock",
            RecordKind::Funding => "funding",
            RecordKind::Settlement => "settlement",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope around every stored value: a kind tag and a schema version,
/// flattened alongside the record's own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<T> {
    pub kind: RecordKind,
    pub schema: u32,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> Record<T> {
    /// Wraps `body` under the current schema version.
    pub fn seal(kind: RecordKind, body: T) -> Self {
        Record {
            kind,
            schema: SCHEMA_VERSION,
            body,
        }
    }

    /// Canonical bytes of the envelope, as they go into the store.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        to_canonical(self)
    }
}

/// Unwraps stored bytes, insisting on the expected kind and a readable
/// schema. The error is the rejection reason, to be wrapped with the key
/// by the caller.
pub(crate) fn decode_record<T: DeserializeOwned>(
    bytes: &[u8],
    expect: RecordKind,
) -> Result<T, String> {
    let record: Record<T> = serde_json::from_slice(bytes).map_err(|err| err.to_string())?;
    if record.kind != expect {
        return Err(format!(
            "holds a {} record, expected {}",
            record.kind, expect
        ));
    }
    if record.schema != SCHEMA_VERSION {
        return Err(format!(
            "schema {} is newer than this build reads ({})",
            record.schema, SCHEMA_VERSION
        ));
    }
    Ok(record.body)
}
