//! Two-party payment channels over a pluggable ledger store.
//!
//! Two parties lock funds under a jointly derived address, exchange
//! signed balance updates off the ledger, and touch it only to open,
//! contest, or settle. [`ChannelService`] drives the lifecycle
//! (`PROPOSED` → `ACTIVE` → `CLOSING` → `CLOSED` or `DISPUTED`) and the
//! timelock scheduler; [`codec`] produces the canonical bytes, hashes,
//! and addresses everything hangs off; [`sig`] checks the two-party
//! signatures; [`store::LedgerStore`] is the persistence seam an
//! embedding fills in.
//!
//! Every operation is a single read-validate-write: load the records it
//! needs, verify entirely in memory, then write. Nothing is cached
//! between calls, so any number of service instances over the same store
//! agree.

pub mod channel;
pub mod codec;
pub mod error;
pub mod service;
pub mod sig;
pub mod store;
mod timelock;

#[cfg(test)]
pub(crate) mod testutil;

pub use channel::{
    Channel, ChannelState, ChannelStatus, FundingStatus, FundingTx, PartyAddress, Record,
    RecordKind, Settlement, TimeLockState, Wallet, DISPUTE_PERIOD_SECS, SCHEMA_VERSION,
};
pub use codec::Hash;
pub use error::{ChannelError, CodecError, Result, StoreError};
pub use service::{ChannelRevision, ChannelService, LockPolicy, ServiceConfig};
pub use sig::Keypair;
pub use store::{HistoryEntry, LedgerStore, MemoryLedger};
