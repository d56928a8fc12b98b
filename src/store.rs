//! Ledger persistence boundary.
//!
//! The core never talks to a database directly; it goes through
//! [`LedgerStore`], a get/put view of a versioned key-value ledger plus
//! the ledger's clock. [`MemoryLedger`] is the in-process implementation
//! used by the tests and by embeddings that bring their own durability.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::StoreError;

/// One persisted version of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Ledger transaction that wrote this version.
    pub tx_id: String,
    /// Ledger time of the write, in seconds.
    pub timestamp: u64,
    /// The bytes as written.
    pub value: Vec<u8>,
}

/// The narrow contract the channel core consumes.
///
/// Implementations must serialize operations that touch the same keys;
/// the core relies on that instead of locking internally. `put` appends a
/// new version, it never erases history.
pub trait LedgerStore {
    /// Latest bytes under `key`, or `None` if never written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes `value` as the newest version of `key`.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// The ledger's authoritative clock, in seconds. All lifecycle
    /// timing (dispute windows, timelocks) reads this, never the wall
    /// clock.
    fn current_timestamp(&self) -> u64;

    /// Every persisted version of `key`, oldest first. Empty if the key
    /// was never written.
    fn history_of(&self, key: &str) -> Result<Vec<HistoryEntry>, StoreError>;
}

/// Storage key of a channel record.
pub fn channel_key(channel_id: &str) -> String {
    channel_id.to_string()
}

/// Storage key of an address's wallet record.
pub fn wallet_key(address: &str) -> String {
    format!("wallet_{address}")
}

/// Storage key of a pending timelocked state.
pub fn timelock_key(channel_id: &str, nonce: u64) -> String {
    format!("timelock_{channel_id}_{nonce}")
}

/// Storage keys of the two settlement records written at close.
pub fn settlement_keys(channel_id: &str) -> (String, String) {
    (
        format!("{channel_id}_settlement1"),
        format!("{channel_id}_settlement2"),
    )
}

#[derive(Debug, Default)]
struct LedgerInner {
    entries: BTreeMap<String, Vec<HistoryEntry>>,
    now: u64,
    tx_counter: u64,
}

/// In-memory [`LedgerStore`] with full per-key history and a clock the
/// caller controls.
///
/// Time never advances by itself; drive it with [`set_time`] and
/// [`advance_time`]. Writes get synthetic transaction ids `tx1`, `tx2`,
/// ... in write order.
///
/// [`set_time`]: MemoryLedger::set_time
/// [`advance_time`]: MemoryLedger::advance_time
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<LedgerInner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        MemoryLedger::default()
    }

    /// A ledger whose clock starts at `now`.
    pub fn starting_at(now: u64) -> Self {
        let ledger = MemoryLedger::new();
        ledger.set_time(now);
        ledger
    }

    /// Moves the ledger clock to an absolute time.
    pub fn set_time(&self, now: u64) {
        self.inner.lock().expect("ledger lock poisoned").now = now;
    }

    /// Moves the ledger clock forward by `secs`.
    pub fn advance_time(&self, secs: u64) {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        inner.now = inner.now.saturating_add(secs);
    }
}

impl LedgerStore for MemoryLedger {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        Ok(inner
            .entries
            .get(key)
            .and_then(|versions| versions.last())
            .map(|entry| entry.value.clone()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        inner.tx_counter += 1;
        let entry = HistoryEntry {
            tx_id: format!("tx{}", inner.tx_counter),
            timestamp: inner.now,
            value: value.to_vec(),
        };
        inner.entries.entry(key.to_string()).or_default().push(entry);
        Ok(())
    }

    fn current_timestamp(&self) -> u64 {
        self.inner.lock().expect("ledger lock poisoned").now
    }

    fn history_of(&self, key: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        Ok(inner.entries.get(key).cloned().unwrap_or_default())
    }
}
