//! Channel lifecycle operations.
//!
//! [`ChannelService`] is the single entry point: every operation loads the
//! records it needs, validates entirely in memory, and only then writes.
//! Writes are staged in a [`WriteSet`] so a failed validation never leaves
//! a partial update behind. The service holds no channel state of its own;
//! two instances over the same store behave identically.

use log::{debug, info, warn};
use secp256k1::{All, Secp256k1};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::channel::{
    decode_record, Channel, ChannelState, ChannelStatus, FundingStatus, FundingTx, PartyAddress,
    Record, RecordKind, Settlement, Wallet, DISPUTE_PERIOD_SECS,
};
use crate::codec::address::{derive_multisig_address, validate_address};
use crate::error::{ChannelError, Result};
use crate::sig;
use crate::store::{channel_key, settlement_keys, wallet_key, LedgerStore};

/// When party funds are debited from their wallet records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// Debit at proposal time. The default: funds are committed the
    /// moment the channel exists.
    #[default]
    OnPropose,
    /// Debit at activation time, once the funding transaction checks
    /// out.
    OnActivate,
}

/// Service configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceConfig {
    pub lock_policy: LockPolicy,
}

/// One historical version of a channel record.
#[derive(Debug, Clone)]
pub struct ChannelRevision {
    /// Ledger transaction that wrote this version.
    pub tx_id: String,
    /// Ledger time of the write.
    pub timestamp: u64,
    pub channel: Channel,
}

/// The channel lifecycle manager.
///
/// Generic over the store so embeddings can bring their own ledger; the
/// tests run it over [`crate::store::MemoryLedger`].
#[derive(Debug)]
pub struct ChannelService<S: LedgerStore> {
    pub(crate) store: S,
    pub(crate) secp: Secp256k1<All>,
    pub(crate) config: ServiceConfig,
}

impl<S: LedgerStore> ChannelService<S> {
    pub fn new(store: S) -> Self {
        ChannelService::with_config(store, ServiceConfig::default())
    }

    pub fn with_config(store: S, config: ServiceConfig) -> Self {
        ChannelService {
            store,
            secp: Secp256k1::new(),
            config,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> ServiceConfig {
        self.config
    }

    /// Opens a channel in `PROPOSED` between two parties.
    ///
    /// Both addresses must be well formed and distinct. Under
    /// [`LockPolicy::OnPropose`] each party with a wallet record is
    /// debited its balance here; a party without one is left to the
    /// funding check at activation.
    #[allow(clippy::too_many_arguments)]
    pub fn propose(
        &self,
        channel_id: &str,
        address1: &str,
        public_key1: &str,
        address2: &str,
        public_key2: &str,
        balance1: u64,
        balance2: u64,
    ) -> Result<Channel> {
        if self
            .load::<Channel>(&channel_key(channel_id), RecordKind::Channel)?
            .is_some()
        {
            return Err(ChannelError::AlreadyExists(channel_id.to_string()));
        }
        validate_address(address1)?;
        validate_address(address2)?;
        if address1 == address2 {
            // Wallet debits and settlement credits are staged per
            // address; one party on both sides would fold them into a
            // single write.
            return Err(ChannelError::FundingInvalid(format!(
                "both parties are {address1}"
            )));
        }
        let Some(total) = balance1.checked_add(balance2) else {
            return Err(ChannelError::FundingInvalid(
                "balance total overflows".into(),
            ));
        };

        let multi_sig_address = derive_multisig_address(public_key1, public_key2);
        debug!("channel {channel_id} funds lock under {multi_sig_address}");

        let mut writes = WriteSet::default();
        if self.config.lock_policy == LockPolicy::OnPropose {
            self.lock_party_funds(&mut writes, address1, balance1)?;
            self.lock_party_funds(&mut writes, address2, balance2)?;
        }

        let channel = Channel {
            channel_id: channel_id.to_string(),
            party1: PartyAddress {
                address: address1.to_string(),
                public_key: public_key1.to_string(),
            },
            party2: PartyAddress {
                address: address2.to_string(),
                public_key: public_key2.to_string(),
            },
            balance1,
            balance2,
            nonce: 0,
            status: ChannelStatus::Proposed,
            multi_sig_address,
            created_at: self.store.current_timestamp(),
            closed_at: None,
            funding_tx_id: None,
            settlement_tx1: None,
            settlement_tx2: None,
        };
        writes.stage(channel_key(channel_id), RecordKind::Channel, &channel)?;
        writes.commit(&self.store)?;
        info!("channel {channel_id} proposed, {total} to lock between {address1} and {address2}");
        Ok(channel)
    }

    /// Activates a `PROPOSED` channel against its funding transaction.
    ///
    /// The funding record must exist, pay the channel's joint address,
    /// cover both balances, and be `CONFIRMED`; anything else is
    /// [`ChannelError::FundingInvalid`].
    pub fn activate(&self, channel_id: &str, funding_tx_id: &str) -> Result<Channel> {
        let mut channel = self.load_channel(channel_id)?;
        Self::require_status(&channel, ChannelStatus::Proposed)?;
        let Some(total) = channel.locked_total() else {
            return Err(ChannelError::Corrupt {
                key: channel_key(channel_id),
                reason: "balance total overflows".into(),
            });
        };

        let funding: FundingTx = self
            .load(funding_tx_id, RecordKind::Funding)?
            .ok_or_else(|| {
                ChannelError::FundingInvalid(format!(
                    "no funding transaction under {funding_tx_id}"
                ))
            })?;
        if funding.recipient != channel.multi_sig_address {
            return Err(ChannelError::FundingInvalid(format!(
                "funding pays {}, channel funds lock under {}",
                funding.recipient, channel.multi_sig_address
            )));
        }
        if funding.amount < total {
            return Err(ChannelError::FundingInvalid(format!(
                "funding amount {} is below the locked total {total}",
                funding.amount
            )));
        }
        if funding.status != FundingStatus::Confirmed {
            return Err(ChannelError::FundingInvalid(format!(
                "funding transaction is {}",
                funding.status
            )));
        }

        let mut writes = WriteSet::default();
        if self.config.lock_policy == LockPolicy::OnActivate {
            self.lock_party_funds(&mut writes, &channel.party1.address, channel.balance1)?;
            self.lock_party_funds(&mut writes, &channel.party2.address, channel.balance2)?;
        }
        channel.status = ChannelStatus::Active;
        channel.funding_tx_id = Some(funding_tx_id.to_string());
        writes.stage(channel_key(channel_id), RecordKind::Channel, &channel)?;
        writes.commit(&self.store)?;
        info!("channel {channel_id} active, funded by {funding_tx_id}");
        Ok(channel)
    }

    /// Starts cooperative closure of an `ACTIVE` channel with a mutually
    /// signed final state.
    ///
    /// `final_state_json` is the state as exchanged between the parties.
    /// On success the channel adopts its balances and nonce and moves to
    /// `CLOSING`, opening the dispute window.
    pub fn initiate_closure(&self, channel_id: &str, final_state_json: &str) -> Result<Channel> {
        let channel = self.load_channel(channel_id)?;
        Self::require_status(&channel, ChannelStatus::Active)?;
        let state = ChannelState::from_json(final_state_json)?;
        let channel = self.adopt_signed_state(channel, &state, ChannelStatus::Closing)?;

        let mut writes = WriteSet::default();
        writes.stage(channel_key(channel_id), RecordKind::Channel, &channel)?;
        writes.commit(&self.store)?;
        info!(
            "channel {channel_id} closing at nonce {}, split {}/{}",
            channel.nonce, channel.balance1, channel.balance2
        );
        Ok(channel)
    }

    /// Settles a `CLOSING` channel once the dispute window has elapsed.
    ///
    /// The window runs for [`DISPUTE_PERIOD_SECS`] from the channel's
    /// creation time. Settlement writes one payout record per party,
    /// credits wallets where they exist, and moves the channel to
    /// `CLOSED`.
    pub fn finalize_closure(&self, channel_id: &str) -> Result<Channel> {
        let mut channel = self.load_channel(channel_id)?;
        Self::require_status(&channel, ChannelStatus::Closing)?;
        let now = self.store.current_timestamp();
        let until = channel.created_at.saturating_add(DISPUTE_PERIOD_SECS);
        if now < until {
            return Err(ChannelError::DisputeWindowOpen { until, now });
        }

        let (key1, key2) = settlement_keys(channel_id);
        let mut writes = WriteSet::default();
        writes.stage(
            key1.clone(),
            RecordKind::Settlement,
            &Settlement {
                channel_id: channel_id.to_string(),
                payer: channel.multi_sig_address.clone(),
                payee: channel.party1.address.clone(),
                amount: channel.balance1,
                settled_at: now,
            },
        )?;
        writes.stage(
            key2.clone(),
            RecordKind::Settlement,
            &Settlement {
                channel_id: channel_id.to_string(),
                payer: channel.multi_sig_address.clone(),
                payee: channel.party2.address.clone(),
                amount: channel.balance2,
                settled_at: now,
            },
        )?;
        self.credit_party_funds(&mut writes, &channel.party1.address, channel.balance1)?;
        self.credit_party_funds(&mut writes, &channel.party2.address, channel.balance2)?;

        channel.status = ChannelStatus::Closed;
        channel.closed_at = Some(now);
        channel.settlement_tx1 = Some(key1);
        channel.settlement_tx2 = Some(key2);
        writes.stage(channel_key(channel_id), RecordKind::Channel, &channel)?;
        writes.commit(&self.store)?;
        info!(
            "channel {channel_id} closed, settled {} to {} and {} to {}",
            channel.balance1, channel.party1.address, channel.balance2, channel.party2.address
        );
        Ok(channel)
    }

    /// Contests a `CLOSING` channel with a later mutually signed state.
    ///
    /// The state must carry a strictly higher nonce than the one the
    /// closure was initiated with. The channel adopts it and moves to
    /// `DISPUTED`, a terminal state resolved outside this crate.
    pub fn dispute(&self, channel_id: &str, disputed_state_json: &str) -> Result<Channel> {
        let channel = self.load_channel(channel_id)?;
        Self::require_status(&channel, ChannelStatus::Closing)?;
        let state = ChannelState::from_json(disputed_state_json)?;
        let previous_nonce = channel.nonce;
        let channel = self.adopt_signed_state(channel, &state, ChannelStatus::Disputed)?;

        let mut writes = WriteSet::default();
        writes.stage(channel_key(channel_id), RecordKind::Channel, &channel)?;
        writes.commit(&self.store)?;
        warn!(
            "channel {channel_id} disputed, nonce {} supersedes {previous_nonce}",
            channel.nonce
        );
        Ok(channel)
    }

    /// The current channel record.
    pub fn get(&self, channel_id: &str) -> Result<Channel> {
        self.load_channel(channel_id)
    }

    /// Every persisted revision of the channel, oldest first.
    pub fn history(&self, channel_id: &str) -> Result<Vec<ChannelRevision>> {
        let entries = self.store.history_of(&channel_key(channel_id))?;
        if entries.is_empty() {
            return Err(ChannelError::NotFound(channel_id.to_string()));
        }
        entries
            .into_iter()
            .map(|entry| {
                decode_record::<Channel>(&entry.value, RecordKind::Channel)
                    .map(|channel| ChannelRevision {
                        tx_id: entry.tx_id,
                        timestamp: entry.timestamp,
                        channel,
                    })
                    .map_err(|reason| ChannelError::Corrupt {
                        key: channel_key(channel_id),
                        reason,
                    })
            })
            .collect()
    }

    // ---- shared internals ----

    /// Loads and unwraps a record, `None` if the key was never written.
    pub(crate) fn load<T: DeserializeOwned>(&self, key: &str, kind: RecordKind) -> Result<Option<T>> {
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        decode_record(&bytes, kind)
            .map(Some)
            .map_err(|reason| ChannelError::Corrupt {
                key: key.to_string(),
                reason,
            })
    }

    pub(crate) fn load_channel(&self, channel_id: &str) -> Result<Channel> {
        self.load(&channel_key(channel_id), RecordKind::Channel)?
            .ok_or_else(|| ChannelError::NotFound(channel_id.to_string()))
    }

    pub(crate) fn require_status(channel: &Channel, required: ChannelStatus) -> Result<()> {
        if channel.status != required {
            return Err(ChannelError::InvalidState {
                id: channel.channel_id.clone(),
                required,
                actual: channel.status,
            });
        }
        Ok(())
    }

    /// Signature-level checks on a submitted candidate state.
    ///
    /// A state naming another channel cannot authorize this one, even if
    /// its signatures verify over its own content.
    pub(crate) fn verify_candidate(&self, channel: &Channel, state: &ChannelState) -> Result<()> {
        if state.channel_id != channel.channel_id {
            return Err(ChannelError::SignatureInvalid);
        }
        if !sig::validate_state(&self.secp, state, &channel.party1, &channel.party2) {
            return Err(ChannelError::SignatureInvalid);
        }
        Ok(())
    }

    /// The candidate must redistribute exactly the locked total.
    pub(crate) fn check_conservation(channel: &Channel, state: &ChannelState) -> Result<()> {
        let (Some(candidate), Some(locked)) = (state.total(), channel.locked_total()) else {
            return Err(ChannelError::FundingInvalid(
                "balance total overflows".into(),
            ));
        };
        if candidate != locked {
            return Err(ChannelError::FundingInvalid(format!(
                "candidate total {candidate} does not match the locked total {locked}"
            )));
        }
        Ok(())
    }

    /// Full validation of a state update, then adoption of its balances
    /// and nonce. Signatures are checked before anything else; a stale
    /// nonce is only reported for a properly signed state.
    fn adopt_signed_state(
        &self,
        mut channel: Channel,
        state: &ChannelState,
        next: ChannelStatus,
    ) -> Result<Channel> {
        self.verify_candidate(&channel, state)?;
        if state.nonce <= channel.nonce {
            return Err(ChannelError::StaleNonce {
                submitted: state.nonce,
                current: channel.nonce,
            });
        }
        Self::check_conservation(&channel, state)?;
        channel.balance1 = state.balance1;
        channel.balance2 = state.balance2;
        channel.nonce = state.nonce;
        channel.status = next;
        Ok(channel)
    }

    /// Debits `amount` from the wallet record of `address`, if one
    /// exists. A party without a wallet record is vouched for by the
    /// funding transaction instead.
    pub(crate) fn lock_party_funds(
        &self,
        writes: &mut WriteSet,
        address: &str,
        amount: u64,
    ) -> Result<()> {
        let key = wallet_key(address);
        let Some(mut wallet) = self.load::<Wallet>(&key, RecordKind::Wallet)? else {
            return Ok(());
        };
        if wallet.balance < amount {
            return Err(ChannelError::InsufficientFunds {
                address: address.to_string(),
                available: wallet.balance,
                required: amount,
            });
        }
        wallet.balance -= amount;
        writes.stage(key, RecordKind::Wallet, &wallet)
    }

    /// Credits `amount` back to the wallet record of `address`, if one
    /// exists.
    fn credit_party_funds(&self, writes: &mut WriteSet, address: &str, amount: u64) -> Result<()> {
        let key = wallet_key(address);
        let Some(mut wallet) = self.load::<Wallet>(&key, RecordKind::Wallet)? else {
            return Ok(());
        };
        wallet.balance = wallet.balance.checked_add(amount).ok_or_else(|| {
            ChannelError::FundingInvalid(format!("crediting {address} overflows its wallet"))
        })?;
        writes.stage(key, RecordKind::Wallet, &wallet)
    }
}

/// Writes staged during validation, flushed only after every check has
/// passed.
#[derive(Debug, Default)]
pub(crate) struct WriteSet {
    writes: Vec<(String, Vec<u8>)>,
}

impl WriteSet {
    pub(crate) fn stage<T: Serialize>(
        &mut self,
        key: String,
        kind: RecordKind,
        body: &T,
    ) -> Result<()> {
        let bytes = Record::seal(kind, body).encode()?;
        self.writes.push((key, bytes));
        Ok(())
    }

    pub(crate) fn commit<S: LedgerStore>(self, store: &S) -> Result<()> {
        for (key, bytes) in self.writes {
            store.put(&key, &bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fixture, fixture_with_config, Fixture, T0};

    #[test]
    fn propose_creates_a_proposed_channel() {
        let fx = fixture();
        let channel = fx.propose_default("c1");
        assert_eq!(channel.status, ChannelStatus::Proposed);
        assert_eq!(channel.nonce, 0);
        assert_eq!(channel.balance1, 100);
        assert_eq!(channel.balance2, 100);
        assert_eq!(channel.created_at, T0);
        assert!(channel.funding_tx_id.is_none());
        assert_eq!(fx.service.get("c1").unwrap(), channel);
    }

    #[test]
    fn propose_rejects_duplicate_ids() {
        let fx = fixture();
        fx.propose_default("c1");
        let err = fx
            .service
            .propose(
                "c1",
                fx.alice.address(),
                fx.alice.public_key_hex(),
                fx.bob.address(),
                fx.bob.public_key_hex(),
                1,
                1,
            )
            .unwrap_err();
        assert!(matches!(err, ChannelError::AlreadyExists(id) if id == "c1"));
    }

    #[test]
    fn propose_rejects_malformed_addresses() {
        let fx = fixture();
        let err = fx
            .service
            .propose(
                "c1",
                "not-an-address-0OIl",
                fx.alice.public_key_hex(),
                fx.bob.address(),
                fx.bob.public_key_hex(),
                100,
                100,
            )
            .unwrap_err();
        assert!(matches!(err, ChannelError::Codec(_)));
    }

    #[test]
    fn propose_rejects_one_party_on_both_sides() {
        let fx = fixture();
        fx.seed_wallet(fx.alice.address(), 150);
        let err = fx
            .service
            .propose(
                "c1",
                fx.alice.address(),
                fx.alice.public_key_hex(),
                fx.alice.address(),
                fx.alice.public_key_hex(),
                100,
                100,
            )
            .unwrap_err();
        assert!(matches!(err, ChannelError::FundingInvalid(_)));
        assert_eq!(fx.wallet_balance(fx.alice.address()), Some(150));
        assert!(matches!(
            fx.service.get("c1").unwrap_err(),
            ChannelError::NotFound(_)
        ));
    }

    #[test]
    fn propose_joint_address_is_order_independent() {
        let fx = fixture();
        let a = fx.propose_default("c1");
        let b = fx
            .service
            .propose(
                "c2",
                fx.bob.address(),
                fx.bob.public_key_hex(),
                fx.alice.address(),
                fx.alice.public_key_hex(),
                100,
                100,
            )
            .unwrap();
        assert_eq!(a.multi_sig_address, b.multi_sig_address);
    }

    #[test]
    fn propose_debits_wallets_up_front() {
        let fx = fixture();
        fx.seed_wallet(fx.alice.address(), 150);
        fx.seed_wallet(fx.bob.address(), 100);
        fx.propose_default("c1");
        assert_eq!(fx.wallet_balance(fx.alice.address()), Some(50));
        assert_eq!(fx.wallet_balance(fx.bob.address()), Some(0));
    }

    #[test]
    fn propose_fails_on_insufficient_wallet_funds() {
        let fx = fixture();
        fx.seed_wallet(fx.alice.address(), 99);
        let err = fx
            .service
            .propose(
                "c1",
                fx.alice.address(),
                fx.alice.public_key_hex(),
                fx.bob.address(),
                fx.bob.public_key_hex(),
                100,
                100,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::InsufficientFunds {
                available: 99,
                required: 100,
                ..
            }
        ));
        // Nothing was written: no channel, wallet untouched.
        assert!(matches!(
            fx.service.get("c1").unwrap_err(),
            ChannelError::NotFound(_)
        ));
        assert_eq!(fx.wallet_balance(fx.alice.address()), Some(99));
    }

    #[test]
    fn propose_without_wallet_records_skips_the_debit() {
        let fx = fixture();
        fx.propose_default("c1");
        assert_eq!(fx.wallet_balance(fx.alice.address()), None);
    }

    #[test]
    fn lock_on_activate_defers_the_debit() {
        let fx = fixture_with_config(ServiceConfig {
            lock_policy: LockPolicy::OnActivate,
        });
        fx.seed_wallet(fx.alice.address(), 150);
        let channel = fx.propose_default("c1");
        assert_eq!(fx.wallet_balance(fx.alice.address()), Some(150));
        fx.seed_funding("f1", &channel.multi_sig_address, 200, FundingStatus::Confirmed);
        fx.service.activate("c1", "f1").unwrap();
        assert_eq!(fx.wallet_balance(fx.alice.address()), Some(50));
    }

    #[test]
    fn activate_moves_the_channel_to_active() {
        let fx = fixture();
        let channel = fx.propose_default("c1");
        fx.seed_funding("f1", &channel.multi_sig_address, 200, FundingStatus::Confirmed);
        let active = fx.service.activate("c1", "f1").unwrap();
        assert_eq!(active.status, ChannelStatus::Active);
        assert_eq!(active.funding_tx_id.as_deref(), Some("f1"));
    }

    #[test]
    fn activate_requires_a_proposed_channel() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        let err = fx.service.activate("c1", "f1").unwrap_err();
        assert!(matches!(
            err,
            ChannelError::InvalidState {
                required: ChannelStatus::Proposed,
                actual: ChannelStatus::Active,
                ..
            }
        ));
    }

    #[test]
    fn activate_rejects_missing_funding() {
        let fx = fixture();
        fx.propose_default("c1");
        let err = fx.service.activate("c1", "nope").unwrap_err();
        assert!(matches!(err, ChannelError::FundingInvalid(_)));
    }

    #[test]
    fn activate_rejects_wrong_recipient() {
        let fx = fixture();
        fx.propose_default("c1");
        fx.seed_funding("f1", "somewhere-else", 200, FundingStatus::Confirmed);
        let err = fx.service.activate("c1", "f1").unwrap_err();
        assert!(matches!(err, ChannelError::FundingInvalid(_)));
    }

    #[test]
    fn activate_rejects_underfunding_but_accepts_overfunding() {
        let fx = fixture();
        let channel = fx.propose_default("c1");
        fx.seed_funding("low", &channel.multi_sig_address, 199, FundingStatus::Confirmed);
        assert!(matches!(
            fx.service.activate("c1", "low").unwrap_err(),
            ChannelError::FundingInvalid(_)
        ));
        fx.seed_funding("high", &channel.multi_sig_address, 500, FundingStatus::Confirmed);
        assert!(fx.service.activate("c1", "high").is_ok());
    }

    #[test]
    fn activate_rejects_unconfirmed_funding() {
        let fx = fixture();
        let channel = fx.propose_default("c1");
        fx.seed_funding("f1", &channel.multi_sig_address, 200, FundingStatus::Pending);
        assert!(matches!(
            fx.service.activate("c1", "f1").unwrap_err(),
            ChannelError::FundingInvalid(_)
        ));
        fx.seed_funding("f2", &channel.multi_sig_address, 200, FundingStatus::Failed);
        assert!(matches!(
            fx.service.activate("c1", "f2").unwrap_err(),
            ChannelError::FundingInvalid(_)
        ));
    }

    #[test]
    fn initiate_closure_adopts_the_signed_state() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        let state = fx.signed_state_json("c1", 60, 140, 5);
        let closing = fx.service.initiate_closure("c1", &state).unwrap();
        assert_eq!(closing.status, ChannelStatus::Closing);
        assert_eq!(closing.balance1, 60);
        assert_eq!(closing.balance2, 140);
        assert_eq!(closing.nonce, 5);
    }

    #[test]
    fn initiate_closure_requires_active() {
        let fx = fixture();
        fx.propose_default("c1");
        let state = fx.signed_state_json("c1", 60, 140, 5);
        let err = fx.service.initiate_closure("c1", &state).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::InvalidState {
                required: ChannelStatus::Active,
                actual: ChannelStatus::Proposed,
                ..
            }
        ));
    }

    #[test]
    fn initiate_closure_rejects_bad_signatures_before_nonce() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        // Nonce 0 would be stale, but the tampered signature must win.
        let mut state: ChannelState =
            serde_json::from_str(&fx.signed_state_json("c1", 60, 140, 0)).unwrap();
        state.balance1 = 61;
        state.balance2 = 139;
        let json = serde_json::to_string(&state).unwrap();
        assert!(matches!(
            fx.service.initiate_closure("c1", &json).unwrap_err(),
            ChannelError::SignatureInvalid
        ));
    }

    #[test]
    fn initiate_closure_rejects_stale_nonce() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        let state = fx.signed_state_json("c1", 60, 140, 0);
        assert!(matches!(
            fx.service.initiate_closure("c1", &state).unwrap_err(),
            ChannelError::StaleNonce {
                submitted: 0,
                current: 0
            }
        ));
    }

    #[test]
    fn initiate_closure_rejects_unbalanced_totals() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        let state = fx.signed_state_json("c1", 60, 141, 5);
        assert!(matches!(
            fx.service.initiate_closure("c1", &state).unwrap_err(),
            ChannelError::FundingInvalid(_)
        ));
    }

    #[test]
    fn initiate_closure_rejects_states_for_another_channel() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        let foreign = fx.signed_state_json("c2", 60, 140, 5);
        assert!(matches!(
            fx.service.initiate_closure("c1", &foreign).unwrap_err(),
            ChannelError::SignatureInvalid
        ));
    }

    #[test]
    fn initiate_closure_rejects_malformed_json() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        assert!(matches!(
            fx.service.initiate_closure("c1", "{oops").unwrap_err(),
            ChannelError::Codec(_)
        ));
    }

    #[test]
    fn finalize_closure_waits_out_the_dispute_window() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        let state = fx.signed_state_json("c1", 60, 140, 5);
        fx.service.initiate_closure("c1", &state).unwrap();

        let err = fx.service.finalize_closure("c1").unwrap_err();
        assert!(matches!(
            err,
            ChannelError::DisputeWindowOpen { until, now }
                if until == T0 + DISPUTE_PERIOD_SECS && now == T0
        ));

        // One second short of the window edge still fails.
        fx.service
            .store()
            .set_time(T0 + DISPUTE_PERIOD_SECS - 1);
        assert!(matches!(
            fx.service.finalize_closure("c1").unwrap_err(),
            ChannelError::DisputeWindowOpen { .. }
        ));

        fx.service.store().set_time(T0 + DISPUTE_PERIOD_SECS);
        let closed = fx.service.finalize_closure("c1").unwrap();
        assert_eq!(closed.status, ChannelStatus::Closed);
        assert_eq!(closed.closed_at, Some(T0 + DISPUTE_PERIOD_SECS));
        assert_eq!(closed.settlement_tx1.as_deref(), Some("c1_settlement1"));
        assert_eq!(closed.settlement_tx2.as_deref(), Some("c1_settlement2"));
    }

    #[test]
    fn finalize_closure_writes_settlements_and_credits_wallets() {
        let fx = fixture();
        fx.seed_wallet(fx.alice.address(), 100);
        fx.seed_wallet(fx.bob.address(), 100);
        fx.open_default("c1", "f1");
        let state = fx.signed_state_json("c1", 60, 140, 5);
        fx.service.initiate_closure("c1", &state).unwrap();
        fx.service.store().advance_time(DISPUTE_PERIOD_SECS);
        let closed = fx.service.finalize_closure("c1").unwrap();

        // Debited 100 each at propose, credited the final split back.
        assert_eq!(fx.wallet_balance(fx.alice.address()), Some(60));
        assert_eq!(fx.wallet_balance(fx.bob.address()), Some(140));

        let (key1, _) = settlement_keys("c1");
        let bytes = fx.service.store().get(&key1).unwrap().unwrap();
        let settlement: Settlement = decode_record(&bytes, RecordKind::Settlement).unwrap();
        assert_eq!(settlement.payer, closed.multi_sig_address);
        assert_eq!(settlement.payee, fx.alice.address());
        assert_eq!(settlement.amount, 60);
        assert_eq!(settlement.settled_at, T0 + DISPUTE_PERIOD_SECS);
    }

    #[test]
    fn finalize_closure_requires_closing() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        fx.service.store().advance_time(DISPUTE_PERIOD_SECS);
        assert!(matches!(
            fx.service.finalize_closure("c1").unwrap_err(),
            ChannelError::InvalidState {
                required: ChannelStatus::Closing,
                ..
            }
        ));
    }

    #[test]
    fn dispute_supersedes_the_closing_state() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        let close_state = fx.signed_state_json("c1", 60, 140, 5);
        fx.service.initiate_closure("c1", &close_state).unwrap();

        let later = fx.signed_state_json("c1", 150, 50, 6);
        let disputed = fx.service.dispute("c1", &later).unwrap();
        assert_eq!(disputed.status, ChannelStatus::Disputed);
        assert_eq!(disputed.balance1, 150);
        assert_eq!(disputed.balance2, 50);
        assert_eq!(disputed.nonce, 6);
    }

    #[test]
    fn dispute_rejects_equal_or_lower_nonce() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        fx.service
            .initiate_closure("c1", &fx.signed_state_json("c1", 60, 140, 5))
            .unwrap();
        let same = fx.signed_state_json("c1", 150, 50, 5);
        assert!(matches!(
            fx.service.dispute("c1", &same).unwrap_err(),
            ChannelError::StaleNonce {
                submitted: 5,
                current: 5
            }
        ));
    }

    #[test]
    fn dispute_requires_closing() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        let state = fx.signed_state_json("c1", 60, 140, 5);
        assert!(matches!(
            fx.service.dispute("c1", &state).unwrap_err(),
            ChannelError::InvalidState {
                required: ChannelStatus::Closing,
                actual: ChannelStatus::Active,
                ..
            }
        ));
    }

    #[test]
    fn disputed_channels_cannot_be_finalized() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        fx.service
            .initiate_closure("c1", &fx.signed_state_json("c1", 60, 140, 5))
            .unwrap();
        fx.service
            .dispute("c1", &fx.signed_state_json("c1", 150, 50, 6))
            .unwrap();
        fx.service.store().advance_time(DISPUTE_PERIOD_SECS);
        assert!(matches!(
            fx.service.finalize_closure("c1").unwrap_err(),
            ChannelError::InvalidState {
                required: ChannelStatus::Closing,
                actual: ChannelStatus::Disputed,
                ..
            }
        ));
    }

    #[test]
    fn get_unknown_channel_is_not_found() {
        let fx = fixture();
        assert!(matches!(
            fx.service.get("nope").unwrap_err(),
            ChannelError::NotFound(id) if id == "nope"
        ));
    }

    #[test]
    fn get_surfaces_corrupt_records() {
        let fx = fixture();
        fx.service.store().put("c1", b"{\"kind\":\"wallet\",\"schema\":1}").unwrap();
        assert!(matches!(
            fx.service.get("c1").unwrap_err(),
            ChannelError::Corrupt { key, .. } if key == "c1"
        ));
    }

    #[test]
    fn history_tracks_the_lifecycle() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        fx.service
            .initiate_closure("c1", &fx.signed_state_json("c1", 60, 140, 5))
            .unwrap();
        let history = fx.service.history("c1").unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].channel.status, ChannelStatus::Proposed);
        assert_eq!(history[1].channel.status, ChannelStatus::Active);
        assert_eq!(history[2].channel.status, ChannelStatus::Closing);
        assert_eq!(history[2].channel.nonce, 5);
    }

    #[test]
    fn history_of_unknown_channel_is_not_found() {
        let fx = fixture();
        assert!(matches!(
            fx.service.history("nope").unwrap_err(),
            ChannelError::NotFound(_)
        ));
    }

    #[test]
    fn history_surfaces_corrupt_revisions() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        // Healthy revisions do not excuse an undecodable one.
        fx.service.store().put("c1", b"{\"kind\":\"wallet\",\"schema\":1}").unwrap();
        assert!(matches!(
            fx.service.history("c1").unwrap_err(),
            ChannelError::Corrupt { key, .. } if key == "c1"
        ));
    }

    #[test]
    fn two_services_over_one_store_agree() {
        let fx = fixture();
        fx.open_default("c1", "f1");
        // A second instance over the same store sees the channel; the
        // service itself holds nothing.
        let Fixture { service, .. } = fx;
        let view = ChannelService::new(service.store);
        assert_eq!(view.get("c1").unwrap().status, ChannelStatus::Active);
    }

    #[test]
    fn wallet_records_survive_as_wallet_kind() {
        let fx = fixture();
        fx.seed_wallet(fx.alice.address(), 100);
        fx.propose_default("c1");
        let bytes = fx
            .service
            .store()
            .get(&wallet_key(fx.alice.address()))
            .unwrap()
            .unwrap();
        let wallet: Wallet = decode_record(&bytes, RecordKind::Wallet).unwrap();
        assert_eq!(wallet.balance, 0);
    }
}
