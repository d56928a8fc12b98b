//! Shared fixtures for the in-crate tests.

use rand::rngs::StdRng;
use rand::SeedableRng;
use secp256k1::{All, Secp256k1};

use crate::channel::{
    decode_record, Channel, ChannelState, FundingStatus, FundingTx, Record, RecordKind, Wallet,
};
use crate::service::{ChannelService, ServiceConfig};
use crate::sig::Keypair;
use crate::store::{wallet_key, LedgerStore, MemoryLedger};

/// Ledger epoch all fixtures start at.
pub(crate) const T0: u64 = 1_700_000_000;

pub(crate) struct Fixture {
    pub(crate) secp: Secp256k1<All>,
    pub(crate) service: ChannelService<MemoryLedger>,
    pub(crate) alice: Keypair,
    pub(crate) bob: Keypair,
}

pub(crate) fn fixture() -> Fixture {
    fixture_with_config(ServiceConfig::default())
}

pub(crate) fn fixture_with_config(config: ServiceConfig) -> Fixture {
    let secp = Secp256k1::new();
    let mut rng = StdRng::seed_from_u64(42);
    let alice = Keypair::random(&secp, &mut rng);
    let bob = Keypair::random(&secp, &mut rng);
    let service = ChannelService::with_config(MemoryLedger::starting_at(T0), config);
    Fixture {
        secp,
        service,
        alice,
        bob,
    }
}

impl Fixture {
    /// Writes a wallet record for `address`.
    pub(crate) fn seed_wallet(&self, address: &str, balance: u64) {
        let wallet = Wallet {
            address: address.to_string(),
            balance,
        };
        let bytes = Record::seal(RecordKind::Wallet, wallet).encode().unwrap();
        self.service
            .store()
            .put(&wallet_key(address), &bytes)
            .unwrap();
    }

    /// Current wallet balance of `address`, `None` without a record.
    pub(crate) fn wallet_balance(&self, address: &str) -> Option<u64> {
        let bytes = self.service.store().get(&wallet_key(address)).unwrap()?;
        let wallet: Wallet = decode_record(&bytes, RecordKind::Wallet).unwrap();
        Some(wallet.balance)
    }

    /// Writes a funding transaction record under its id.
    pub(crate) fn seed_funding(
        &self,
        tx_id: &str,
        recipient: &str,
        amount: u64,
        status: FundingStatus,
    ) {
        let tx = FundingTx {
            tx_id: tx_id.to_string(),
            recipient: recipient.to_string(),
            amount,
            status,
        };
        let bytes = Record::seal(RecordKind::Funding, tx).encode().unwrap();
        self.service.store().put(tx_id, &bytes).unwrap();
    }

    /// A state signed by both fixture parties, as the JSON the API takes.
    pub(crate) fn signed_state_json(
        &self,
        channel_id: &str,
        balance1: u64,
        balance2: u64,
        nonce: u64,
    ) -> String {
        let mut state = ChannelState::unsigned(channel_id, balance1, balance2, nonce);
        state.signature1 = self.alice.sign_state(&self.secp, &state).unwrap();
        state.signature2 = self.bob.sign_state(&self.secp, &state).unwrap();
        serde_json::to_string(&state).unwrap()
    }

    /// Proposes `channel_id` between the fixture parties with a 100/100
    /// split.
    pub(crate) fn propose_default(&self, channel_id: &str) -> Channel {
        self.service
            .propose(
                channel_id,
                self.alice.address(),
                self.alice.public_key_hex(),
                self.bob.address(),
                self.bob.public_key_hex(),
                100,
                100,
            )
            .unwrap()
    }

    /// Proposes and activates `channel_id` with a confirmed funding
    /// transaction covering the full 200.
    pub(crate) fn open_default(&self, channel_id: &str, funding_tx: &str) -> Channel {
        let channel = self.propose_default(channel_id);
        self.seed_funding(
            funding_tx,
            &channel.multi_sig_address,
            200,
            FundingStatus::Confirmed,
        );
        self.service.activate(channel_id, funding_tx).unwrap()
    }
}
