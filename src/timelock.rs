//! Timelocked candidate states.
//!
//! A party that cannot get its counterparty to cooperate parks a fully
//! signed state behind a timelock. Once the ledger clock passes it, the
//! state can be forced onto the channel unilaterally. Submission does the
//! expensive validation; execution only checks the clock, trusting what
//! was checked on the way in.

use log::{info, warn};

use crate::channel::{Channel, ChannelState, ChannelStatus, RecordKind, TimeLockState};
use crate::error::{ChannelError, Result};
use crate::service::{ChannelService, WriteSet};
use crate::store::{channel_key, timelock_key, LedgerStore};

impl<S: LedgerStore> ChannelService<S> {
    /// Parks a fully signed candidate state behind `timelock` (absolute
    /// ledger seconds).
    ///
    /// The channel must be `ACTIVE` and the state must carry two valid
    /// signatures over the locked total. One pending state per nonce: a
    /// second submission for the same nonce fails with
    /// [`ChannelError::AlreadyExists`] until the first has been executed.
    pub fn submit_timelock(
        &self,
        channel_id: &str,
        state_json: &str,
        timelock: u64,
    ) -> Result<TimeLockState> {
        let channel = self.load_channel(channel_id)?;
        Self::require_status(&channel, ChannelStatus::Active)?;
        let state = ChannelState::from_json(state_json)?;
        self.verify_candidate(&channel, &state)?;
        Self::check_conservation(&channel, &state)?;

        let key = timelock_key(channel_id, state.nonce);
        if let Some(pending) = self.load::<TimeLockState>(&key, RecordKind::Timelock)? {
            // An executed record has been consumed; its key is free again.
            if !pending.executed {
                return Err(ChannelError::AlreadyExists(key));
            }
        }

        let submitted_by = if !state.signature1.is_empty() {
            channel.party1.address.clone()
        } else {
            channel.party2.address.clone()
        };
        let pending = TimeLockState {
            channel_id: channel_id.to_string(),
            sequence: state.nonce,
            state,
            timelock,
            submitted_by,
            executed: false,
        };
        let mut writes = WriteSet::default();
        writes.stage(key, RecordKind::Timelock, &pending)?;
        writes.commit(&self.store)?;
        info!(
            "channel {channel_id} candidate nonce {} parked until {timelock}",
            pending.sequence
        );
        Ok(pending)
    }

    /// Forces a pending state onto the channel once its timelock has
    /// passed.
    ///
    /// Consumes the record: a second execution of the same nonce reports
    /// [`ChannelError::NotFound`]. The channel keeps whatever status it
    /// has; only balances and nonce are overwritten.
    pub fn execute_timelock(&self, channel_id: &str, nonce: u64) -> Result<Channel> {
        let mut channel = self.load_channel(channel_id)?;
        let key = timelock_key(channel_id, nonce);
        let mut pending = self
            .load::<TimeLockState>(&key, RecordKind::Timelock)?
            .filter(|p| !p.executed)
            .ok_or_else(|| ChannelError::NotFound(key.clone()))?;
        let now = self.store.current_timestamp();
        if now < pending.timelock {
            return Err(ChannelError::TimelockNotExpired {
                unlock_at: pending.timelock,
                now,
            });
        }

        channel.balance1 = pending.state.balance1;
        channel.balance2 = pending.state.balance2;
        channel.nonce = pending.state.nonce;
        pending.executed = true;

        let mut writes = WriteSet::default();
        writes.stage(channel_key(channel_id), RecordKind::Channel, &channel)?;
        writes.stage(key, RecordKind::Timelock, &pending)?;
        writes.commit(&self.store)?;
        warn!(
            "channel {channel_id} forced to nonce {} by {}",
            channel.nonce, pending.submitted_by
        );
        Ok(channel)
    }
}
