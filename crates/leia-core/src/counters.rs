//! Counter and epoch management.
//!
//! `advance` and `adopt` are the only ways counters move at runtime. Both
//! rederive the session key before returning whenever the epoch changed.

use leia_crypto::IntegrityFunction;

use crate::{error::CounterError, session::SessionState};

/// Outcome of [`SessionState::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Sequence incremented within the current epoch.
    Sequence {
        /// New sequence value.
        sequence: u16,
    },
    /// Sequence overflowed: epoch moved on and the session key was rederived.
    EpochRolled {
        /// New epoch value.
        epoch: u64,
    },
}

impl<M: IntegrityFunction> SessionState<M> {
    /// Step the counters once.
    ///
    /// At `sequence == 0xFFFF` the sequence resets and the epoch advances
    /// (wrapping to 0 at `u64::MAX`), with a new session key. Otherwise only
    /// the sequence increments.
    pub fn advance(&mut self) -> Advance {
        if self.sequence == u16::MAX {
            self.begin_epoch();
            Advance::EpochRolled { epoch: self.epoch }
        } else {
            self.sequence += 1;
            Advance::Sequence { sequence: self.sequence }
        }
    }

    /// Replay and ordering guard: true iff the pair strictly exceeds local
    /// state in (epoch, sequence) order.
    pub fn is_fresh(&self, epoch: u64, sequence: u16) -> bool {
        epoch > self.epoch || (epoch == self.epoch && sequence > self.sequence)
    }

    /// Take over the peer's counters and rederive the session key.
    ///
    /// Refuses pairs that are not fresh, so local counters never move
    /// backwards.
    pub fn adopt(&mut self, epoch: u64, sequence: u16) -> Result<(), CounterError> {
        if !self.is_fresh(epoch, sequence) {
            return Err(CounterError::Stale {
                epoch,
                sequence,
                local_epoch: self.epoch,
                local_sequence: self.sequence,
            });
        }

        self.epoch = epoch;
        self.sequence = sequence;
        self.rederive();
        Ok(())
    }
}
