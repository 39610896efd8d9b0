//! Protocol engine error types.

use thiserror::Error;

use crate::frames::FrameKind;

/// Errors from counter bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    /// Adoption requested for counters that do not strictly exceed local state.
    #[error(
        "stale counters: epoch {epoch} sequence {sequence} does not exceed local epoch {local_epoch} sequence {local_sequence}"
    )]
    Stale {
        /// Received epoch.
        epoch: u64,
        /// Received sequence.
        sequence: u16,
        /// Local epoch at the time of the check.
        local_epoch: u64,
        /// Local sequence at the time of the check.
        local_sequence: u16,
    },
}

/// Errors from node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The bus collaborator rejected a frame on every allowed attempt.
    #[error("transmit failed for {kind} frame after {attempts} attempt(s): {reason}")]
    Transmit {
        /// Which frame of the exchange failed.
        kind: FrameKind,
        /// Attempts made before giving up.
        attempts: u32,
        /// Collaborator's description of the last failure.
        reason: String,
    },

    /// Counter bookkeeping rejected an update.
    #[error("counter error: {0}")]
    Counter(#[from] CounterError),
}

impl NodeError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Every protocol failure is local and recovers through resync, so no
    /// variant is fatal. A dropped pair leaves the peer without a completable
    /// validation for that cycle only.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transmit { .. } | Self::Counter(_) => false,
        }
    }
}
