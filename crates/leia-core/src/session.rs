//! Per-node session state.
//!
//! One `SessionState` serves both roles of a node: the counters that stamp
//! outgoing pairs are the same counters that judge the peer's freshness.
//!
//! # Invariants
//!
//! - `session_key == derive(shared_key, epoch)` after every public method
//!   returns. Epoch changes and rederivation happen inside one `&mut self`
//!   call, so no other operation can observe them apart.
//! - `shared_key` and the channel ids never change after construction.

use std::fmt;

use leia_crypto::IntegrityFunction;

use crate::config::{Channels, NodeConfig};

/// Authoritative protocol state of one node.
///
/// # Security
///
/// - **Debug Redaction**: the `Debug` impl hides `shared_key` and
///   `session_key`.
#[derive(Clone)]
pub struct SessionState<M: IntegrityFunction> {
    pub(crate) channels: Channels,
    pub(crate) shared_key: u64,
    pub(crate) epoch: u64,
    pub(crate) session_key: u64,
    pub(crate) sequence: u16,
    pub(crate) pending_data: u64,
    pub(crate) mac: M,
}

impl<M: IntegrityFunction> SessionState<M> {
    /// Fresh state: `epoch = 0`, `sequence = 0`, payload from `config`.
    pub fn new(config: &NodeConfig, mac: M) -> Self {
        let session_key = mac.derive_session_key(config.shared_key, 0);
        Self {
            channels: config.channels,
            shared_key: config.shared_key,
            epoch: 0,
            session_key,
            sequence: 0,
            pending_data: config.initial_data,
            mac,
        }
    }

    /// Session key generation: move to the next epoch (wrapping to 0 at
    /// `u64::MAX`), reset the sequence and rederive the session key.
    pub fn begin_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.sequence = 0;
        self.rederive();
    }

    /// Configured channel identifiers.
    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current sequence within the epoch.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Current session key.
    pub fn session_key(&self) -> u64 {
        self.session_key
    }

    /// Last outgoing payload.
    pub fn pending_data(&self) -> u64 {
        self.pending_data
    }

    /// Integrity function in use.
    pub fn mac(&self) -> &M {
        &self.mac
    }

    /// Set the payload for the next transmission.
    pub fn set_pending_data(&mut self, data: u64) {
        self.pending_data = data;
    }

    /// Session key that belongs to `epoch` under this node's shared key.
    pub fn session_key_for(&self, epoch: u64) -> u64 {
        self.mac.derive_session_key(self.shared_key, epoch)
    }

    /// Check the derivation invariant.
    pub fn is_consistent(&self) -> bool {
        self.session_key == self.session_key_for(self.epoch)
    }

    pub(crate) fn rederive(&mut self) {
        self.session_key = self.session_key_for(self.epoch);
    }
}

impl<M: IntegrityFunction> fmt::Debug for SessionState<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("channels", &self.channels)
            .field("shared_key", &"<redacted>")
            .field("epoch", &self.epoch)
            .field("session_key", &"<redacted>")
            .field("sequence", &self.sequence)
            .field("pending_data", &self.pending_data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use leia_crypto::{AdditiveMac, HmacSha256Mac};

    use super::*;

    #[test]
    fn init_then_first_session_key() {
        let mut session = SessionState::new(&NodeConfig::reference(), AdditiveMac);
        assert_eq!(session.epoch(), 0);
        assert_eq!(session.sequence(), 0);
        assert!(session.is_consistent());

        session.begin_epoch();
        assert_eq!(session.epoch(), 1);
        assert_eq!(session.session_key(), 11);
        assert_eq!(session.sequence(), 0);
        assert_eq!(session.pending_data(), 0x55);
    }

    #[test]
    fn begin_epoch_wraps_at_max() {
        let mut session = SessionState::new(&NodeConfig::reference(), AdditiveMac);
        session.epoch = u64::MAX;
        session.sequence = 42;
        session.rederive();

        session.begin_epoch();
        assert_eq!(session.epoch(), 0);
        assert_eq!(session.sequence(), 0);
        assert_eq!(session.session_key(), 10);
    }

    #[test]
    fn strong_mac_keeps_invariant() {
        let mut session = SessionState::new(&NodeConfig::reference(), HmacSha256Mac);
        session.begin_epoch();
        assert!(session.is_consistent());
        assert_ne!(session.session_key(), 11);
    }

    #[test]
    fn debug_redacts_keys() {
        let session = SessionState::new(&NodeConfig::reference(), AdditiveMac);
        let debug = format!("{session:?}");

        assert!(debug.contains("epoch: 0"));
        assert!(!debug.contains("session_key: 10"));
        assert!(!debug.contains("shared_key: 10"));
    }
}
