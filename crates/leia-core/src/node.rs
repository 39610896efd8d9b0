//! Protocol state machine.
//!
//! A `Node` plays both roles of the exchange. As a sender it stamps and tags
//! data pairs; as a receiver it validates the peer's pairs and drives the
//! resync handshake when validation fails.
//!
//! # States
//!
//! ```text
//!               Auth-Fail                  advance, Epoch, EpochMac
//!   NORMAL ──────────────────► RESYNC_SENDING ──────────────────► NORMAL
//!
//!               EpochMac                   tag, freshness, adopt
//!   NORMAL ──────────────────► RESYNC_VALIDATING ───────────────► NORMAL
//! ```
//!
//! Both resync states are left before the triggering call returns; no
//! acknowledgement is ever awaited. Between calls the node is always in
//! NORMAL.
//!
//! # Invariants
//!
//! - Each call runs to completion: decode, dispatch and any reaction frames
//!   happen inside one `&mut self` borrow
//! - Local counters only move through `advance` and `adopt`
//! - A Mac frame is only ever sent after its Data frame was accepted by the bus

use leia_crypto::{AdditiveMac, IntegrityFunction, tags_equal};
use leia_proto::{BaseId, Command, Frame};
use tracing::{debug, info, trace, warn};

use crate::{
    bus::CanBus,
    config::{NodeConfig, TransmitPolicy},
    counters::Advance,
    error::NodeError,
    frames::{self, FrameKind, Inbound},
    session::SessionState,
};

/// Protocol states, used to label log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Steady state.
    Normal,
    /// Answering an Auth-Fail with an epoch announcement.
    ResyncSending,
    /// Checking a received epoch announcement.
    ResyncValidating,
}

/// Inputs to [`Node::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// Application wants `data` authenticated and sent.
    Submit {
        /// Payload value.
        data: u64,
    },
    /// The bus delivered a frame.
    FrameReceived(Frame),
}

/// Why an Auth-Fail notification was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailReason {
    /// Mac tag did not match the pending Data frame.
    MacMismatch,
    /// Mac frame arrived with no matching Data frame.
    MissingData,
    /// EpochMac tag did not match the pending Epoch frame.
    EpochMacMismatch,
    /// EpochMac frame arrived with no matching Epoch frame.
    MissingEpoch,
    /// Announced counters do not exceed local state.
    Stale {
        /// Announced epoch.
        epoch: u64,
        /// Announced sequence.
        sequence: u16,
    },
}

/// Observable outcomes of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    /// A Data + Mac pair went out.
    PairSent {
        /// Epoch the pair was tagged under.
        epoch: u64,
        /// Sequence stamped into both identifiers.
        sequence: u16,
    },
    /// A peer message passed validation.
    MessageAccepted {
        /// Payload value.
        data: u64,
        /// Peer's sequence.
        sequence: u16,
    },
    /// An Auth-Fail notification went out.
    AuthFailSent {
        /// What failed.
        reason: AuthFailReason,
    },
    /// An Epoch + EpochMac pair went out in answer to an Auth-Fail.
    EpochAnnounced {
        /// Announced epoch.
        epoch: u64,
        /// Announced sequence.
        sequence: u16,
    },
    /// Local counters were replaced by the peer's announced ones.
    Resynchronized {
        /// Adopted epoch.
        epoch: u64,
        /// Adopted sequence.
        sequence: u16,
    },
    /// A frame on our channels had an out-of-place command; counters advanced.
    Unclassified {
        /// Channel it arrived on.
        base: BaseId,
        /// Command it carried.
        command: Command,
    },
}

/// Running totals, for monitoring and test oracles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Data + Mac pairs fully sent.
    pub pairs_sent: u64,
    /// Peer messages accepted.
    pub messages_accepted: u64,
    /// Auth-Fail notifications sent.
    pub auth_fails_sent: u64,
    /// Auth-Fail notifications received.
    pub auth_fails_received: u64,
    /// Epoch announcements fully sent.
    pub epochs_announced: u64,
    /// Announcements adopted.
    pub resyncs: u64,
    /// Frames abandoned after exhausting the transmit policy.
    pub transmit_failures: u64,
    /// Frames absorbed as unclassified.
    pub unclassified: u64,
}

/// Receive-side state carried from the first to the second frame of a pair.
///
/// Each variant holds exactly the fields its frame type defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Idle,
    Data { sequence: u16, data: u64, expected_tag: u64 },
    Epoch { sequence: u16, epoch: u64, expected_tag: u64 },
}

/// LeiA protocol node.
///
/// Pure state machine over a caller-supplied [`CanBus`]. Exclusive access per
/// call is enforced by `&mut self`; callers delivering frames from interrupt
/// context must serialize through a single owner (a queue or a mutex).
///
/// # Type Parameters
///
/// - `M`: keyed integrity function, [`AdditiveMac`] by default
///
/// # Replays
///
/// A matched Data + Mac pair is accepted without a freshness check. A pair
/// replayed verbatim within the same epoch validates again and advances the
/// receiver. Replays are only rejected once the epoch has moved on, because
/// the session key no longer matches. Freshness is enforced on epoch
/// announcements alone.
#[derive(Debug, Clone)]
pub struct Node<M: IntegrityFunction = AdditiveMac> {
    session: SessionState<M>,
    pending: Pending,
    policy: TransmitPolicy,
    stats: NodeStats,
}

impl<M: IntegrityFunction> Node<M> {
    /// Initialize state and generate the first session key.
    ///
    /// The node starts at `epoch = 1`, `sequence = 0`.
    pub fn new(config: &NodeConfig, mac: M) -> Self {
        let mut session = SessionState::new(config, mac);
        session.begin_epoch();

        debug!(epoch = session.epoch(), "node initialized");

        Self {
            session,
            pending: Pending::Idle,
            policy: config.transmit_policy,
            stats: NodeStats::default(),
        }
    }

    /// Session state (read-only).
    pub fn session(&self) -> &SessionState<M> {
        &self.session
    }

    /// Mutable session state, for provisioning counters out of band.
    pub fn session_mut(&mut self) -> &mut SessionState<M> {
        &mut self.session
    }

    /// Running totals.
    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Returns `NodeError` if a frame could not be transmitted. Local state is
    /// consistent either way.
    pub fn handle<B: CanBus>(
        &mut self,
        bus: &mut B,
        event: NodeEvent,
    ) -> Result<Vec<NodeAction>, NodeError> {
        match event {
            NodeEvent::Submit { data } => self.submit(bus, data),
            NodeEvent::FrameReceived(frame) => self.frame_received(bus, &frame),
        }
    }

    /// Authenticate and send one message.
    ///
    /// Advances the counters, sends the Data frame, then the Mac frame. A
    /// failed Data frame aborts the pair; the Mac frame is not attempted.
    pub fn submit<B: CanBus>(
        &mut self,
        bus: &mut B,
        data: u64,
    ) -> Result<Vec<NodeAction>, NodeError> {
        let _state = tracing::trace_span!("state", state = ?ProtocolState::Normal).entered();
        self.session.set_pending_data(data);
        self.advance();

        let epoch = self.session.epoch();
        let sequence = self.session.sequence();
        let channels = *self.session.channels();

        let data_frame = frames::data_frame(&channels, sequence, data);
        self.transmit(bus, &data_frame, FrameKind::Data)?;

        let tag = self.session.mac().data_tag(self.session.session_key(), sequence, data);
        let mac_frame = frames::mac_frame(&channels, sequence, tag);
        self.transmit(bus, &mac_frame, FrameKind::Mac)?;

        self.stats.pairs_sent += 1;
        debug!(epoch, sequence, "pair sent");

        Ok(vec![NodeAction::PairSent { epoch, sequence }])
    }

    /// Decoder entry point: classify a received frame and react to it.
    pub fn frame_received<B: CanBus>(
        &mut self,
        bus: &mut B,
        frame: &Frame,
    ) -> Result<Vec<NodeAction>, NodeError> {
        let inbound = Inbound::classify(frame, self.session.channels());
        trace!(id = frame.raw_id(), ?inbound, "frame received");

        match inbound {
            Inbound::Data { .. } | Inbound::Mac { .. } | Inbound::Epoch { .. } => {
                let _state =
                    tracing::trace_span!("state", state = ?ProtocolState::Normal).entered();
                self.dispatch_normal(bus, inbound)
            },
            Inbound::EpochMac { sequence, tag } => self.resync_validating(bus, sequence, tag),
            Inbound::AuthFail => self.resync_sending(bus),
            Inbound::Unclassified { base, command, sequence } => {
                // Counter housekeeping only; the payload is discarded.
                debug!(%base, ?command, sequence, "unclassified frame");
                self.advance();
                self.stats.unclassified += 1;
                Ok(vec![NodeAction::Unclassified { base, command }])
            },
            Inbound::Foreign => Ok(Vec::new()),
        }
    }

    /// Frames handled without leaving NORMAL.
    fn dispatch_normal<B: CanBus>(
        &mut self,
        bus: &mut B,
        inbound: Inbound,
    ) -> Result<Vec<NodeAction>, NodeError> {
        match inbound {
            Inbound::Data { sequence, data } => {
                self.on_data(sequence, data);
                Ok(Vec::new())
            },
            Inbound::Mac { sequence, tag } => self.on_mac(bus, sequence, tag),
            Inbound::Epoch { sequence, epoch } => {
                self.on_epoch(sequence, epoch);
                Ok(Vec::new())
            },
            _ => Ok(Vec::new()),
        }
    }

    fn on_data(&mut self, sequence: u16, data: u64) {
        let expected_tag = self.session.mac().data_tag(self.session.session_key(), sequence, data);
        if self.pending != Pending::Idle {
            debug!(pending = ?self.pending, "replacing unfinished pair");
        }
        self.pending = Pending::Data { sequence, data, expected_tag };
    }

    fn on_mac<B: CanBus>(
        &mut self,
        bus: &mut B,
        sequence: u16,
        tag: u64,
    ) -> Result<Vec<NodeAction>, NodeError> {
        match std::mem::replace(&mut self.pending, Pending::Idle) {
            Pending::Data { sequence: data_sequence, data, expected_tag }
                if data_sequence == sequence =>
            {
                if !tags_equal(expected_tag, tag) {
                    warn!(sequence, "mac mismatch");
                    return self.send_auth_fail(bus, AuthFailReason::MacMismatch);
                }

                self.advance();
                self.stats.messages_accepted += 1;
                debug!(sequence, data, "message accepted");
                Ok(vec![NodeAction::MessageAccepted { data, sequence }])
            },
            _ => {
                warn!(sequence, "mac without matching data frame");
                self.send_auth_fail(bus, AuthFailReason::MissingData)
            },
        }
    }

    fn on_epoch(&mut self, sequence: u16, epoch: u64) {
        // Keyed for the announced epoch so both sides agree even when their
        // own epochs have drifted apart.
        let key = self.session.session_key_for(epoch);
        let expected_tag = self.session.mac().epoch_tag(key, sequence, epoch);
        self.pending = Pending::Epoch { sequence, epoch, expected_tag };
    }

    /// RESYNC_SENDING: advance, announce epoch and sequence, back to NORMAL.
    fn resync_sending<B: CanBus>(&mut self, bus: &mut B) -> Result<Vec<NodeAction>, NodeError> {
        let _state = tracing::debug_span!("state", state = ?ProtocolState::ResyncSending).entered();
        self.stats.auth_fails_received += 1;

        self.advance();
        let epoch = self.session.epoch();
        let sequence = self.session.sequence();
        let channels = *self.session.channels();

        let epoch_frame = frames::epoch_frame(&channels, sequence, epoch);
        self.transmit(bus, &epoch_frame, FrameKind::Epoch)?;

        let tag = self.session.mac().epoch_tag(self.session.session_key(), sequence, epoch);
        let epoch_mac_frame = frames::epoch_mac_frame(&channels, sequence, tag);
        self.transmit(bus, &epoch_mac_frame, FrameKind::EpochMac)?;

        self.stats.epochs_announced += 1;
        info!(epoch, sequence, "epoch announced");

        Ok(vec![NodeAction::EpochAnnounced { epoch, sequence }])
    }

    /// RESYNC_VALIDATING: check tag and freshness, adopt or answer Auth-Fail.
    fn resync_validating<B: CanBus>(
        &mut self,
        bus: &mut B,
        sequence: u16,
        tag: u64,
    ) -> Result<Vec<NodeAction>, NodeError> {
        let _state =
            tracing::debug_span!("state", state = ?ProtocolState::ResyncValidating).entered();

        let (epoch, expected_tag) = match std::mem::replace(&mut self.pending, Pending::Idle) {
            Pending::Epoch { sequence: epoch_sequence, epoch, expected_tag }
                if epoch_sequence == sequence =>
            {
                (epoch, expected_tag)
            },
            _ => {
                warn!(sequence, "epoch mac without matching epoch frame");
                return self.send_auth_fail(bus, AuthFailReason::MissingEpoch);
            },
        };

        if !tags_equal(expected_tag, tag) {
            warn!(epoch, sequence, "epoch mac mismatch");
            return self.send_auth_fail(bus, AuthFailReason::EpochMacMismatch);
        }

        if !self.session.is_fresh(epoch, sequence) {
            warn!(
                epoch,
                sequence,
                local_epoch = self.session.epoch(),
                local_sequence = self.session.sequence(),
                "stale epoch announcement"
            );
            return self.send_auth_fail(bus, AuthFailReason::Stale { epoch, sequence });
        }

        self.session.adopt(epoch, sequence)?;
        self.stats.resyncs += 1;
        info!(epoch, sequence, "resynchronized");

        Ok(vec![NodeAction::Resynchronized { epoch, sequence }])
    }

    fn send_auth_fail<B: CanBus>(
        &mut self,
        bus: &mut B,
        reason: AuthFailReason,
    ) -> Result<Vec<NodeAction>, NodeError> {
        let frame = frames::auth_fail_frame(self.session.channels());
        self.transmit(bus, &frame, FrameKind::AuthFail)?;
        self.stats.auth_fails_sent += 1;

        Ok(vec![NodeAction::AuthFailSent { reason }])
    }

    fn advance(&mut self) {
        if let Advance::EpochRolled { epoch } = self.session.advance() {
            info!(epoch, "sequence overflow, new session key");
        }
    }

    fn transmit<B: CanBus>(
        &mut self,
        bus: &mut B,
        frame: &Frame,
        kind: FrameKind,
    ) -> Result<(), NodeError> {
        let attempts = self.policy.max_attempts();
        let mut reason = String::new();

        for attempt in 1..=attempts {
            match bus.transmit(frame) {
                Ok(()) => {
                    trace!(%kind, id = frame.raw_id(), attempt, "frame transmitted");
                    return Ok(());
                },
                Err(e) => {
                    warn!(%kind, attempt, error = %e, "transmit failed");
                    reason = e.to_string();
                },
            }
        }

        self.stats.transmit_failures += 1;
        Err(NodeError::Transmit { kind, attempts, reason })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fmt;

    use leia_crypto::HmacSha256Mac;
    use leia_proto::FrameId;

    use super::*;

    /// Bus that fails the first `failures` transmissions, then records.
    #[derive(Default)]
    struct FlakyBus {
        failures: usize,
        frames: Vec<Frame>,
        attempts: usize,
    }

    #[derive(Debug)]
    struct BusOff;

    impl fmt::Display for BusOff {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("bus off")
        }
    }

    impl CanBus for FlakyBus {
        type Error = BusOff;

        fn transmit(&mut self, frame: &Frame) -> Result<(), Self::Error> {
            self.attempts += 1;
            if self.failures > 0 {
                self.failures -= 1;
                return Err(BusOff);
            }
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    /// Bus that accepts the first `successes` frames, then fails forever.
    struct CutoffBus {
        successes: usize,
        frames: Vec<Frame>,
    }

    impl CanBus for CutoffBus {
        type Error = BusOff;

        fn transmit(&mut self, frame: &Frame) -> Result<(), Self::Error> {
            if self.successes == 0 {
                return Err(BusOff);
            }
            self.successes -= 1;
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    fn node() -> Node {
        Node::new(&NodeConfig::reference(), AdditiveMac)
    }

    /// Deliver every frame in `frames` to `node`, collecting actions and
    /// reaction frames.
    fn deliver(node: &mut Node, frames: &[Frame]) -> (Vec<NodeAction>, Vec<Frame>) {
        let mut out: Vec<Frame> = Vec::new();
        let mut actions = Vec::new();
        for frame in frames {
            actions.extend(node.frame_received(&mut out, frame).unwrap());
        }
        (actions, out)
    }

    fn counters(node: &Node) -> (u64, u16) {
        (node.session().epoch(), node.session().sequence())
    }

    #[test]
    fn initial_state() {
        let node = node();
        assert_eq!(counters(&node), (1, 0));
        assert_eq!(node.session().session_key(), 11);
    }

    #[test]
    fn first_transmit_matches_reference_frames() {
        let mut node = node();
        let mut bus: Vec<Frame> = Vec::new();

        let actions = node.submit(&mut bus, 0x55).unwrap();
        assert_eq!(actions, vec![NodeAction::PairSent { epoch: 1, sequence: 1 }]);

        let trace: Vec<String> = bus
            .iter()
            .map(|frame| format!("{:08x} {}", frame.raw_id(), hex::encode(frame.payload())))
            .collect();
        insta::assert_snapshot!(trace.join("\n"), @r"
        84000001 5500000000000000
        84050001 6100000000000000
        ");
    }

    #[test]
    fn handle_dispatches_events() {
        let mut sender = node();
        let mut receiver = node();
        let mut bus: Vec<Frame> = Vec::new();

        sender.handle(&mut bus, NodeEvent::Submit { data: 7 }).unwrap();

        let mut actions = Vec::new();
        for frame in bus {
            let event = NodeEvent::FrameReceived(frame);
            actions.extend(receiver.handle(&mut Vec::<Frame>::new(), event).unwrap());
        }
        assert_eq!(actions, vec![NodeAction::MessageAccepted { data: 7, sequence: 1 }]);
    }

    #[test]
    fn receiver_accepts_pair_and_advances() {
        let mut sender = node();
        let mut receiver = node();
        let mut bus: Vec<Frame> = Vec::new();

        sender.submit(&mut bus, 0x55).unwrap();
        let (actions, out) = deliver(&mut receiver, &bus);

        assert_eq!(actions, vec![NodeAction::MessageAccepted { data: 0x55, sequence: 1 }]);
        assert!(out.is_empty());
        assert_eq!(counters(&receiver), counters(&sender));
        assert_eq!(receiver.stats().messages_accepted, 1);
    }

    #[test]
    fn data_failure_aborts_pair() {
        let mut node = node();
        let mut bus = FlakyBus { failures: 1, ..FlakyBus::default() };

        let err = node.submit(&mut bus, 0x55).unwrap_err();
        assert!(matches!(err, NodeError::Transmit { kind: FrameKind::Data, attempts: 1, .. }));
        assert_eq!(bus.attempts, 1);
        assert!(bus.frames.is_empty());

        // Counters advanced even though nothing went out.
        assert_eq!(counters(&node), (1, 1));
        assert_eq!(node.stats().transmit_failures, 1);
        assert_eq!(node.stats().pairs_sent, 0);
    }

    #[test]
    fn mac_failure_leaves_data_on_bus() {
        let mut node = node();
        let mut bus = CutoffBus { successes: 1, frames: Vec::new() };

        let err = node.submit(&mut bus, 0x55).unwrap_err();
        assert!(matches!(err, NodeError::Transmit { kind: FrameKind::Mac, .. }));
        assert_eq!(bus.frames.len(), 1);
        assert!(!err.is_fatal());
    }

    #[test]
    fn retry_policy_recovers_from_transient_failure() {
        let config = NodeConfig::reference()
            .with_transmit_policy(TransmitPolicy::Retry { max_attempts: 3 });
        let mut node = Node::new(&config, AdditiveMac);
        let mut bus = FlakyBus { failures: 2, ..FlakyBus::default() };

        node.submit(&mut bus, 0x55).unwrap();
        assert_eq!(bus.attempts, 4);
        assert_eq!(bus.frames.len(), 2);
        assert_eq!(node.stats().transmit_failures, 0);
    }

    #[test]
    fn retry_policy_gives_up() {
        let config = NodeConfig::reference()
            .with_transmit_policy(TransmitPolicy::Retry { max_attempts: 2 });
        let mut node = Node::new(&config, AdditiveMac);
        let mut bus = FlakyBus { failures: 5, ..FlakyBus::default() };

        let err = node.submit(&mut bus, 0x55).unwrap_err();
        assert!(matches!(err, NodeError::Transmit { kind: FrameKind::Data, attempts: 2, .. }));
        assert_eq!(bus.attempts, 2);
    }

    #[test]
    fn mac_mismatch_sends_auth_fail() {
        let mut sender = node();
        let mut receiver = node();
        let mut bus: Vec<Frame> = Vec::new();
        sender.submit(&mut bus, 0x55).unwrap();

        let forged = Frame::new(bus[1].raw_id(), 0x62_u64.to_le_bytes().to_vec()).unwrap();
        let (actions, out) = deliver(&mut receiver, &[bus[0].clone(), forged]);

        assert_eq!(actions, vec![NodeAction::AuthFailSent { reason: AuthFailReason::MacMismatch }]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].frame_id(), FrameId::Standard(0x102));
        assert!(out[0].payload().is_empty());
        assert_eq!(counters(&receiver), (1, 0));
    }

    #[test]
    fn mac_without_data_sends_auth_fail() {
        let mut sender = node();
        let mut receiver = node();
        let mut bus: Vec<Frame> = Vec::new();
        sender.submit(&mut bus, 0x55).unwrap();

        let (actions, _) = deliver(&mut receiver, &bus[1..]);
        assert_eq!(actions, vec![NodeAction::AuthFailSent { reason: AuthFailReason::MissingData }]);
    }

    #[test]
    fn mac_for_other_sequence_sends_auth_fail() {
        let mut sender = node();
        let mut receiver = node();
        let mut first: Vec<Frame> = Vec::new();
        let mut second: Vec<Frame> = Vec::new();
        sender.submit(&mut first, 1).unwrap();
        sender.submit(&mut second, 2).unwrap();

        let (actions, _) = deliver(&mut receiver, &[first[0].clone(), second[1].clone()]);
        assert_eq!(actions, vec![NodeAction::AuthFailSent { reason: AuthFailReason::MissingData }]);
    }

    #[test]
    fn auth_fail_triggers_epoch_announcement() {
        let mut node = node();
        let fail = Frame::standard_empty(node.session().channels().fail());

        let (actions, out) = deliver(&mut node, &[fail]);
        assert_eq!(actions, vec![NodeAction::EpochAnnounced { epoch: 1, sequence: 1 }]);
        assert_eq!(out.len(), 2);

        let channels = *node.session().channels();
        assert_eq!(
            Inbound::classify(&out[0], &channels),
            Inbound::Epoch { sequence: 1, epoch: 1 }
        );
        let Inbound::EpochMac { sequence, tag } = Inbound::classify(&out[1], &channels) else {
            unreachable!("second frame is the epoch mac");
        };
        assert_eq!(sequence, 1);
        assert_eq!(tag, 11 + 1 + 1);
        assert_eq!(node.stats().auth_fails_received, 1);
        assert_eq!(node.stats().epochs_announced, 1);
    }

    #[test]
    fn resync_round_trip_matches_counters() {
        let mut behind = node();
        let mut ahead = node();
        ahead.session_mut().adopt(3, 40).unwrap();

        // Behind node fails to validate ahead's pair: different session keys.
        let mut bus: Vec<Frame> = Vec::new();
        ahead.submit(&mut bus, 9).unwrap();
        let (actions, fail) = deliver(&mut behind, &bus);
        assert_eq!(actions, vec![NodeAction::AuthFailSent { reason: AuthFailReason::MacMismatch }]);

        let (actions, announcement) = deliver(&mut ahead, &fail);
        assert_eq!(actions, vec![NodeAction::EpochAnnounced { epoch: 3, sequence: 42 }]);

        let (actions, out) = deliver(&mut behind, &announcement);
        assert_eq!(actions, vec![NodeAction::Resynchronized { epoch: 3, sequence: 42 }]);
        assert!(out.is_empty());
        assert_eq!(counters(&behind), (3, 42));
        assert!(behind.session().is_consistent());

        // Next pair validates.
        let mut bus: Vec<Frame> = Vec::new();
        ahead.submit(&mut bus, 10).unwrap();
        let (actions, _) = deliver(&mut behind, &bus);
        assert_eq!(actions, vec![NodeAction::MessageAccepted { data: 10, sequence: 43 }]);
    }

    #[test]
    fn stale_announcement_sends_auth_fail() {
        let mut announcer = node();
        let mut validator = node();
        validator.session_mut().adopt(5, 0).unwrap();

        let fail = Frame::standard_empty(announcer.session().channels().fail());
        let (_, announcement) = deliver(&mut announcer, &[fail]);

        let (actions, out) = deliver(&mut validator, &announcement);
        let reason = AuthFailReason::Stale { epoch: 1, sequence: 1 };
        assert_eq!(actions, vec![NodeAction::AuthFailSent { reason }]);
        assert_eq!(out.len(), 1);
        assert_eq!(counters(&validator), (5, 0));
    }

    #[test]
    fn forged_announcement_sends_auth_fail() {
        let mut validator = node();
        let channels = *validator.session().channels();

        let epoch = frames::epoch_frame(&channels, 0, 9);
        let epoch_mac = frames::epoch_mac_frame(&channels, 0, 0xBAD);
        let (actions, _) = deliver(&mut validator, &[epoch, epoch_mac]);

        assert_eq!(
            actions,
            vec![NodeAction::AuthFailSent { reason: AuthFailReason::EpochMacMismatch }]
        );
        assert_eq!(counters(&validator), (1, 0));
    }

    #[test]
    fn epoch_mac_without_epoch_sends_auth_fail() {
        let mut validator = node();
        let channels = *validator.session().channels();

        let (actions, _) = deliver(&mut validator, &[frames::epoch_mac_frame(&channels, 2, 14)]);
        assert_eq!(
            actions,
            vec![NodeAction::AuthFailSent { reason: AuthFailReason::MissingEpoch }]
        );
    }

    #[test]
    fn data_frame_does_not_complete_epoch_pair() {
        let mut announcer = node();
        let mut validator = node();
        let fail = Frame::standard_empty(announcer.session().channels().fail());
        let (_, announcement) = deliver(&mut announcer, &[fail]);

        let stray = frames::data_frame(announcer.session().channels(), 1, 0);
        let (actions, _) =
            deliver(&mut validator, &[announcement[0].clone(), stray, announcement[1].clone()]);
        assert_eq!(
            actions,
            vec![NodeAction::AuthFailSent { reason: AuthFailReason::MissingEpoch }]
        );
    }

    #[test]
    fn unclassified_frame_only_advances() {
        let mut node = node();
        let channels = *node.session().channels();
        let raw = leia_proto::ExtendedId::new(channels.mac(), Command::Epoch, 7).to_raw();
        let frame = Frame::new(raw, 0xFFFF_u64.to_le_bytes().to_vec()).unwrap();

        let (actions, out) = deliver(&mut node, &[frame]);
        assert_eq!(
            actions,
            vec![NodeAction::Unclassified { base: channels.mac(), command: Command::Epoch }]
        );
        assert!(out.is_empty());
        assert_eq!(counters(&node), (1, 1));
        assert_eq!(node.stats().unclassified, 1);
    }

    #[test]
    fn foreign_frame_ignored() {
        let mut node = node();
        let base = BaseId::new(0x7FF).unwrap();
        let raw = leia_proto::ExtendedId::new(base, Command::Mac, 7).to_raw();
        let frame = Frame::new(raw, vec![0u8; 8]).unwrap();

        let (actions, out) = deliver(&mut node, &[frame]);
        assert!(actions.is_empty());
        assert!(out.is_empty());
        assert_eq!(counters(&node), (1, 0));
    }

    #[test]
    fn sender_rollover_recovers_through_resync() {
        let mut sender = node();
        let mut receiver = node();
        sender.session_mut().adopt(1, u16::MAX).unwrap();
        receiver.session_mut().adopt(1, u16::MAX - 1).unwrap();

        // Sender rolls into epoch 2; receiver still holds the epoch 1 key.
        let mut bus: Vec<Frame> = Vec::new();
        sender.submit(&mut bus, 0x55).unwrap();
        assert_eq!(counters(&sender), (2, 0));

        let (_, fail) = deliver(&mut receiver, &bus);
        let (_, announcement) = deliver(&mut sender, &fail);
        let (actions, _) = deliver(&mut receiver, &announcement);

        assert_eq!(actions, vec![NodeAction::Resynchronized { epoch: 2, sequence: 1 }]);
        assert_eq!(counters(&receiver), counters(&sender));
        assert_eq!(receiver.session().session_key(), sender.session().session_key());
    }

    #[test]
    fn strong_mac_exchange() {
        let mut sender = Node::new(&NodeConfig::reference(), HmacSha256Mac);
        let mut receiver = Node::new(&NodeConfig::reference(), HmacSha256Mac);
        let mut bus: Vec<Frame> = Vec::new();

        sender.submit(&mut bus, 0xCAFE).unwrap();

        let mut actions = Vec::new();
        for frame in &bus {
            actions.extend(receiver.frame_received(&mut Vec::<Frame>::new(), frame).unwrap());
        }
        assert_eq!(actions, vec![NodeAction::MessageAccepted { data: 0xCAFE, sequence: 1 }]);
    }

    #[test]
    fn auth_fail_transmit_failure_is_reported() {
        let mut sender = node();
        let mut receiver = node();
        let mut bus: Vec<Frame> = Vec::new();
        sender.submit(&mut bus, 0x55).unwrap();

        let mut dead = CutoffBus { successes: 0, frames: Vec::new() };
        let err = receiver.frame_received(&mut dead, &bus[1]).unwrap_err();
        assert!(matches!(err, NodeError::Transmit { kind: FrameKind::AuthFail, .. }));
        assert_eq!(receiver.stats().auth_fails_sent, 0);
    }

    #[test]
    fn epoch_failure_aborts_announcement() {
        let mut node = node();
        let fail = Frame::standard_empty(node.session().channels().fail());
        let mut bus = FlakyBus { failures: 1, ..FlakyBus::default() };

        let err = node.frame_received(&mut bus, &fail).unwrap_err();
        assert!(matches!(err, NodeError::Transmit { kind: FrameKind::Epoch, attempts: 1, .. }));

        // EpochMac never attempted.
        assert_eq!(bus.attempts, 1);
        assert!(bus.frames.is_empty());
        assert_eq!(counters(&node), (1, 1));
        assert_eq!(node.stats().auth_fails_received, 1);
        assert_eq!(node.stats().epochs_announced, 0);
        assert_eq!(node.stats().transmit_failures, 1);
    }

    #[test]
    fn epoch_failure_exhausts_retries_before_aborting() {
        let config = NodeConfig::reference()
            .with_transmit_policy(TransmitPolicy::Retry { max_attempts: 3 });
        let mut node = Node::new(&config, AdditiveMac);
        let fail = Frame::standard_empty(node.session().channels().fail());
        let mut bus = FlakyBus { failures: 3, ..FlakyBus::default() };

        let err = node.frame_received(&mut bus, &fail).unwrap_err();
        assert!(matches!(err, NodeError::Transmit { kind: FrameKind::Epoch, attempts: 3, .. }));
        assert_eq!(bus.attempts, 3);
        assert!(bus.frames.is_empty());
        assert_eq!(counters(&node), (1, 1));
        assert_eq!(node.stats().epochs_announced, 0);

        // A transient failure within the budget still completes the pair.
        let mut bus = FlakyBus { failures: 2, ..FlakyBus::default() };
        let actions = node.frame_received(&mut bus, &fail).unwrap();
        assert_eq!(actions, vec![NodeAction::EpochAnnounced { epoch: 1, sequence: 2 }]);
        assert_eq!(bus.attempts, 4);
        assert_eq!(bus.frames.len(), 2);
        assert_eq!(node.stats().epochs_announced, 1);
    }

    #[test]
    fn same_epoch_replay_is_accepted_again() {
        let mut sender = node();
        let mut receiver = node();
        let mut bus: Vec<Frame> = Vec::new();
        sender.submit(&mut bus, 0x55).unwrap();

        deliver(&mut receiver, &bus);
        let (actions, out) = deliver(&mut receiver, &bus);

        assert_eq!(actions, vec![NodeAction::MessageAccepted { data: 0x55, sequence: 1 }]);
        assert!(out.is_empty());
        assert_eq!(counters(&receiver), (1, 2));
    }

    #[test]
    fn replay_after_epoch_change_is_rejected() {
        let mut sender = node();
        let mut receiver = node();
        let mut bus: Vec<Frame> = Vec::new();
        sender.submit(&mut bus, 0x55).unwrap();

        deliver(&mut receiver, &bus);
        receiver.session_mut().adopt(2, 0).unwrap();
        let (actions, _) = deliver(&mut receiver, &bus);

        assert_eq!(actions, vec![NodeAction::AuthFailSent { reason: AuthFailReason::MacMismatch }]);
    }
}
