//! Fuzz target for the node's frame decoder
//!
//! Whatever arrives on the bus, a node must not panic and must not corrupt
//! its session state.
//!
//! # Strategy
//!
//! - Raw identifiers: any 32-bit id, extended marker set or not
//! - Channel hits: ids aimed at the configured channels with every command
//! - Payloads: 0 to 8 bytes
//! - Interleaving: local submissions between received frames
//!
//! # Invariants
//!
//! - NEVER panic on any frame
//! - `session_key == derive(shared_key, epoch)` after every call
//! - Counters never move backwards
//! - Foreign frames never change counters

#![no_main]

use arbitrary::Arbitrary;
use leia_core::{AdditiveMac, Inbound, Node, NodeConfig};
use leia_proto::{BaseId, Command, ExtendedId, Frame};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum FuzzEvent {
    /// Completely arbitrary identifier.
    Raw { id: u32, payload: Vec<u8> },
    /// Extended id on one of the configured channels.
    OnChannel { channel: u8, command: u8, sequence: u16, payload: Vec<u8> },
    /// Standard frame on the fail channel.
    AuthFail,
    /// Local send.
    Submit { data: u64 },
}

fn build_frame(event: &FuzzEvent, node: &Node) -> Option<Frame> {
    let channels = node.session().channels();
    match event {
        FuzzEvent::Raw { id, payload } => Frame::new(*id, truncate(payload)).ok(),
        FuzzEvent::OnChannel { channel, command, sequence, payload } => {
            let base = match channel % 3 {
                0 => channels.data(),
                1 => channels.mac(),
                _ => channels.fail(),
            };
            let id = ExtendedId::new(base, Command::from_bits(*command), *sequence);
            Frame::new(id.to_raw(), truncate(payload)).ok()
        },
        FuzzEvent::AuthFail => Some(Frame::standard_empty(channels.fail())),
        FuzzEvent::Submit { .. } => None,
    }
}

fn truncate(payload: &[u8]) -> Vec<u8> {
    payload.iter().copied().take(8).collect()
}

fn counters(node: &Node) -> (u64, u16) {
    (node.session().epoch(), node.session().sequence())
}

fuzz_target!(|events: Vec<FuzzEvent>| {
    let mut node = Node::new(&NodeConfig::reference(), AdditiveMac);
    let mut bus: Vec<Frame> = Vec::new();

    for event in events.iter().take(256) {
        let before = counters(&node);

        if let FuzzEvent::Submit { data } = event {
            let _ = node.submit(&mut bus, *data);
        } else if let Some(frame) = build_frame(event, &node) {
            let foreign =
                Inbound::classify(&frame, node.session().channels()) == Inbound::Foreign;
            let _ = node.frame_received(&mut bus, &frame);

            if foreign {
                assert_eq!(counters(&node), before, "foreign frame moved counters");
            }
        }

        assert!(node.session().is_consistent(), "session key detached from epoch");

        // Epochs only wrap after u64::MAX rollovers, out of reach here.
        assert!(counters(&node) >= before, "counters moved backwards");
    }

    // Everything the node emitted must itself be a well-formed frame.
    for frame in &bus {
        assert!(frame.dlc() <= 8);
        if !frame.is_extended() {
            assert!(frame.raw_id() <= u32::from(BaseId::MAX));
        }
    }
});
