//! Two nodes sharing one simulated bus.
//!
//! Frames are routed to the other node in global transmission order, one
//! frame per step. Delivery is bounded: two nodes whose counters are far apart
//! can trade Auth-Fail and stale announcements for a long time before the
//! announcer catches up.

use std::collections::VecDeque;

use leia_core::{
    AdditiveMac, IntegrityFunction, Node, NodeAction, NodeConfig, NodeError, NodeEvent,
};
use leia_proto::Frame;

use crate::sim_bus::{FaultConfig, SimBus};

/// Index of a node in the world (0 or 1).
pub type NodeIndex = usize;

/// Outcome of [`SimWorld::deliver_pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Frames handed to a node.
    pub steps: usize,
    /// True if the bus drained within the step budget. Otherwise the
    /// remaining frames were discarded.
    pub quiescent: bool,
}

/// Everything that happened at one node, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The node reported an action.
    Action(NodeAction),
    /// A transmission failed.
    TransmitFailed,
}

/// Deterministic two-node world.
#[derive(Debug)]
pub struct SimWorld<M: IntegrityFunction = AdditiveMac> {
    nodes: [Node<M>; 2],
    buses: [SimBus; 2],
    wire: VecDeque<(NodeIndex, Frame)>,
    events: [Vec<Event>; 2],
}

impl SimWorld<AdditiveMac> {
    /// Two reference nodes on a perfect bus.
    pub fn reference() -> Self {
        Self::new(&NodeConfig::reference(), AdditiveMac, 0, FaultConfig::NONE)
    }
}

impl<M: IntegrityFunction> SimWorld<M> {
    /// Two nodes with identical configuration. Each endpoint draws faults
    /// from its own stream derived from `seed`.
    pub fn new(config: &NodeConfig, mac: M, seed: u64, faults: FaultConfig) -> Self {
        Self {
            nodes: [Node::new(config, mac.clone()), Node::new(config, mac)],
            buses: [SimBus::with_seed(seed, faults), SimBus::with_seed(seed ^ 0x5A5A, faults)],
            wire: VecDeque::new(),
            events: [Vec::new(), Vec::new()],
        }
    }

    /// Node by index.
    pub fn node(&self, index: NodeIndex) -> &Node<M> {
        &self.nodes[index]
    }

    /// Mutable node, for provisioning counters.
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node<M> {
        &mut self.nodes[index]
    }

    /// Bus endpoint of a node.
    pub fn bus(&self, index: NodeIndex) -> &SimBus {
        &self.buses[index]
    }

    /// Everything a node reported so far.
    pub fn events(&self, index: NodeIndex) -> &[Event] {
        &self.events[index]
    }

    /// Payloads a node accepted, in order.
    pub fn accepted(&self, index: NodeIndex) -> Vec<u64> {
        self.events[index]
            .iter()
            .filter_map(|event| match event {
                Event::Action(NodeAction::MessageAccepted { data, .. }) => Some(*data),
                _ => None,
            })
            .collect()
    }

    /// Change fault probabilities on both endpoints.
    pub fn set_faults(&mut self, faults: FaultConfig) {
        for bus in &mut self.buses {
            bus.set_faults(faults);
        }
    }

    /// Frames waiting on the wire.
    pub fn in_flight(&self) -> usize {
        self.wire.len()
    }

    /// Have node `from` authenticate and send `data`.
    pub fn submit(&mut self, from: NodeIndex, data: u64) -> Result<Vec<NodeAction>, NodeError> {
        self.dispatch(from, NodeEvent::Submit { data })
    }

    /// Route frames until the wire is empty or `max_steps` frames have been
    /// delivered.
    pub fn deliver_pending(&mut self, max_steps: usize) -> Delivery {
        let mut steps = 0;
        while steps < max_steps {
            let Some((from, frame)) = self.wire.pop_front() else {
                return Delivery { steps, quiescent: true };
            };
            // Errors are already recorded as events; delivery goes on.
            let _ = self.dispatch(1 - from, NodeEvent::FrameReceived(frame));
            steps += 1;
        }

        let quiescent = self.wire.is_empty();
        self.wire.clear();
        Delivery { steps, quiescent }
    }

    /// Both nodes hold the same counters and session key.
    pub fn synchronized(&self) -> bool {
        let [a, b] = &self.nodes;
        a.session().epoch() == b.session().epoch()
            && a.session().sequence() == b.session().sequence()
            && a.session().session_key() == b.session().session_key()
    }

    fn dispatch(
        &mut self,
        index: NodeIndex,
        event: NodeEvent,
    ) -> Result<Vec<NodeAction>, NodeError> {
        let result = self.nodes[index].handle(&mut self.buses[index], event);

        match &result {
            Ok(actions) => {
                self.events[index].extend(actions.iter().cloned().map(Event::Action));
            },
            Err(_) => self.events[index].push(Event::TransmitFailed),
        }

        while let Some(frame) = self.buses[index].pop_outbound() {
            self.wire.push_back((index, frame));
        }

        result
    }
}
