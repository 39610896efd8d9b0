//! Model world: two counters and a step budget.
//!
//! Counters are tracked as one position `epoch * 2^16 + sequence`, so
//! `advance` is `+1` and freshness is `>`. Epoch wraparound is out of the
//! model's range; generated operations never get near it.

use super::operation::{ModelNodeId, Operation, OperationError, OperationResult};

const EPOCH_SPAN: u128 = 1 << 16;

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Per-node `(epoch, sequence)`.
    pub counters: [(u64, u16); 2],
    /// Per-node accepted payloads, in order.
    pub accepted: [Vec<u64>; 2],
}

#[derive(Debug, Clone, Default)]
struct ModelNode {
    position: u128,
    accepted: Vec<u64>,
}

impl ModelNode {
    fn started() -> Self {
        Self { position: EPOCH_SPAN, accepted: Vec::new() }
    }

    #[allow(clippy::cast_possible_truncation)] // runs stay far below u64::MAX epochs
    fn epoch(&self) -> u64 {
        (self.position / EPOCH_SPAN) as u64
    }

    #[allow(clippy::cast_possible_truncation)] // remainder is below 2^16
    fn sequence(&self) -> u16 {
        (self.position % EPOCH_SPAN) as u16
    }
}

/// Reference implementation of two nodes on a lossless bus.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    nodes: [ModelNode; 2],
    max_steps: usize,
}

impl ModelWorld {
    /// Both nodes at `epoch = 1`, `sequence = 0`. Each `Send` may deliver at
    /// most `max_steps` frames.
    pub fn new(max_steps: usize) -> Self {
        Self { nodes: [ModelNode::started(), ModelNode::started()], max_steps }
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Send { from, data } => match index(from) {
                Some(from) => self.apply_send(from, data),
                None => OperationResult::Error(OperationError::InvalidNode),
            },
            Operation::Skip { node, steps } => match index(node) {
                Some(node) => {
                    self.nodes[node].position += u128::from(steps);
                    OperationResult::Ok
                },
                None => OperationResult::Error(OperationError::InvalidNode),
            },
            Operation::JumpEpoch { node } => match index(node) {
                Some(node) => {
                    let next = u128::from(self.nodes[node].epoch()) + 1;
                    self.nodes[node].position = next * EPOCH_SPAN;
                    OperationResult::Ok
                },
                None => OperationResult::Error(OperationError::InvalidNode),
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let [a, b] = &self.nodes;
        ObservableState {
            counters: [(a.epoch(), a.sequence()), (b.epoch(), b.sequence())],
            accepted: [a.accepted.clone(), b.accepted.clone()],
        }
    }

    /// Frame exchange for one message:
    ///
    /// - same epoch: Data, Mac, accepted (2 frames)
    /// - otherwise: Data, Mac, then rounds of Auth-Fail, Epoch, EpochMac
    ///   until the announcement is fresh (`2 + 3 * rounds` frames)
    fn apply_send(&mut self, from: usize, data: u64) -> OperationResult {
        let to = 1 - from;
        let budget = self.max_steps as u128;
        self.nodes[from].position += 1;

        let sender = self.nodes[from].position;
        let receiver = self.nodes[to].position;

        if self.nodes[from].epoch() == self.nodes[to].epoch() {
            if budget < 2 {
                return OperationResult::Stalled;
            }
            self.nodes[to].position += 1;
            self.nodes[to].accepted.push(data);
            return OperationResult::Accepted;
        }

        // Each round advances the sender once; it stops at the first position
        // past the receiver.
        let rounds = if sender < receiver { receiver - sender + 1 } else { 1 };

        if 2 + 3 * rounds <= budget {
            self.nodes[from].position += rounds;
            self.nodes[to].position = self.nodes[from].position;
            OperationResult::Resynchronized { announcements: rounds as u64 }
        } else {
            // Auth-Fail number k reaches the sender at frame 3k.
            self.nodes[from].position += rounds.min(budget / 3);
            OperationResult::Stalled
        }
    }
}

fn index(node: ModelNodeId) -> Option<usize> {
    (node < 2).then_some(usize::from(node))
}
