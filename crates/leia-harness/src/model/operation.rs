//! Operations for model-based testing.
//!
//! Operations are generated randomly by proptest and applied to both the
//! model and the real two-node world.

use arbitrary::Arbitrary;

/// Node selector. Only 0 and 1 are valid.
pub type ModelNodeId = u8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Node sends one authenticated message and the bus runs until it settles
    /// or the step budget is spent.
    Send {
        /// Sending node.
        from: ModelNodeId,
        /// Payload value.
        data: u64,
    },

    /// Node advances its counters without anything reaching the peer, as if
    /// its frames were lost.
    Skip {
        /// Node that advances.
        node: ModelNodeId,
        /// How many times.
        steps: u8,
    },

    /// Node jumps to the start of its next epoch.
    JumpEpoch {
        /// Node that jumps.
        node: ModelNodeId,
    },
}

impl Operation {
    /// Map node selectors into range.
    pub fn clamped(self) -> Self {
        match self {
            Self::Send { from, data } => Self::Send { from: from % 2, data },
            Self::Skip { node, steps } => Self::Skip { node: node % 2, steps },
            Self::JumpEpoch { node } => Self::JumpEpoch { node: node % 2 },
        }
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Local-only operation applied.
    Ok,

    /// Receiver validated the pair.
    Accepted,

    /// Receiver rejected the pair and then adopted the sender's counters
    /// after `announcements` epoch announcements.
    Resynchronized {
        /// Announcements the sender made.
        announcements: u64,
    },

    /// Step budget ran out before the bus went quiet.
    Stalled,

    /// Operation could not be applied.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Node selector out of range.
    InvalidNode,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Error(_))
    }
}
