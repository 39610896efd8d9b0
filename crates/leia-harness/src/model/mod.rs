//! Reference model for model-based testing.
//!
//! The model reduces each node to a counter position and predicts, for every
//! operation, how many frames the exchange takes and where both counters end
//! up. It never computes a tag.

pub mod operation;
mod world;

pub use operation::{ModelNodeId, Operation, OperationError, OperationResult};
pub use world::{ModelWorld, ObservableState};
