//! Deterministic simulation harness for LeiA protocol testing.
//!
//! A seeded, fault-injecting [`SimBus`] stands in for the CAN controller and
//! [`SimWorld`] routes frames between two nodes in transmission order.
//! Identical seeds replay identical runs.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and a real world, and
//! their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_bus;
pub mod world;

pub use model::{
    ModelNodeId, ModelWorld, ObservableState, Operation, OperationError, OperationResult,
};
pub use sim_bus::{FaultConfig, SimBus, SimBusError};
pub use world::{Delivery, Event, NodeIndex, SimWorld};
