//! LeiA authentication core.
//!
//! Lightweight authentication for CAN 2.0B: every application message travels
//! as a Data frame followed by a Mac frame, both stamped with a 16-bit
//! sequence in the extended identifier. Tags are keyed with a session key
//! derived from a long-term shared key and a 64-bit epoch. When a receiver
//! cannot validate a pair it sends an Auth-Fail, and the sender answers with
//! an authenticated announcement of its epoch and sequence that the receiver
//! adopts if it is fresh.
//!
//! # Architecture
//!
//! - [`config`]: channel identifiers, shared key, transmit policy
//! - [`session`]: keys and counters of one node
//! - [`counters`]: `advance`, `is_fresh` and `adopt`
//! - [`frames`]: frame builders and inbound classification
//! - [`node`]: the protocol state machine
//! - [`bus`]: the transmit collaborator
//!
//! The node performs no I/O of its own. Outgoing frames go through a
//! caller-supplied [`CanBus`]; incoming frames are pushed in with
//! [`Node::frame_received`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bus;
pub mod config;
pub mod counters;
pub mod error;
pub mod frames;
pub mod node;
pub mod session;

pub use bus::CanBus;
pub use config::{Channel, Channels, ConfigError, NodeConfig, TransmitPolicy};
pub use counters::Advance;
pub use error::{CounterError, NodeError};
pub use frames::{FrameKind, Inbound};
pub use leia_crypto::{AdditiveMac, HmacSha256Mac, IntegrityFunction};
pub use node::{AuthFailReason, Node, NodeAction, NodeEvent, NodeStats, ProtocolState};
pub use session::SessionState;
