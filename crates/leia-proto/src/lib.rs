//! LeiA wire protocol
//!
//! Identifier layout and frame types for the LeiA lightweight authentication
//! protocol on CAN. This crate contains no protocol logic: it only knows how
//! to pack and unpack the 29-bit extended identifier and how to carry 64-bit
//! values in classic CAN payloads.
//!
//! # Wire Format
//!
//! Authenticated traffic uses extended frames. The identifier carries the
//! logical channel, the command code and the sender's sequence counter:
//!
//! ```text
//!  31  30 29  28             18  17  16  15                 0
//! ┌───┬─────┬─────────────────┬────────┬────────────────────┐
//! │ X │ 0 0 │  base id (11)   │ cmd (2)│   sequence (16)    │
//! └───┴─────┴─────────────────┴────────┴────────────────────┘
//! ```
//!
//! Auth-Fail notifications are standard frames whose 11-bit identifier is the
//! configured fail channel, with an empty payload.
//!
//! # Components
//!
//! - [`BaseId`]: validated 11-bit logical channel identifier
//! - [`Command`]: 2-bit command code
//! - [`ExtendedId`]: decoded view of an extended identifier
//! - [`Frame`]: identifier plus 0-8 payload bytes

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod frame;
pub mod id;

pub use errors::{ProtoError, Result};
pub use frame::{Frame, FrameId, MAX_PAYLOAD_LEN};
pub use id::{
    BaseId, Command, ExtendedId, IdFlags, build_extended_id, decode_extended, is_extended,
    mark_extended, pack_sequence_and_command,
};
