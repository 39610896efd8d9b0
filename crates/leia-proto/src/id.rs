//! Extended identifier packing.
//!
//! The free functions mirror the individual steps of building an identifier
//! (pack, place base id, set marker) so each step can be checked in
//! isolation. [`ExtendedId`] bundles them for normal use.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::errors::ProtoError;

/// Bit position of the command code.
const COMMAND_SHIFT: u32 = 16;

/// Mask of the 2-bit command code (after shifting).
const COMMAND_MASK: u32 = 0b11;

/// Bit position of the base id.
const BASE_ID_SHIFT: u32 = 18;

/// Mask of the 16-bit sequence field.
const SEQUENCE_MASK: u32 = 0xFFFF;

bitflags! {
    /// Flag bits carried above the 29-bit identifier space.
    ///
    /// Bits 29-30 are unused by the protocol: they are never set on encode and
    /// are ignored on decode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct IdFlags: u32 {
        /// Extended (29-bit) frame marker.
        const EXTENDED = 0x8000_0000;
    }
}

/// 11-bit logical channel identifier.
///
/// # Invariants
///
/// - Value is always below `2^11`. [`BaseId::new`] rejects wider values;
///   [`BaseId::masked`] is the explicit truncating alternative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct BaseId(u16);

impl BaseId {
    /// Largest representable base id.
    pub const MAX: u16 = 0x7FF;

    /// Create a base id, rejecting values wider than 11 bits.
    pub fn new(value: u16) -> crate::Result<Self> {
        if value > Self::MAX {
            return Err(ProtoError::BaseIdOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// Create a base id by discarding bits above the 11-bit field.
    pub const fn masked(value: u16) -> Self {
        Self(value & Self::MAX)
    }

    /// Raw 11-bit value.
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for BaseId {
    type Error = ProtoError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BaseId> for u16 {
    fn from(id: BaseId) -> Self {
        id.0
    }
}

impl fmt::Display for BaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05x}", self.0)
    }
}

/// 2-bit command code carried in bits 16-17.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Command {
    /// Application payload.
    Data = 0,
    /// Integrity tag for the preceding Data frame.
    Mac = 1,
    /// Epoch announcement during resync.
    Epoch = 2,
    /// Integrity tag for the preceding Epoch frame.
    EpochMac = 3,
}

impl Command {
    /// Convert from a 2-bit field. Higher bits are masked off, so this is
    /// total over the decoded field.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Data,
            1 => Self::Mac,
            2 => Self::Epoch,
            _ => Self::EpochMac,
        }
    }

    /// Raw 2-bit value.
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if u32::from(value) > COMMAND_MASK {
            return Err(ProtoError::UnknownCommand { value });
        }
        Ok(Self::from_bits(value))
    }
}

/// Decoded view of a 29-bit extended identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtendedId {
    /// Logical channel.
    pub base: BaseId,
    /// Command code.
    pub command: Command,
    /// Sender's sequence counter at send time.
    pub sequence: u16,
}

impl ExtendedId {
    /// Create a decoded identifier.
    pub const fn new(base: BaseId, command: Command, sequence: u16) -> Self {
        Self { base, command, sequence }
    }

    /// Encode to the on-wire identifier word, extended marker included.
    pub fn to_raw(self) -> u32 {
        mark_extended(build_extended_id(self.base, self.sequence, self.command))
    }

    /// Decode an identifier word. Bit 31 and bits 29-30 are ignored.
    pub fn from_raw(id: u32) -> Self {
        decode_extended(id)
    }
}

/// Pack sequence (bits 0-15) and command (bits 16-17) into an 18-bit field.
pub fn pack_sequence_and_command(sequence: u16, command: Command) -> u32 {
    u32::from(sequence) | (u32::from(command.bits()) << COMMAND_SHIFT)
}

/// Build the 29-bit identifier: base id in bits 18-28 above the packed field.
///
/// The extended marker is not set; see [`mark_extended`].
pub fn build_extended_id(base: BaseId, sequence: u16, command: Command) -> u32 {
    (u32::from(base.get()) << BASE_ID_SHIFT) | pack_sequence_and_command(sequence, command)
}

/// Set the extended-frame marker (bit 31). No other bit is touched.
pub const fn mark_extended(id: u32) -> u32 {
    id | IdFlags::EXTENDED.bits()
}

/// True iff the extended-frame marker (bit 31) is set.
pub const fn is_extended(id: u32) -> bool {
    id & IdFlags::EXTENDED.bits() != 0
}

/// Inverse of [`build_extended_id`], ignoring bit 31 and bits 29-30.
#[allow(clippy::cast_possible_truncation)] // every field is masked to its width first
pub fn decode_extended(id: u32) -> ExtendedId {
    let base = BaseId(((id >> BASE_ID_SHIFT) & u32::from(BaseId::MAX)) as u16);
    let command = Command::from_bits(((id >> COMMAND_SHIFT) & COMMAND_MASK) as u8);
    let sequence = (id & SEQUENCE_MASK) as u16;

    ExtendedId { base, command, sequence }
}
