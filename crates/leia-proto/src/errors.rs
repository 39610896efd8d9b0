//! Wire format errors.

use thiserror::Error;

/// Result alias for wire operations.
pub type Result<T> = std::result::Result<T, ProtoError>;

/// Errors raised while building or classifying frames.
///
/// Decoding an identifier never fails: every 32-bit word maps to some
/// [`crate::ExtendedId`]. These errors only guard construction, where a value
/// wider than its field would otherwise be silently truncated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// Logical channel identifier does not fit in 11 bits.
    #[error("base id {value:#x} exceeds 11 bits")]
    BaseIdOutOfRange {
        /// Offending value.
        value: u16,
    },

    /// Standard-format identifier does not fit in 11 bits.
    #[error("standard identifier {value:#x} exceeds 11 bits")]
    StandardIdOutOfRange {
        /// Offending raw identifier.
        value: u32,
    },

    /// Payload longer than a classic CAN frame allows.
    #[error("payload of {len} bytes exceeds the {max}-byte CAN limit")]
    PayloadTooLong {
        /// Actual payload length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Command code does not fit in 2 bits.
    #[error("unknown command code {value}")]
    UnknownCommand {
        /// Offending value.
        value: u8,
    },
}
