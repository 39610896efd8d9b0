//! CAN frame representation.

use bytes::Bytes;

use crate::{
    errors::ProtoError,
    id::{BaseId, ExtendedId, decode_extended, is_extended},
};

/// Maximum payload length of a classic CAN frame.
pub const MAX_PAYLOAD_LEN: usize = 8;

/// Classified identifier of a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameId {
    /// 11-bit standard identifier.
    Standard(u16),
    /// 29-bit extended identifier, decoded.
    Extended(ExtendedId),
}

/// A single CAN frame: identifier word plus 0-8 payload bytes.
///
/// The identifier word uses bit 31 as the extended-frame marker. Frames have
/// no identity beyond their contents and are built per transmission.
///
/// # Invariants
///
/// - `payload.len() <= MAX_PAYLOAD_LEN`
/// - A standard-format identifier is below `2^11`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: u32,
    payload: Bytes,
}

impl Frame {
    /// Build a frame from a raw identifier word, as delivered by a bus driver.
    pub fn new(id: u32, payload: impl Into<Bytes>) -> crate::Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtoError::PayloadTooLong { len: payload.len(), max: MAX_PAYLOAD_LEN });
        }
        if !is_extended(id) && id > u32::from(BaseId::MAX) {
            return Err(ProtoError::StandardIdOutOfRange { value: id });
        }
        Ok(Self { id, payload })
    }

    /// Extended frame carrying a 64-bit value as 8 little-endian bytes.
    pub fn extended_value(id: ExtendedId, value: u64) -> Self {
        Self { id: id.to_raw(), payload: Bytes::copy_from_slice(&value.to_le_bytes()) }
    }

    /// Standard frame with an empty payload.
    pub fn standard_empty(id: BaseId) -> Self {
        Self { id: u32::from(id.get()), payload: Bytes::new() }
    }

    /// Raw identifier word, extended marker included.
    pub fn raw_id(&self) -> u32 {
        self.id
    }

    /// Payload bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Data length code.
    #[allow(clippy::cast_possible_truncation)] // bounded by MAX_PAYLOAD_LEN
    pub fn dlc(&self) -> u8 {
        self.payload.len() as u8
    }

    /// True iff the extended-frame marker is set.
    pub fn is_extended(&self) -> bool {
        is_extended(self.id)
    }

    /// Classify the identifier as standard or extended.
    #[allow(clippy::cast_possible_truncation)] // standard ids are validated to 11 bits
    pub fn frame_id(&self) -> FrameId {
        if self.is_extended() {
            FrameId::Extended(decode_extended(self.id))
        } else {
            FrameId::Standard(self.id as u16)
        }
    }

    /// Payload interpreted as a little-endian `u64`, zero-extended when
    /// shorter than 8 bytes.
    pub fn value(&self) -> u64 {
        let mut bytes = [0u8; MAX_PAYLOAD_LEN];
        bytes[..self.payload.len()].copy_from_slice(&self.payload);
        u64::from_le_bytes(bytes)
    }
}
