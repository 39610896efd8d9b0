//! Outgoing frame builders and inbound frame classification.
//!
//! Classification turns a raw frame into an [`Inbound`] variant that carries
//! only the fields its command defines, so a handler can never read a value
//! left over from a different frame type.

use std::fmt;

use leia_proto::{BaseId, Command, ExtendedId, Frame, FrameId};

use crate::config::{Channel, Channels};

/// Frame types the node transmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Application payload.
    Data,
    /// Tag over the Data frame.
    Mac,
    /// Epoch announcement.
    Epoch,
    /// Tag over the Epoch frame.
    EpochMac,
    /// Standard-format failure notification.
    AuthFail,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "data",
            Self::Mac => "mac",
            Self::Epoch => "epoch",
            Self::EpochMac => "epoch-mac",
            Self::AuthFail => "auth-fail",
        };
        f.write_str(name)
    }
}

/// A received frame, classified against the configured channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Command 0 on the data channel.
    Data {
        /// Sender's sequence.
        sequence: u16,
        /// Payload value.
        data: u64,
    },
    /// Command 1 on the mac channel.
    Mac {
        /// Sender's sequence.
        sequence: u16,
        /// Received tag.
        tag: u64,
    },
    /// Command 2 on the data channel.
    Epoch {
        /// Sender's sequence.
        sequence: u16,
        /// Announced epoch.
        epoch: u64,
    },
    /// Command 3 on the mac channel.
    EpochMac {
        /// Sender's sequence.
        sequence: u16,
        /// Received tag.
        tag: u64,
    },
    /// Standard frame on the fail channel.
    AuthFail,
    /// Extended frame on one of our channels with a command that does not
    /// belong there.
    Unclassified {
        /// Channel the frame arrived on.
        base: BaseId,
        /// Command it carried.
        command: Command,
        /// Sequence it carried.
        sequence: u16,
    },
    /// Traffic for some other node.
    Foreign,
}

impl Inbound {
    /// Classify a raw frame.
    pub fn classify(frame: &Frame, channels: &Channels) -> Self {
        match frame.frame_id() {
            FrameId::Standard(id) if id == channels.fail().get() => Self::AuthFail,
            FrameId::Standard(_) => Self::Foreign,
            FrameId::Extended(ExtendedId { base, command, sequence }) => {
                let Some(role) = channels.role_of(base) else {
                    return Self::Foreign;
                };
                match (role, command) {
                    (Channel::Data, Command::Data) => Self::Data { sequence, data: frame.value() },
                    (Channel::Mac, Command::Mac) => Self::Mac { sequence, tag: frame.value() },
                    (Channel::Data, Command::Epoch) => {
                        Self::Epoch { sequence, epoch: frame.value() }
                    },
                    (Channel::Mac, Command::EpochMac) => {
                        Self::EpochMac { sequence, tag: frame.value() }
                    },
                    _ => Self::Unclassified { base, command, sequence },
                }
            },
        }
    }
}

pub(crate) fn data_frame(channels: &Channels, sequence: u16, data: u64) -> Frame {
    Frame::extended_value(ExtendedId::new(channels.data(), Command::Data, sequence), data)
}

pub(crate) fn mac_frame(channels: &Channels, sequence: u16, tag: u64) -> Frame {
    Frame::extended_value(ExtendedId::new(channels.mac(), Command::Mac, sequence), tag)
}

pub(crate) fn epoch_frame(channels: &Channels, sequence: u16, epoch: u64) -> Frame {
    Frame::extended_value(ExtendedId::new(channels.data(), Command::Epoch, sequence), epoch)
}

pub(crate) fn epoch_mac_frame(channels: &Channels, sequence: u16, tag: u64) -> Frame {
    Frame::extended_value(ExtendedId::new(channels.mac(), Command::EpochMac, sequence), tag)
}

pub(crate) fn auth_fail_frame(channels: &Channels) -> Frame {
    Frame::standard_empty(channels.fail())
}
