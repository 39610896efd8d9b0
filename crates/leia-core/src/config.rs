//! Node configuration.
//!
//! Everything here is fixed at initialization. Loading these values from
//! storage is the integrator's job; the core only validates them.

use std::fmt;

use leia_proto::BaseId;
use thiserror::Error;

/// Errors from building a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A channel identifier does not fit in 11 bits.
    #[error("{channel} channel id {value:#x} exceeds 11 bits")]
    ChannelOutOfRange {
        /// Which channel was misconfigured.
        channel: Channel,
        /// Offending value.
        value: u16,
    },

    /// Two channels share an identifier, so frames could not be told apart.
    #[error("{first} and {second} channels share id {value:#05x}")]
    DuplicateChannel {
        /// First channel using the id.
        first: Channel,
        /// Second channel using the id.
        second: Channel,
        /// Shared identifier.
        value: u16,
    },
}

/// Logical channel role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Carries Data and Epoch frames.
    Data,
    /// Carries Mac and EpochMac frames.
    Mac,
    /// Carries Auth-Fail notifications (standard frames).
    Fail,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::Mac => f.write_str("mac"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

/// The three configured channel identifiers.
///
/// This is the single source of truth for both the encode path (which base id
/// goes into an outgoing identifier) and the decode path (which received base
/// id belongs to which role).
///
/// # Invariants
///
/// - All three ids fit in 11 bits
/// - All three ids are distinct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channels {
    data: BaseId,
    mac: BaseId,
    fail: BaseId,
}

impl Channels {
    /// Validate and bundle the channel identifiers.
    pub fn new(data: u16, mac: u16, fail: u16) -> Result<Self, ConfigError> {
        let checked = |channel: Channel, value: u16| {
            BaseId::new(value).map_err(|_| ConfigError::ChannelOutOfRange { channel, value })
        };
        let channels = Self {
            data: checked(Channel::Data, data)?,
            mac: checked(Channel::Mac, mac)?,
            fail: checked(Channel::Fail, fail)?,
        };

        let pairs = [
            (Channel::Data, data, Channel::Mac, mac),
            (Channel::Data, data, Channel::Fail, fail),
            (Channel::Mac, mac, Channel::Fail, fail),
        ];
        for (first, a, second, b) in pairs {
            if a == b {
                return Err(ConfigError::DuplicateChannel { first, second, value: a });
            }
        }

        Ok(channels)
    }

    /// Data/Epoch channel.
    pub fn data(&self) -> BaseId {
        self.data
    }

    /// Mac/EpochMac channel.
    pub fn mac(&self) -> BaseId {
        self.mac
    }

    /// Auth-Fail channel.
    pub fn fail(&self) -> BaseId {
        self.fail
    }

    /// Role of a received base id, or `None` for foreign traffic.
    pub fn role_of(&self, base: BaseId) -> Option<Channel> {
        if base == self.data {
            Some(Channel::Data)
        } else if base == self.mac {
            Some(Channel::Mac)
        } else if base == self.fail {
            Some(Channel::Fail)
        } else {
            None
        }
    }
}

/// What to do when the bus collaborator reports a failed transmission.
///
/// No policy waits between attempts: the core has no clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransmitPolicy {
    /// Single attempt; a failure aborts the current pair.
    #[default]
    BestEffort,

    /// Retry immediately up to `max_attempts` total attempts per frame.
    Retry {
        /// Total attempts including the first. Zero is treated as one.
        max_attempts: u32,
    },
}

impl TransmitPolicy {
    /// Total attempts per frame, never zero.
    pub fn max_attempts(self) -> u32 {
        match self {
            Self::BestEffort => 1,
            Self::Retry { max_attempts } => max_attempts.max(1),
        }
    }
}

/// Static configuration of one node.
///
/// # Security
///
/// - **Debug Redaction**: the `Debug` impl hides `shared_key`.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Channel identifiers shared by both peers.
    pub channels: Channels,
    /// Pre-distributed 64-bit key.
    pub shared_key: u64,
    /// Payload value held before the first submission.
    pub initial_data: u64,
    /// Reaction to transmit failures.
    pub transmit_policy: TransmitPolicy,
}

impl NodeConfig {
    /// Configuration with zero initial payload and best-effort transmission.
    pub fn new(channels: Channels, shared_key: u64) -> Self {
        Self { channels, shared_key, initial_data: 0, transmit_policy: TransmitPolicy::default() }
    }

    /// Values used by the reference firmware: channels `0x100`/`0x101`/`0x102`,
    /// shared key `10`, initial payload `0x55`.
    pub fn reference() -> Self {
        let channels = Channels {
            data: BaseId::masked(0x100),
            mac: BaseId::masked(0x101),
            fail: BaseId::masked(0x102),
        };
        Self::new(channels, 10).with_initial_data(0x55)
    }

    /// Set the initial payload.
    #[must_use]
    pub fn with_initial_data(mut self, data: u64) -> Self {
        self.initial_data = data;
        self
    }

    /// Set the transmit policy.
    #[must_use]
    pub fn with_transmit_policy(mut self, policy: TransmitPolicy) -> Self {
        self.transmit_policy = policy;
        self
    }
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("channels", &self.channels)
            .field("shared_key", &"<redacted>")
            .field("initial_data", &self.initial_data)
            .field("transmit_policy", &self.transmit_policy)
            .finish()
    }
}
