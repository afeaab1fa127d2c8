//! Protocol message types.
//!
//! Type values are fixed by the protocol and must never be renumbered.

use std::fmt;

/// Message type byte following the resync token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Bridge → host: firmware version and station MAC.
    DeviceInfo = 0,
    /// Bridge → host: link up/down.
    LinkStatus = 1,
    /// Host → bridge: query link status.
    GetLinkStatus = 2,
    /// Host → bridge: station credentials.
    ClientConfig = 3,
    /// Both directions: one raw network packet.
    Packet = 4,
    /// Host → bridge: replace the resync token.
    SetResyncToken = 5,
    /// Host → bridge: switch to diagnostic access point mode (or reboot).
    StartAccessPoint = 6,
    /// Bridge → host: diagnostic progress code.
    Alive = 7,
}

impl MessageType {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::DeviceInfo => "DEVICE_INFO",
            Self::LinkStatus => "LINK_STATUS",
            Self::GetLinkStatus => "GET_LINK_STATUS",
            Self::ClientConfig => "CLIENT_CONFIG",
            Self::Packet => "PACKET",
            Self::SetResyncToken => "SET_RESYNC_TOKEN",
            Self::StartAccessPoint => "START_ACCESS_POINT",
            Self::Alive => "ALIVE",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::DeviceInfo,
            1 => Self::LinkStatus,
            2 => Self::GetLinkStatus,
            3 => Self::ClientConfig,
            4 => Self::Packet,
            5 => Self::SetResyncToken,
            6 => Self::StartAccessPoint,
            7 => Self::Alive,
            other => return Err(other),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns a human-readable name for a raw type byte.
pub fn message_name(value: u8) -> &'static str {
    MessageType::try_from(value)
        .map(MessageType::name)
        .unwrap_or("UNKNOWN")
}
