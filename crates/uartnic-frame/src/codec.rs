use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::MessageType;
use crate::token::TOKEN_LEN;

/// Largest `Packet` payload accepted from the wire.
pub const MAX_PACKET_SIZE: usize = 2000;

/// A decoded protocol message.
#[derive(Clone, PartialEq, Eq)]
pub enum Message {
    DeviceInfo {
        firmware_version: u16,
        mac: [u8; 6],
    },
    LinkStatus {
        up: bool,
    },
    GetLinkStatus,
    /// Credentials; the password is redacted in debug output.
    ClientConfig {
        ssid: Bytes,
        password: Bytes,
    },
    Packet(Bytes),
    SetResyncToken([u8; TOKEN_LEN]),
    /// Channel 255 requests a reboot; channels above 100 select a silent
    /// access point on `channel - 100`.
    StartAccessPoint {
        channel: u8,
    },
    Alive {
        code: u8,
    },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::DeviceInfo { .. } => MessageType::DeviceInfo,
            Message::LinkStatus { .. } => MessageType::LinkStatus,
            Message::GetLinkStatus => MessageType::GetLinkStatus,
            Message::ClientConfig { .. } => MessageType::ClientConfig,
            Message::Packet(_) => MessageType::Packet,
            Message::SetResyncToken(_) => MessageType::SetResyncToken,
            Message::StartAccessPoint { .. } => MessageType::StartAccessPoint,
            Message::Alive { .. } => MessageType::Alive,
        }
    }

    /// Payload size on the wire (everything after the type byte).
    pub fn payload_size(&self) -> usize {
        match self {
            Message::DeviceInfo { .. } => 8,
            Message::LinkStatus { .. } => 1,
            Message::GetLinkStatus => 0,
            Message::ClientConfig { ssid, password } => 2 + ssid.len() + password.len(),
            Message::Packet(data) => 4 + data.len(),
            Message::SetResyncToken(_) => TOKEN_LEN,
            Message::StartAccessPoint { .. } => 1,
            Message::Alive { .. } => 1,
        }
    }

    /// Total frame size on the wire: token + type byte + payload.
    pub fn wire_size(&self) -> usize {
        TOKEN_LEN + 1 + self.payload_size()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::DeviceInfo {
                firmware_version,
                mac,
            } => f
                .debug_struct("DeviceInfo")
                .field("firmware_version", firmware_version)
                .field("mac", &format_args!("{mac:02x?}"))
                .finish(),
            Message::LinkStatus { up } => f.debug_struct("LinkStatus").field("up", up).finish(),
            Message::GetLinkStatus => f.write_str("GetLinkStatus"),
            Message::ClientConfig { ssid, password } => f
                .debug_struct("ClientConfig")
                .field("ssid", &String::from_utf8_lossy(ssid))
                .field(
                    "password",
                    &format_args!("<redacted:{} bytes>", password.len()),
                )
                .finish(),
            Message::Packet(data) => f
                .debug_struct("Packet")
                .field("len", &data.len())
                .finish(),
            Message::SetResyncToken(token) => f
                .debug_tuple("SetResyncToken")
                .field(&format_args!("{token:02x?}"))
                .finish(),
            Message::StartAccessPoint { channel } => f
                .debug_struct("StartAccessPoint")
                .field("channel", channel)
                .finish(),
            Message::Alive { code } => f.debug_struct("Alive").field("code", code).finish(),
        }
    }
}

/// Encode one frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────┬──────────┬──────────────────────────────┐
/// │ Token (8B)     │ Type (1B)│ Payload (type specific)      │
/// │ UN 0 1 2 3 4 5 │          │ integers little-endian       │
/// └────────────────┴──────────┴──────────────────────────────┘
/// ```
pub fn encode_message(token: &[u8; TOKEN_LEN], message: &Message, dst: &mut BytesMut) -> Result<()> {
    match message {
        Message::ClientConfig { ssid, password } => {
            check_u8_len(ssid.len())?;
            check_u8_len(password.len())?;
        }
        Message::Packet(data) if data.len() > u32::MAX as usize => {
            return Err(FrameError::PayloadTooLarge {
                size: data.len(),
                max: u32::MAX as usize,
            });
        }
        _ => {}
    }

    dst.reserve(message.wire_size());
    dst.put_slice(token);
    dst.put_u8(message.message_type().as_u8());

    match message {
        Message::DeviceInfo {
            firmware_version,
            mac,
        } => {
            dst.put_u16_le(*firmware_version);
            dst.put_slice(mac);
        }
        Message::LinkStatus { up } => dst.put_u8(u8::from(*up)),
        Message::GetLinkStatus => {}
        Message::ClientConfig { ssid, password } => {
            dst.put_u8(ssid.len() as u8);
            dst.put_slice(ssid);
            dst.put_u8(password.len() as u8);
            dst.put_slice(password);
        }
        Message::Packet(data) => {
            dst.put_u32_le(data.len() as u32);
            dst.put_slice(data);
        }
        Message::SetResyncToken(new_token) => dst.put_slice(new_token),
        Message::StartAccessPoint { channel } => dst.put_u8(*channel),
        Message::Alive { code } => dst.put_u8(*code),
    }
    Ok(())
}

fn check_u8_len(len: usize) -> Result<()> {
    if len > u8::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: u8::MAX as usize,
        });
    }
    Ok(())
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum `Packet` payload size in bytes. Default: 2000.
    pub max_packet_size: usize,
    /// SSID bytes kept from a `ClientConfig`; the rest is drained. Default: 32.
    pub max_ssid_len: usize,
    /// Password bytes kept from a `ClientConfig`; the rest is drained. Default: 64.
    pub max_password_len: usize,
    /// Retry reads that hit the transport timeout instead of reporting them.
    /// The bridge waits forever for the next frame; host tools that need a
    /// deadline turn this off.
    pub retry_on_timeout: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
            max_ssid_len: 32,
            max_password_len: 64,
            retry_on_timeout: true,
        }
    }
}
