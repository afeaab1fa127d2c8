use std::io::{ErrorKind, Read};

use bytes::Bytes;
use tracing::{trace, warn};
use uartnic_transport::SerialStream;

use crate::codec::{FrameConfig, Message};
use crate::error::{FrameError, Result};
use crate::message::MessageType;
use crate::token::{ResyncToken, TokenMatcher, TOKEN_LEN};

const DRAIN_CHUNK_SIZE: usize = 256;

/// Reads frames from any `Read` stream.
///
/// Reading is split into the same steps the bridge's read loop performs:
/// [`resync`](Self::resync), [`read_type`](Self::read_type) and
/// [`read_body`](Self::read_body). [`read_message`](Self::read_message)
/// runs all three.
pub struct FrameReader<T> {
    inner: T,
    token: ResyncToken,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a reader with its own default token and configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ResyncToken::default(), FrameConfig::default())
    }

    /// Create a reader sharing `token` with other readers and writers.
    pub fn with_token(inner: T, token: ResyncToken) -> Self {
        Self::with_config(inner, token, FrameConfig::default())
    }

    /// Create a reader with explicit token and configuration.
    pub fn with_config(inner: T, token: ResyncToken, config: FrameConfig) -> Self {
        Self {
            inner,
            token,
            config,
        }
    }

    /// Read and decode the next frame (blocking).
    pub fn read_message(&mut self) -> Result<Message> {
        self.resync()?;
        let message_type = self.read_type()?;
        self.read_body(message_type)
    }

    /// Consume input up to and including the next occurrence of the token.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn resync(&mut self) -> Result<()> {
        let token = self.token.get();
        let mut matcher = TokenMatcher::new();
        let mut skipped = 0usize;
        loop {
            let byte = self.read_u8()?;
            if matcher.push(byte, &token) {
                break;
            }
            if matcher.matched() == 0 {
                skipped += 1;
            }
        }
        if skipped > 0 {
            trace!(skipped, "resynchronized on token");
        }
        Ok(())
    }

    /// Read the type byte that follows the token.
    pub fn read_type(&mut self) -> Result<u8> {
        self.read_u8()
    }

    /// Read the payload of a message of type `message_type`.
    ///
    /// Length-prefixed payloads are always consumed in full, even when they
    /// are rejected, so the next [`resync`](Self::resync) starts on a frame
    /// boundary. Rejections are reported as recoverable errors
    /// ([`FrameError::is_recoverable`]).
    pub fn read_body(&mut self, message_type: u8) -> Result<Message> {
        let message_type =
            MessageType::try_from(message_type).map_err(FrameError::UnknownType)?;
        match message_type {
            MessageType::DeviceInfo => {
                let firmware_version = self.read_u16_le()?;
                let mut mac = [0u8; 6];
                self.read_exact(&mut mac)?;
                Ok(Message::DeviceInfo {
                    firmware_version,
                    mac,
                })
            }
            MessageType::LinkStatus => Ok(Message::LinkStatus {
                up: self.read_u8()? != 0,
            }),
            MessageType::GetLinkStatus => Ok(Message::GetLinkStatus),
            MessageType::ClientConfig => {
                let ssid = self.read_clamped("ssid", self.config.max_ssid_len)?;
                let password = self.read_clamped("password", self.config.max_password_len)?;
                Ok(Message::ClientConfig { ssid, password })
            }
            MessageType::Packet => self.read_packet(),
            MessageType::SetResyncToken => {
                let mut token = [0u8; TOKEN_LEN];
                self.read_exact(&mut token)?;
                Ok(Message::SetResyncToken(token))
            }
            MessageType::StartAccessPoint => Ok(Message::StartAccessPoint {
                channel: self.read_u8()?,
            }),
            MessageType::Alive => Ok(Message::Alive {
                code: self.read_u8()?,
            }),
        }
    }

    fn read_packet(&mut self) -> Result<Message> {
        let size = self.read_u32_le()? as usize;
        if size > self.config.max_packet_size {
            self.drain(size)?;
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.config.max_packet_size,
            });
        }

        let mut data = Vec::new();
        if data.try_reserve_exact(size).is_err() {
            self.drain(size)?;
            return Err(FrameError::OutOfMemory { size });
        }
        data.resize(size, 0);
        self.read_exact(&mut data)?;
        Ok(Message::Packet(Bytes::from(data)))
    }

    /// Read a u8 length-prefixed field, keeping at most `max` bytes and
    /// draining whatever the peer declared beyond that.
    fn read_clamped(&mut self, field: &'static str, max: usize) -> Result<Bytes> {
        let declared = usize::from(self.read_u8()?);
        let keep = declared.min(max);
        let mut data = vec![0u8; keep];
        self.read_exact(&mut data)?;
        if declared > keep {
            warn!(field, declared, max, "field too long, trimming");
            self.drain(declared - keep)?;
        }
        Ok(Bytes::from(data))
    }

    /// Discard exactly `len` bytes.
    fn drain(&mut self, len: usize) -> Result<()> {
        let mut chunk = [0u8; DRAIN_CHUNK_SIZE];
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(DRAIN_CHUNK_SIZE);
            self.read_exact(&mut chunk[..n])?;
            remaining -= n;
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_u16_le(&mut self) -> Result<u16> {
        let mut raw = [0u8; 2];
        self.read_exact(&mut raw)?;
        Ok(u16::from_le_bytes(raw))
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        self.read_exact(&mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if self.config.retry_on_timeout
                        && matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    trace!("serial read timed out, waiting");
                    continue;
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// The token this reader scans for.
    pub fn token(&self) -> &ResyncToken {
        &self.token
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<SerialStream> {
    /// Create a reader for a serial link, applying `timeout` as the link's
    /// read timeout.
    pub fn with_serial(
        mut inner: SerialStream,
        token: ResyncToken,
        config: FrameConfig,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        inner.set_read_timeout(timeout)?;
        Ok(Self::with_config(inner, token, config))
    }
}
