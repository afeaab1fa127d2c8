use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};

use crate::codec::{encode_message, FrameConfig, Message};
use crate::error::{FrameError, Result};
use crate::message::MessageType;
use crate::token::{ResyncToken, TOKEN_LEN};

const INITIAL_BUFFER_CAPACITY: usize = 2 * 1024 + 64;

/// Writes complete frames to any `Write` stream.
///
/// Every frame is encoded into one buffer and written with a single
/// write loop, so callers that serialize access to the writer never
/// interleave bytes of different frames.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    token: ResyncToken,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a writer with its own default token and configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ResyncToken::default(), FrameConfig::default())
    }

    /// Create a writer sharing `token` with other readers and writers.
    pub fn with_token(inner: T, token: ResyncToken) -> Self {
        Self::with_config(inner, token, FrameConfig::default())
    }

    /// Create a writer with explicit token and configuration.
    pub fn with_config(inner: T, token: ResyncToken, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            token,
            config,
        }
    }

    /// Encode and send one message, prefixed with the current token.
    ///
    /// After a `SetResyncToken` has been written the new token is installed,
    /// so every later frame (from any holder of the token) uses it.
    ///
    /// `max_packet_size` only bounds what the reader accepts; outgoing
    /// packets are limited by the `u32` length field alone.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        self.buf.clear();
        encode_message(&self.token.get(), message, &mut self.buf)?;
        self.write_buf()?;

        if let Message::SetResyncToken(new_token) = message {
            self.token.set(*new_token);
        }
        Ok(())
    }

    /// Send a `Packet` frame straight from a borrowed payload.
    pub fn send_packet(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| FrameError::PayloadTooLarge {
            size: data.len(),
            max: u32::MAX as usize,
        })?;

        self.buf.clear();
        self.buf.reserve(TOKEN_LEN + 1 + 4 + data.len());
        self.buf.put_slice(&self.token.get());
        self.buf.put_u8(MessageType::Packet.as_u8());
        self.buf.put_u32_le(len);
        self.buf.put_slice(data);
        self.write_buf()
    }

    fn write_buf(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// The token prefixed to outgoing frames.
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
