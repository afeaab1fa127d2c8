/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size. When decoding, the
    /// declared bytes have already been drained from the stream.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// No memory for the payload buffer. The declared bytes have already
    /// been drained from the stream.
    #[error("out of memory for {size} byte payload")]
    OutOfMemory { size: usize },

    /// The message type byte is not part of the protocol.
    #[error("unknown message type {0}")]
    UnknownType(u8),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the reader is still aligned on a frame boundary after this
    /// error, so the caller can log it and read the next frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::PayloadTooLarge { .. }
                | FrameError::OutOfMemory { .. }
                | FrameError::UnknownType(_)
        )
    }
}

impl From<uartnic_transport::TransportError> for FrameError {
    fn from(err: uartnic_transport::TransportError) -> Self {
        use uartnic_transport::TransportError;
        match err {
            TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                FrameError::Io(source)
            }
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
