/// Errors that can occur while running the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Serial link error.
    #[error("transport error: {0}")]
    Transport(#[from] uartnic_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] uartnic_frame::FrameError),

    /// Radio driver error.
    #[error("radio error: {0}")]
    Radio(#[from] uartnic_transport::RadioError),

    /// A hand-off queue is full; the buffer has been released.
    #[error("{0} queue full")]
    QueueFull(&'static str),

    /// Failed to spawn a bridge thread.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// A bridge thread panicked.
    #[error("{0} thread panicked")]
    Panicked(&'static str),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
