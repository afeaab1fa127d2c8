use std::path::PathBuf;

/// Errors that can occur while opening or using the serial link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a serial device.
    #[error("failed to open serial device {path}: {source}")]
    Open {
        path: PathBuf,
        source: serialport::Error,
    },

    /// Failed to bind a pseudo serial socket.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a pseudo serial socket.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the serial stream.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Driver-level serial port failure (timeouts, settings).
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors reported by a radio driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RadioError {
    /// The station is not associated with an access point.
    #[error("station not associated")]
    NotConnected,

    /// The driver rejected an operation.
    #[error("radio driver failed in {op} (code {code})")]
    Driver { op: &'static str, code: i32 },

    /// The driver is out of buffers or memory.
    #[error("radio driver out of memory")]
    NoMem,

    /// The operation is not available in the current radio mode.
    #[error("operation not supported in current mode: {0}")]
    InvalidMode(&'static str),
}

pub type RadioResult<T> = std::result::Result<T, RadioError>;
