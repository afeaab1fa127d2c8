use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// Serial line settings for device-backed streams.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line speed. The bridge firmware runs its UART at 4.6 Mbaud.
    pub baud_rate: u32,
    /// Driver-level read timeout. Reads that time out are retried by the
    /// frame reader, so this only bounds how long a single read call blocks.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 4_600_000,
            timeout: Duration::from_millis(500),
        }
    }
}

/// A serial link to the peer. Implements Read + Write.
///
/// Either a real serial device or a unix socket standing in for one
/// (host simulation and tests).
pub struct SerialStream {
    inner: SerialStreamInner,
}

enum SerialStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Port(Box<dyn serialport::SerialPort>),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.read(buf),
            SerialStreamInner::Port(port) => port.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.write(buf),
            SerialStreamInner::Port(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.flush(),
            SerialStreamInner::Port(port) => port.flush(),
        }
    }
}

impl SerialStream {
    /// Open `path` as a serial link.
    ///
    /// A path naming a unix socket connects to a pseudo serial port (see
    /// [`SocketSerial`](crate::SocketSerial)); anything else is opened as a
    /// serial device with 8N1 framing and no flow control.
    pub fn open(path: impl AsRef<Path>, config: &SerialConfig) -> Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            let is_socket = std::fs::metadata(path)
                .map(|meta| meta.file_type().is_socket())
                .unwrap_or(false);
            if is_socket {
                return crate::socket::SocketSerial::connect(path);
            }
        }

        Self::open_device(path, config)
    }

    /// Open a serial device.
    pub fn open_device(path: impl AsRef<Path>, config: &SerialConfig) -> Result<Self> {
        let path = path.as_ref();
        let port = serialport::new(path.to_string_lossy(), config.baud_rate)
            .timeout(config.timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(?path, baud = config.baud_rate, "opened serial device");
        Ok(Self {
            inner: SerialStreamInner::Port(port),
        })
    }

    /// A connected pair of in-memory serial ends.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: SerialStreamInner::Unix(stream),
        }
    }

    /// Set the read timeout on the underlying link.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => {
                stream.set_read_timeout(Some(timeout)).map_err(Into::into)
            }
            SerialStreamInner::Port(port) => port.set_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream so reads and writes can live on different threads.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            SerialStreamInner::Port(port) => Ok(Self {
                inner: SerialStreamInner::Port(port.try_clone()?),
            }),
        }
    }

    /// Transport name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Unix(_) => "unix-socket",
            SerialStreamInner::Port(_) => "serial-device",
        }
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialStream")
            .field("type", &self.kind())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn pair_carries_bytes_both_ways() {
        let (mut left, mut right) = SerialStream::pair().unwrap();
        left.write_all(b"UN").unwrap();
        let mut buf = [0u8; 2];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"UN");

        right.write_all(&[7, 41]).unwrap();
        left.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [7, 41]);
    }

    #[test]
    fn clone_shares_the_link() {
        let (left, mut right) = SerialStream::pair().unwrap();
        let mut writer = left.try_clone().unwrap();
        writer.write_all(b"x").unwrap();
        let mut buf = [0u8; 1];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
        assert_eq!(left.kind(), "unix-socket");
    }

    #[test]
    fn read_timeout_surfaces_as_io_error() {
        let (mut left, _right) = SerialStream::pair().unwrap();
        left.set_read_timeout(Duration::from_millis(10)).unwrap();
        let mut buf = [0u8; 1];
        let err = left.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn open_missing_device_fails() {
        let err = SerialStream::open(
            "/nonexistent/uartnic-tty",
            &SerialConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }
}
