use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::SerialStream;

/// Pseudo serial port backed by a unix domain socket.
///
/// The simulator binds one of these where a real bridge would expose a UART;
/// host tools then open the socket path exactly like a serial device.
pub struct SocketSerial {
    listener: UnixListener,
    path: PathBuf,
}

impl SocketSerial {
    /// Maximum socket path length (`sockaddr_un.sun_path`).
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind the pseudo serial port at `path`.
    ///
    /// A stale socket left at `path` is removed first; any other kind of file
    /// is left alone and reported as a bind error.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(TransportError::Bind {
                    path,
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(|source| TransportError::Bind {
                path: path.clone(),
                source,
            })?;
        }

        let listener = UnixListener::bind(&path).map_err(|source| TransportError::Bind {
            path: path.clone(),
            source,
        })?;

        info!(?path, "pseudo serial port listening");
        Ok(Self { listener, path })
    }

    /// Wait for the peer to open the port (blocking).
    pub fn accept(&self) -> Result<SerialStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "peer opened pseudo serial port");
        Ok(SerialStream::from_unix(stream))
    }

    /// Switch the listener between blocking and non-blocking accepts.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener
            .set_nonblocking(nonblocking)
            .map_err(TransportError::Accept)
    }

    /// Accept a waiting peer, or `None` if nobody is waiting.
    ///
    /// Only useful after [`set_nonblocking(true)`](Self::set_nonblocking).
    /// The returned stream is always blocking.
    pub fn try_accept(&self) -> Result<Option<SerialStream>> {
        match self.listener.accept() {
            Ok((stream, _addr)) => {
                // BSD-derived systems hand out accepted sockets non-blocking.
                stream
                    .set_nonblocking(false)
                    .map_err(TransportError::Accept)?;
                debug!(path = ?self.path, "peer opened pseudo serial port");
                Ok(Some(SerialStream::from_unix(stream)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Open a pseudo serial port bound elsewhere (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<SerialStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "connected to pseudo serial port");
        Ok(SerialStream::from_unix(stream))
    }

    /// The path this port is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketSerial {
    fn drop(&mut self) {
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket() {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }
}
