use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tracing::{trace, warn};
use uartnic_frame::{FrameConfig, FrameWriter, Message, ResyncToken};

use crate::error::Result;
use crate::stats::BridgeStats;

/// The bridge's side of the serial link towards the host.
///
/// Every sender in the bridge shares one writer. The lock is held for a
/// whole frame, so frames from different threads never interleave.
pub struct Uplink {
    writer: Mutex<FrameWriter<Box<dyn Write + Send>>>,
}

impl Uplink {
    pub fn new(inner: Box<dyn Write + Send>, token: ResyncToken, config: FrameConfig) -> Self {
        Self {
            writer: Mutex::new(FrameWriter::with_config(inner, token, config)),
        }
    }

    /// Send one frame to the host.
    pub fn send(&self, message: &Message) -> Result<()> {
        // A poisoned lock may have left a truncated frame; the host resyncs past it.
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.send(message)?;
        trace!(message = message.message_type().name(), "sent frame to host");
        Ok(())
    }

    /// Forward a radio frame to the host without copying it.
    pub fn send_packet(&self, data: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.send_packet(data)?;
        trace!(len = data.len(), "sent packet to host");
        Ok(())
    }

    /// Send a frame, logging instead of returning failures.
    pub(crate) fn send_logged(&self, message: &Message, stats: &BridgeStats) {
        match self.send(message) {
            Ok(()) => stats.record_frame_to_host(),
            Err(err) => {
                stats.record_uplink_error();
                warn!(
                    message = message.message_type().name(),
                    error = %err,
                    "failed to send frame to host"
                );
            }
        }
    }
}

impl std::fmt::Debug for Uplink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uplink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use bytes::Bytes;
    use uartnic_frame::FrameReader;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            // Tiny writes make interleaving likely if the lock were per write.
            let n = buf.len().min(2);
            self.0.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn concurrent_frames_do_not_interleave() {
        let sink = SharedSink::default();
        let uplink = Arc::new(Uplink::new(
            Box::new(sink.clone()),
            ResyncToken::default(),
            FrameConfig::default(),
        ));

        let workers: Vec<_> = (0..4u8)
            .map(|id| {
                let uplink = Arc::clone(&uplink);
                thread::spawn(move || {
                    for _ in 0..25 {
                        uplink
                            .send(&Message::Packet(Bytes::from(vec![id; 40])))
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let wire = sink.0.lock().unwrap().clone();
        let mut reader = FrameReader::new(Cursor::new(wire));
        for _ in 0..100 {
            match reader.read_message().unwrap() {
                Message::Packet(data) => {
                    assert_eq!(data.len(), 40);
                    assert!(data.iter().all(|b| *b == data[0]));
                }
                other => panic!("unexpected message {other:?}"),
            }
        }
    }
}
