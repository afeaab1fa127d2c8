//! Serial → radio pipeline.

use std::io::Read;
use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use uartnic_frame::{message_name, FrameError, FrameReader, Message};
use uartnic_transport::Interface;

use crate::bridge::Bridge;
use crate::buffer::PacketBuffer;
use crate::error::{BridgeError, Result};

impl Bridge {
    /// Read and dispatch host frames until the link closes or a reboot is
    /// requested.
    pub(crate) fn run_read_loop<R: Read>(self: &Arc<Self>, mut reader: FrameReader<R>) -> Result<()> {
        info!("serial read loop started");
        let result = self.read_frames(&mut reader);
        self.stop();
        match result {
            Err(BridgeError::Frame(FrameError::ConnectionClosed)) => {
                info!("serial link closed");
                Ok(())
            }
            other => other,
        }
    }

    fn read_frames<R: Read>(self: &Arc<Self>, reader: &mut FrameReader<R>) -> Result<()> {
        while self.is_running() {
            reader.resync()?;

            // Host frames drive the inactivity check.
            if let Some(action) = self.health.check() {
                self.apply(action);
            }

            let message_type = reader.read_type()?;
            let message = match reader.read_body(message_type) {
                Ok(message) => message,
                Err(err) if err.is_recoverable() => {
                    self.record_rejected(&err);
                    warn!(
                        message = message_name(message_type),
                        error = %err,
                        "dropping frame from host"
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            self.stats.record_frame_from_host();
            if self.dispatch(message).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn record_rejected(&self, err: &FrameError) {
        match err {
            FrameError::PayloadTooLarge { .. } => self.stats.record_oversized(),
            FrameError::OutOfMemory { .. } => self.stats.record_out_of_memory(),
            FrameError::UnknownType(_) => self.stats.record_unknown_type(),
            _ => {}
        }
    }

    fn dispatch(self: &Arc<Self>, message: Message) -> ControlFlow<()> {
        trace!(message = message.message_type().name(), "frame from host");
        match message {
            Message::Packet(data) => {
                if self
                    .egress
                    .try_push(PacketBuffer::from_heap(data))
                    .is_err()
                {
                    self.stats.record_egress_dropped();
                    warn!("egress queue full, dropping packet");
                }
            }
            Message::ClientConfig { ssid, password } => self.configure_station(&ssid, &password),
            Message::GetLinkStatus => self.report_link_status(),
            Message::SetResyncToken(token) => self.set_resync_token(token),
            Message::StartAccessPoint { channel } => return self.request_access_point(channel),
            other @ (Message::DeviceInfo { .. } | Message::LinkStatus { .. } | Message::Alive { .. }) => {
                warn!(message = ?other, "ignoring bridge-to-host message sent by host");
            }
        }
        ControlFlow::Continue(())
    }

    pub(crate) fn run_egress_drain(&self) {
        info!("egress drain started");
        while self.is_running() {
            let Some(buffer) = self.egress.pop_timeout(self.config.poll_interval) else {
                continue;
            };
            match self.radio.transmit(Interface::Station, buffer.as_bytes()) {
                Ok(()) => self.stats.record_packet_to_radio(),
                Err(err) => {
                    self.stats.record_transmit_failed();
                    warn!(len = buffer.len(), error = %err, "radio transmit failed");
                }
            }
            drop(buffer);
        }
        debug!("egress drain stopped");
    }
}
