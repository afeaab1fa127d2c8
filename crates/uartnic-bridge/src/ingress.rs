//! Radio → serial pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, info, trace, warn};
use uartnic_frame::Message;
use uartnic_transport::{Interface, MacAddress, RadioEvent, RxBuffer};

use crate::bridge::Bridge;
use crate::buffer::PacketBuffer;
use crate::health::LinkHealth;
use crate::queue::PacketQueue;
use crate::stats::BridgeStats;

/// Whether a received frame is for us: group-addressed (broadcast or
/// multicast) or unicast to the station MAC.
pub fn accepts(frame: &[u8], station_mac: &MacAddress) -> bool {
    match frame.first() {
        None => false,
        Some(first) if first & 0x01 != 0 => true,
        Some(_) => frame.len() >= 6 && frame[..6] == station_mac[..],
    }
}

/// Last known station MAC, readable without locking.
#[derive(Debug, Default)]
pub(crate) struct StationMac(AtomicU64);

impl StationMac {
    pub(crate) fn get(&self) -> MacAddress {
        let raw = self.0.load(Ordering::Acquire).to_le_bytes();
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&raw[..6]);
        mac
    }

    pub(crate) fn set(&self, mac: MacAddress) {
        let mut raw = [0u8; 8];
        raw[..6].copy_from_slice(&mac);
        self.0.store(u64::from_le_bytes(raw), Ordering::Release);
    }
}

/// Entry points for radio driver callbacks.
///
/// Both methods return immediately: received frames are filtered and queued,
/// events are handed to the bridge's event task.
#[derive(Clone)]
pub struct RadioSink {
    pub(crate) health: Arc<LinkHealth>,
    pub(crate) queue: PacketQueue,
    pub(crate) events: Sender<RadioEvent>,
    pub(crate) station_mac: Arc<StationMac>,
    pub(crate) stats: Arc<BridgeStats>,
}

impl RadioSink {
    /// A frame arrived on the station interface. Ownership of the driver
    /// buffer passes to the bridge.
    pub fn on_frame(&self, frame: Box<dyn RxBuffer>) {
        // Any traffic at all proves the link is alive.
        self.health.touch();

        if !accepts(frame.as_bytes(), &self.station_mac.get()) {
            self.stats.record_rx_filtered();
            return;
        }
        if self.queue.try_push(PacketBuffer::from_radio(frame)).is_err() {
            self.stats.record_ingress_dropped();
        }
    }

    /// The driver raised an event.
    pub fn on_event(&self, event: RadioEvent) {
        if self.events.send(event).is_err() {
            debug!("bridge stopped, dropping radio event");
        }
    }
}

impl std::fmt::Debug for RadioSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioSink")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Tell the host who we are. Falls back to the last known MAC when the
    /// driver cannot report one.
    pub(crate) fn send_device_info(&self) {
        match self.radio.mac(Interface::Station) {
            Ok(mac) => self.station_mac.set(mac),
            Err(err) => warn!(error = %err, "failed to read station MAC, reporting last known"),
        }
        let message = Message::DeviceInfo {
            firmware_version: self.config.firmware_version,
            mac: self.station_mac.get(),
        };
        info!(?message, "sending device info");
        self.uplink.send_logged(&message, &self.stats);
    }

    pub(crate) fn run_ingress_drain(&self) {
        self.send_device_info();
        info!("ingress drain started");

        while self.is_running() {
            let Some(buffer) = self.ingress.pop_timeout(self.config.poll_interval) else {
                continue;
            };
            trace!(len = buffer.len(), "forwarding packet to host");
            match self.uplink.send_packet(buffer.as_bytes()) {
                Ok(()) => {
                    self.stats.record_frame_to_host();
                    self.stats.record_packet_to_host();
                }
                Err(err) => {
                    self.stats.record_uplink_error();
                    warn!(error = %err, "failed to forward packet to host");
                }
            }
            drop(buffer);
        }
        debug!("ingress drain stopped");
    }
}
