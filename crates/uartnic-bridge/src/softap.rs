//! Diagnostic soft access point.
//!
//! On request the bridge abandons station mode and brings up a hidden open
//! access point. Unless silent, it then broadcasts a small fixed frame every
//! tick so the radio path can be checked with a sniffer, and reports progress
//! to the host with `Alive` codes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, trace, warn};
use uartnic_frame::Message;
use uartnic_transport::{AccessPointConfig, AuthMode, Interface, MacAddress, BROADCAST_MAC};

use crate::bridge::Bridge;

/// `Alive` codes reported while switching to access point mode.
pub mod alive {
    /// Access point request received.
    pub const REQUEST_RECEIVED: u8 = 99;
    /// About to bring up the access point.
    pub const STARTING: u8 = 10;
    /// Access point configured and started.
    pub const STARTED: u8 = 20;
    /// Driver reported the access point up.
    pub const AP_UP: u8 = 40;
    /// Diagnostic task heartbeat.
    pub const TICK: u8 = 41;
}

/// Channel value that requests a reboot instead of an access point.
pub const REBOOT_CHANNEL: u8 = 255;

/// Channels above this select a silent access point on `channel - 100`.
pub const SILENT_CHANNEL_OFFSET: u8 = 100;

/// Size of the diagnostic broadcast frame.
pub const DIAGNOSTIC_FRAME_LEN: usize = 64;

/// The diagnostic broadcast frame: broadcast destination, `src` as source,
/// a length field of 46 and zero padding (including the FCS bytes).
pub fn diagnostic_frame(src: &MacAddress) -> [u8; DIAGNOSTIC_FRAME_LEN] {
    let mut frame = [0u8; DIAGNOSTIC_FRAME_LEN];
    frame[..6].copy_from_slice(&BROADCAST_MAC);
    frame[6..12].copy_from_slice(src);
    frame[12..14].copy_from_slice(&46u16.to_be_bytes());
    frame
}

/// Split a `StartAccessPoint` channel into (channel, silent).
pub fn decode_channel(requested: u8) -> (u8, bool) {
    if requested > SILENT_CHANNEL_OFFSET {
        (requested - SILENT_CHANNEL_OFFSET, true)
    } else {
        (requested, false)
    }
}

#[derive(Debug, Default)]
pub(crate) struct SoftAp {
    silent: AtomicBool,
    task: Mutex<Option<DiagnosticTask>>,
}

#[derive(Debug)]
struct DiagnosticTask {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SoftAp {
    pub(crate) fn is_task_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Cancel the diagnostic task, if any, and wait for it to finish.
    pub(crate) fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.stop.store(true, Ordering::Release);
            if task.handle.join().is_err() {
                warn!("diagnostic task panicked");
            }
            debug!("diagnostic task stopped");
        }
    }
}

impl Bridge {
    /// Tear down station mode and bring up the diagnostic access point.
    pub(crate) fn start_access_point(&self, requested: u8) {
        // Disconnect events from the dying station must not reconnect it.
        self.health.exhaust_reconnects();

        let (channel, silent) = decode_channel(requested);
        self.softap.silent.store(silent, Ordering::Release);

        self.send_alive(alive::STARTING);
        let config = AccessPointConfig {
            ssid: self.config.softap.ssid.clone(),
            channel,
            hidden: true,
            auth: AuthMode::Open,
            max_connections: self.config.softap.max_connections,
            beacon_interval: self.config.softap.beacon_interval,
        };
        info!(channel, silent, "starting diagnostic access point");
        if let Err(err) = self.radio.start_access_point(&config) {
            warn!(channel, error = %err, "failed to start access point");
        }
        self.send_alive(alive::STARTED);
    }

    /// The driver reported the access point up.
    pub(crate) fn on_access_point_started(self: &Arc<Self>) {
        self.send_alive(alive::AP_UP);
        if self.softap.silent.load(Ordering::Acquire) {
            info!("access point up (silent)");
            return;
        }

        let mut slot = self
            .softap
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            debug!("diagnostic task already running");
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let bridge = Arc::clone(self);
        let task_stop = Arc::clone(&stop);
        match thread::Builder::new()
            .name("uartnic-softap".to_string())
            .spawn(move || bridge.run_diagnostic_task(&task_stop))
        {
            Ok(handle) => {
                info!("access point up, diagnostic task started");
                *slot = Some(DiagnosticTask { stop, handle });
            }
            Err(err) => warn!(error = %err, "failed to spawn diagnostic task"),
        }
    }

    fn run_diagnostic_task(&self, stop: &AtomicBool) {
        let src = match self.radio.mac(Interface::AccessPoint) {
            Ok(mac) => mac,
            Err(err) => {
                warn!(error = %err, "no access point MAC, using zeroes");
                [0u8; 6]
            }
        };
        let frame = diagnostic_frame(&src);
        let alive_every = self.config.softap.alive_every.max(1);

        let mut count: u32 = 0;
        while !stop.load(Ordering::Acquire) && self.is_running() {
            count = count.wrapping_add(1);
            if count % alive_every == 0 {
                self.send_alive(alive::TICK);
            }
            if let Err(err) = self.radio.transmit(Interface::AccessPoint, &frame) {
                trace!(error = %err, "diagnostic transmit failed");
            }
            thread::sleep(self.config.softap.tick);
        }
    }

    pub(crate) fn send_alive(&self, code: u8) {
        self.uplink.send_logged(&Message::Alive { code }, &self.stats);
    }
}
