//! In-process radio for running a bridge without hardware.
//!
//! [`LoopbackRadio`] pretends to be a station that associates with a single
//! simulated access point as soon as credentials arrive. Frames the host
//! transmits on the station interface come straight back as received frames
//! with source and destination swapped, which is enough to exercise both
//! pipelines end to end.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use tracing::{debug, info};
use uartnic_transport::{
    AccessPointConfig, ApRecord, Interface, MacAddress, Radio, RadioError, RadioEvent,
    RadioResult, ScanConfig, ScanOutcome, StationConfig,
};

use crate::ingress::RadioSink;

/// Station MAC reported by the loopback radio (locally administered).
pub const LOOPBACK_STATION_MAC: MacAddress = [0x02, 0x55, 0x4e, 0x00, 0x00, 0x01];
/// Access point MAC reported by the loopback radio.
pub const LOOPBACK_AP_MAC: MacAddress = [0x02, 0x55, 0x4e, 0x00, 0x00, 0x02];
/// BSSID of the simulated access point.
pub const LOOPBACK_BSSID: MacAddress = [0x02, 0x55, 0x4e, 0x00, 0x00, 0xaa];

#[derive(Debug, Default)]
struct State {
    station: Option<StationConfig>,
    associated: bool,
    access_point: Option<AccessPointConfig>,
    inactive_time: Option<u16>,
}

/// A radio that loops station traffic back to the bridge.
#[derive(Debug, Default)]
pub struct LoopbackRadio {
    sink: OnceLock<RadioSink>,
    state: Mutex<State>,
    transmitted: AtomicU64,
    scans: AtomicU64,
    restarted: AtomicBool,
}

impl LoopbackRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect the radio to a running bridge. Only the first call has effect.
    pub fn attach(&self, sink: RadioSink) {
        if self.sink.set(sink).is_err() {
            debug!("loopback radio already attached");
        }
    }

    /// Frames handed to [`Radio::transmit`] on either interface.
    pub fn transmitted(&self) -> u64 {
        self.transmitted.load(Ordering::Relaxed)
    }

    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn restarted(&self) -> bool {
        self.restarted.load(Ordering::Acquire)
    }

    pub fn is_associated(&self) -> bool {
        self.state().associated
    }

    /// Simulate losing the access point.
    pub fn drop_association(&self) {
        self.state().associated = false;
        self.emit(RadioEvent::StationDisconnected);
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RadioEvent) {
        if let Some(sink) = self.sink.get() {
            sink.on_event(event);
        }
    }

    fn access_point(&self, ssid: &[u8]) -> ApRecord {
        ApRecord::new(LOOPBACK_BSSID, ssid).with_channel(6)
    }
}

impl Radio for LoopbackRadio {
    fn mac(&self, iface: Interface) -> RadioResult<MacAddress> {
        Ok(match iface {
            Interface::Station => LOOPBACK_STATION_MAC,
            Interface::AccessPoint => LOOPBACK_AP_MAC,
        })
    }

    fn connect(&self) -> RadioResult<()> {
        {
            let mut state = self.state();
            if state.access_point.is_some() {
                return Err(RadioError::InvalidMode("access point active"));
            }
            if state.station.is_none() {
                return Err(RadioError::NotConnected);
            }
            state.associated = true;
        }
        info!("loopback station associated");
        self.emit(RadioEvent::StationConnected);
        Ok(())
    }

    fn configure_station(&self, config: &StationConfig) -> RadioResult<()> {
        {
            let mut state = self.state();
            state.station = Some(config.clone());
            state.associated = false;
            state.access_point = None;
        }
        self.emit(RadioEvent::StationStarted);
        Ok(())
    }

    fn current_association(&self) -> RadioResult<ApRecord> {
        let state = self.state();
        match (&state.station, state.associated) {
            (Some(station), true) => Ok(self.access_point(&station.ssid)),
            _ => Err(RadioError::NotConnected),
        }
    }

    fn start_scan(&self, _config: &ScanConfig) -> RadioResult<()> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let records = match &self.state().station {
            Some(station) => vec![self.access_point(&station.ssid)],
            None => Vec::new(),
        };
        self.emit(RadioEvent::ScanDone(ScanOutcome::completed(records)));
        Ok(())
    }

    fn set_inactive_time(&self, _iface: Interface, seconds: u16) -> RadioResult<()> {
        self.state().inactive_time = Some(seconds);
        Ok(())
    }

    fn transmit(&self, iface: Interface, frame: &[u8]) -> RadioResult<()> {
        self.transmitted.fetch_add(1, Ordering::Relaxed);
        if iface != Interface::Station {
            return Ok(());
        }
        if !self.state().associated {
            return Err(RadioError::NotConnected);
        }
        if frame.len() < 12 {
            return Err(RadioError::Driver {
                op: "transmit",
                code: -1,
            });
        }

        let mut echo = frame.to_vec();
        echo[..6].copy_from_slice(&frame[6..12]);
        echo[6..12].copy_from_slice(&frame[..6]);
        if let Some(sink) = self.sink.get() {
            sink.on_frame(Box::new(echo));
        }
        Ok(())
    }

    fn start_access_point(&self, config: &AccessPointConfig) -> RadioResult<()> {
        let was_associated = {
            let mut state = self.state();
            state.access_point = Some(config.clone());
            std::mem::replace(&mut state.associated, false)
        };
        if was_associated {
            self.emit(RadioEvent::StationDisconnected);
        }
        self.emit(RadioEvent::AccessPointStarted);
        Ok(())
    }

    fn restart(&self) {
        info!("loopback radio restart requested");
        self.restarted.store(true, Ordering::Release);
        *self.state() = State::default();
    }
}
