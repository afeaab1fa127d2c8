use std::time::Duration;

use uartnic_frame::FrameConfig;
use uartnic_transport::ScanConfig;

/// Firmware version reported in `DeviceInfo`.
pub const FIRMWARE_VERSION: u16 = 8;

/// Link health thresholds.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Seconds without inbound traffic before an associated link is probed.
    pub inactive_packet_secs: u32,
    /// Driver beacon inactivity timeout requested on association. Set very
    /// high so the probe, not the driver, decides when the link is gone.
    pub inactive_beacon_secs: u16,
    /// Non-matching scans tolerated per probe before the link is reported down.
    pub probe_max_retries: u32,
    /// Reconnect attempts after a disconnect before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            inactive_packet_secs: 5,
            inactive_beacon_secs: 64_800,
            probe_max_retries: 3,
            max_reconnect_attempts: 5,
        }
    }
}

/// Diagnostic soft access point settings.
#[derive(Debug, Clone)]
pub struct SoftApConfig {
    pub ssid: Vec<u8>,
    /// Delay between diagnostic broadcast frames.
    pub tick: Duration,
    /// Emit `Alive(41)` every this many ticks.
    pub alive_every: u32,
    pub max_connections: u8,
    pub beacon_interval: u16,
}

impl Default for SoftApConfig {
    fn default() -> Self {
        Self {
            ssid: b"_test".to_vec(),
            tick: Duration::from_millis(20),
            alive_every: 100,
            max_connections: 5,
            beacon_interval: 100,
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub firmware_version: u16,
    /// Capacity of each packet hand-off queue.
    pub queue_capacity: usize,
    /// How long the drain tasks wait on an empty queue before checking for
    /// shutdown.
    pub poll_interval: Duration,
    pub frame: FrameConfig,
    pub health: HealthConfig,
    /// Scan issued by the link probe.
    pub scan: ScanConfig,
    pub softap: SoftApConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            firmware_version: FIRMWARE_VERSION,
            queue_capacity: 20,
            poll_interval: Duration::from_secs(1),
            frame: FrameConfig::default(),
            health: HealthConfig::default(),
            scan: ScanConfig::default(),
            softap: SoftApConfig::default(),
        }
    }
}
