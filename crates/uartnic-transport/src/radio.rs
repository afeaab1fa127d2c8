//! Radio driver interface.
//!
//! The bridge never talks to radio hardware directly. A platform crate
//! implements [`Radio`] on top of its driver and forwards driver callbacks
//! (received frames, association events, scan completion) into the bridge.

use std::fmt;
use std::time::Duration;

use crate::error::RadioResult;

/// IEEE 802 hardware address.
pub type MacAddress = [u8; 6];

/// Broadcast destination address.
pub const BROADCAST_MAC: MacAddress = [0xff; 6];

/// Size of the SSID field in driver records and station configuration.
pub const SSID_LEN: usize = 32;

/// Size of the password field in station configuration.
pub const PASSWORD_LEN: usize = 64;

/// Radio interface a call applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    /// Station (client) interface.
    Station,
    /// Soft access point interface.
    AccessPoint,
}

/// Access point record as reported by association queries and scans.
#[derive(Clone, PartialEq, Eq)]
pub struct ApRecord {
    pub bssid: MacAddress,
    /// Fixed-width, NUL padded SSID field.
    pub ssid: [u8; SSID_LEN],
    pub channel: u8,
    pub rssi: i8,
}

impl ApRecord {
    /// Build a record, truncating the SSID to the fixed field width.
    pub fn new(bssid: MacAddress, ssid: &[u8]) -> Self {
        let mut field = [0u8; SSID_LEN];
        let len = ssid.len().min(SSID_LEN);
        field[..len].copy_from_slice(&ssid[..len]);
        Self {
            bssid,
            ssid: field,
            channel: 0,
            rssi: 0,
        }
    }

    /// Set the channel the access point was seen on.
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// SSID bytes up to the first NUL.
    pub fn ssid_bytes(&self) -> &[u8] {
        let end = self
            .ssid
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(SSID_LEN);
        &self.ssid[..end]
    }

    /// Whether the SSID field is empty (hidden network or unset).
    pub fn has_ssid(&self) -> bool {
        self.ssid[0] != 0
    }
}

impl fmt::Debug for ApRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApRecord")
            .field("bssid", &format_args!("{}", format_mac(&self.bssid)))
            .field("ssid", &String::from_utf8_lossy(self.ssid_bytes()))
            .field("channel", &self.channel)
            .field("rssi", &self.rssi)
            .finish()
    }
}

/// Parameters for an asynchronous scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Restrict to one SSID. Unreliable on some drivers; the probe never sets it.
    pub ssid: Option<Vec<u8>>,
    /// Restrict to one BSSID. Unreliable on some drivers; the probe never sets it.
    pub bssid: Option<MacAddress>,
    /// Channel to scan, 0 for all channels.
    pub channel: u8,
    pub show_hidden: bool,
    /// Minimum active dwell time per channel.
    pub active_min: Duration,
    /// Maximum active dwell time per channel.
    pub active_max: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ssid: None,
            bssid: None,
            channel: 0,
            show_hidden: true,
            active_min: Duration::from_millis(120),
            active_max: Duration::from_millis(300),
        }
    }
}

/// Result delivered with a scan-complete event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Driver reported the scan as successful.
    pub success: bool,
    pub records: Vec<ApRecord>,
}

impl ScanOutcome {
    pub fn completed(records: Vec<ApRecord>) -> Self {
        Self {
            success: true,
            records,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            records: Vec::new(),
        }
    }
}

/// Minimum authentication mode the station accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Open,
    Wpa2Personal,
}

/// Station credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct StationConfig {
    pub ssid: Vec<u8>,
    /// Treated as credential material and redacted in debug output.
    pub password: Vec<u8>,
    pub auth_threshold: AuthMode,
}

impl StationConfig {
    /// Credentials with the auth threshold implied by the password:
    /// WPA2-personal whenever a password is given, open otherwise.
    pub fn new(ssid: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Self {
        let password = password.into();
        let auth_threshold = if password.is_empty() {
            AuthMode::Open
        } else {
            AuthMode::Wpa2Personal
        };
        Self {
            ssid: ssid.into(),
            password,
            auth_threshold,
        }
    }
}

impl fmt::Debug for StationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationConfig")
            .field("ssid", &String::from_utf8_lossy(&self.ssid))
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .field("auth_threshold", &self.auth_threshold)
            .finish()
    }
}

/// Soft access point settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointConfig {
    pub ssid: Vec<u8>,
    pub channel: u8,
    pub hidden: bool,
    pub auth: AuthMode,
    pub max_connections: u8,
    pub beacon_interval: u16,
}

/// Notifications delivered by the radio driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// Station interface started and is ready to associate.
    StationStarted,
    /// Station associated with an access point.
    StationConnected,
    /// Station lost (or failed to establish) association.
    StationDisconnected,
    /// A previously requested scan finished.
    ScanDone(ScanOutcome),
    /// Soft access point is up.
    AccessPointStarted,
    /// Soft access point went down.
    AccessPointStopped,
}

/// A frame buffer owned by the radio driver.
///
/// Dropping the value returns the buffer to the driver, so a buffer is
/// released exactly once by whoever owns it last.
pub trait RxBuffer: Send {
    /// The received frame, starting at the destination address.
    fn as_bytes(&self) -> &[u8];
}

impl RxBuffer for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

/// Radio driver primitives consumed by the bridge.
///
/// Implementations must be callable from any bridge thread.
pub trait Radio: Send + Sync {
    /// Hardware address of an interface.
    fn mac(&self, iface: Interface) -> RadioResult<MacAddress>;

    /// Ask the station to (re)associate with the configured access point.
    fn connect(&self) -> RadioResult<()>;

    /// Stop the station, apply new credentials and start it again.
    fn configure_station(&self, config: &StationConfig) -> RadioResult<()>;

    /// The access point the station is currently associated with.
    ///
    /// Returns [`RadioError::NotConnected`](crate::RadioError::NotConnected)
    /// when there is none.
    fn current_association(&self) -> RadioResult<ApRecord>;

    /// Start an asynchronous scan. Completion arrives as [`RadioEvent::ScanDone`].
    fn start_scan(&self, config: &ScanConfig) -> RadioResult<()>;

    /// Driver-side beacon inactivity timeout.
    fn set_inactive_time(&self, iface: Interface, seconds: u16) -> RadioResult<()>;

    /// Send a raw frame.
    fn transmit(&self, iface: Interface, frame: &[u8]) -> RadioResult<()>;

    /// Tear down station mode and bring up a soft access point.
    fn start_access_point(&self, config: &AccessPointConfig) -> RadioResult<()>;

    /// Restart the whole device.
    fn restart(&self);
}

/// Colon separated hex form of a MAC address.
pub fn format_mac(mac: &MacAddress) -> String {
    mac.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ap_record_ssid_is_truncated_and_nul_terminated() {
        let long = [b'x'; 40];
        let record = ApRecord::new([1; 6], &long);
        assert_eq!(record.ssid_bytes().len(), SSID_LEN);

        let short = ApRecord::new([1; 6], b"lab");
        assert_eq!(short.ssid_bytes(), b"lab");
        assert!(short.has_ssid());
        assert!(!ApRecord::new([1; 6], b"").has_ssid());
    }

    #[test]
    fn station_config_auth_follows_password() {
        assert_eq!(
            StationConfig::new("0123456789", "").auth_threshold,
            AuthMode::Open
        );
        assert_eq!(
            StationConfig::new("lab", "secret").auth_threshold,
            AuthMode::Wpa2Personal
        );
    }

    #[test]
    fn station_config_debug_redacts_password() {
        let cfg = StationConfig::new("lab", "hunter22");
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("hunter22"));
        assert!(dbg.contains("<redacted:8 bytes>"));
    }

    #[test]
    fn default_scan_is_unfiltered_active() {
        let cfg = ScanConfig::default();
        assert!(cfg.ssid.is_none());
        assert!(cfg.bssid.is_none());
        assert_eq!(cfg.channel, 0);
        assert!(cfg.show_hidden);
        assert_eq!(cfg.active_min, Duration::from_millis(120));
        assert_eq!(cfg.active_max, Duration::from_millis(300));
    }

    #[test]
    fn mac_formatting() {
        assert_eq!(
            format_mac(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]),
            "de:ad:be:ef:00:01"
        );
    }
}
