//! Collaborator interfaces for the uartnic bridge.
//!
//! The bridge sits between two things it does not own:
//! - a serial link to the host microcontroller ([`SerialStream`])
//! - a wireless radio driver ([`Radio`])
//!
//! This is the lowest layer of uartnic. The frame codec and the bridge
//! build on top of the types provided here.

pub mod error;
pub mod radio;
pub mod stream;

#[cfg(unix)]
pub mod socket;

pub use error::{RadioError, RadioResult, Result, TransportError};
pub use radio::{
    AccessPointConfig, ApRecord, AuthMode, Interface, MacAddress, Radio, RadioEvent, RxBuffer,
    ScanConfig, ScanOutcome, StationConfig, BROADCAST_MAC, PASSWORD_LEN, SSID_LEN,
};
pub use radio::format_mac;
pub use stream::{SerialConfig, SerialStream};

#[cfg(unix)]
pub use socket::SocketSerial;
