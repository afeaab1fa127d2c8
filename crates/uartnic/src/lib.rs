//! Radio to serial network bridge.
//!
//! uartnic gives a host microcontroller without a network stack of its own
//! a wireless interface over a serial link. Every frame on the link starts
//! with a resync token so either side can regain alignment after noise.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial links, the pseudo serial socket and the radio interface
//! - [`frame`]: resync-token framing and the protocol messages
//! - [`bridge`]: the packet pipelines, link health monitor and diagnostic access point

/// Re-export transport types.
pub mod transport {
    pub use uartnic_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use uartnic_frame::*;
}

/// Re-export bridge types.
pub mod bridge {
    pub use uartnic_bridge::*;
}
