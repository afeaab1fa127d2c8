//! Radio to serial packet bridge.
//!
//! A [`Bridge`] turns a radio into a network interface for a host that only
//! has a serial link. It runs four threads:
//! - the serial read loop: parses host frames, answers control messages and
//!   queues outgoing packets
//! - the egress drain: transmits queued packets on the radio
//! - the ingress drain: forwards received radio packets to the host
//! - the radio event task: association changes and probe results
//!
//! Radio driver callbacks enter through a [`RadioSink`], which only filters,
//! queues and hands off; it never blocks.

pub mod bridge;
pub mod buffer;
pub mod config;
mod control;
mod egress;
pub mod error;
pub mod health;
pub mod ingress;
pub mod queue;
pub mod sim;
pub mod softap;
pub mod stats;
pub mod uplink;

pub use bridge::{Bridge, BridgeBuilder, BridgeHandle};
pub use buffer::PacketBuffer;
pub use config::{BridgeConfig, HealthConfig, SoftApConfig, FIRMWARE_VERSION};
pub use error::{BridgeError, Result};
pub use health::{Clock, HealthAction, HealthState, LinkHealth, ManualClock, SystemClock};
pub use ingress::{accepts, RadioSink};
pub use queue::PacketQueue;
pub use sim::LoopbackRadio;
pub use softap::{diagnostic_frame, REBOOT_CHANNEL};
pub use stats::{BridgeStats, StatsSnapshot};
pub use uplink::Uplink;
