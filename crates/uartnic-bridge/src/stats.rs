use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Bridge counters.
#[derive(Debug, Default)]
pub struct BridgeStats {
    frames_from_host: AtomicU64,
    frames_to_host: AtomicU64,
    packets_to_host: AtomicU64,
    packets_to_radio: AtomicU64,
    rx_filtered: AtomicU64,
    ingress_dropped: AtomicU64,
    egress_dropped: AtomicU64,
    oversized: AtomicU64,
    out_of_memory: AtomicU64,
    unknown_type: AtomicU64,
    transmit_failed: AtomicU64,
    uplink_errors: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Frames decoded from the host.
    pub frames_from_host: u64,
    /// Frames written to the host.
    pub frames_to_host: u64,
    /// Radio packets forwarded to the host.
    pub packets_to_host: u64,
    /// Host packets transmitted by the radio.
    pub packets_to_radio: u64,
    /// Received frames rejected by the MAC filter.
    pub rx_filtered: u64,
    /// Received frames dropped on a full ingress queue.
    pub ingress_dropped: u64,
    /// Host packets dropped on a full egress queue.
    pub egress_dropped: u64,
    /// Host packets over the size limit.
    pub oversized: u64,
    /// Host packets dropped for lack of memory.
    pub out_of_memory: u64,
    /// Frames with an unknown type byte.
    pub unknown_type: u64,
    /// Radio transmit failures.
    pub transmit_failed: u64,
    /// Failed writes to the host.
    pub uplink_errors: u64,
}

macro_rules! counter {
    ($($record:ident => $field:ident),* $(,)?) => {
        impl BridgeStats {
            $(
                pub(crate) fn $record(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*

            pub fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }
        }
    };
}

counter! {
    record_frame_from_host => frames_from_host,
    record_frame_to_host => frames_to_host,
    record_packet_to_host => packets_to_host,
    record_packet_to_radio => packets_to_radio,
    record_rx_filtered => rx_filtered,
    record_ingress_dropped => ingress_dropped,
    record_egress_dropped => egress_dropped,
    record_oversized => oversized,
    record_out_of_memory => out_of_memory,
    record_unknown_type => unknown_type,
    record_transmit_failed => transmit_failed,
    record_uplink_error => uplink_errors,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = BridgeStats::default();
        stats.record_ingress_dropped();
        stats.record_ingress_dropped();
        stats.record_oversized();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.ingress_dropped, 2);
        assert_eq!(snapshot.oversized, 1);
        assert_eq!(snapshot.frames_to_host, 0);
    }
}
