//! Link health state machine.
//!
//! Some access points advertise a BSSID in their beacons that differs from
//! the one the station associated with, so the driver's own beacon timeout
//! drops perfectly good links. The bridge therefore sets the driver timeout
//! very high and watches inbound traffic itself: when an associated link has
//! been quiet for too long it runs an active scan and looks for the current
//! access point in the results.
//!
//! [`LinkHealth`] only tracks state. Every transition returns the
//! [`HealthAction`]s the caller must perform against the radio or the host.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uartnic_transport::{ApRecord, RadioResult, ScanOutcome};

use crate::config::HealthConfig;

/// Whole-second clock. Values may wrap.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u32;
}

/// Seconds since the clock was created.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_secs(&self) -> u32 {
        self.start.elapsed().as_secs() as u32
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    pub fn new(now: u32) -> Self {
        Self {
            now: AtomicU32::new(now),
        }
    }

    pub fn set(&self, now: u32) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u32) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Coarse link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Disassociated,
    Associated,
    Probing,
}

impl HealthState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disassociated => "disassociated",
            Self::Associated => "associated",
            Self::Probing => "probing",
        }
    }
}

/// Work requested by a health transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthAction {
    /// Set the driver's station beacon inactivity timeout.
    SetInactiveTime(u16),
    /// Tell the host whether the link is up.
    ReportLink(bool),
    /// Ask the radio to associate again.
    Reconnect,
    /// Issue the probe scan.
    StartScan,
}

/// Link health tracker shared by the receive callback, the radio event task
/// and the serial read loop.
///
/// All fields are atomics so the receive callback never blocks.
pub struct LinkHealth {
    config: HealthConfig,
    clock: Arc<dyn Clock>,
    associated: AtomicBool,
    probing: AtomicBool,
    beacon_quirk: AtomicBool,
    last_inbound_seen: AtomicU32,
    probe_retries: AtomicU32,
    reconnect_attempts: AtomicU32,
}

impl LinkHealth {
    pub fn new(config: HealthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            associated: AtomicBool::new(false),
            probing: AtomicBool::new(false),
            beacon_quirk: AtomicBool::new(false),
            last_inbound_seen: AtomicU32::new(0),
            probe_retries: AtomicU32::new(0),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    /// Record inbound activity.
    pub fn touch(&self) {
        self.last_inbound_seen
            .store(self.clock.now_secs(), Ordering::Release);
    }

    /// The station associated with an access point.
    pub fn on_connected(&self) -> Vec<HealthAction> {
        self.touch();
        self.beacon_quirk.store(true, Ordering::Release);
        self.probing.store(false, Ordering::Release);
        self.associated.store(true, Ordering::Release);
        self.reconnect_attempts.store(0, Ordering::Release);
        info!("station associated");
        vec![
            HealthAction::ReportLink(true),
            HealthAction::SetInactiveTime(self.config.inactive_beacon_secs),
        ]
    }

    /// The station lost its association.
    pub fn on_disconnected(&self) -> Vec<HealthAction> {
        self.associated.store(false, Ordering::Release);
        self.probing.store(false, Ordering::Release);

        let mut actions = vec![HealthAction::ReportLink(false)];
        let attempt = self.reconnect_attempts.load(Ordering::Acquire);
        if attempt < self.config.max_reconnect_attempts {
            self.reconnect_attempts.store(attempt + 1, Ordering::Release);
            info!(attempt = attempt + 1, "station disconnected, reconnecting");
            actions.push(HealthAction::Reconnect);
        } else {
            warn!("station disconnected, reconnect attempts exhausted");
        }
        actions
    }

    /// Stop reconnecting after future disconnects.
    pub fn exhaust_reconnects(&self) {
        self.reconnect_attempts
            .store(self.config.max_reconnect_attempts, Ordering::Release);
    }

    /// Record the result of an explicit association query.
    pub fn set_associated(&self, associated: bool) {
        self.associated.store(associated, Ordering::Release);
    }

    /// Periodic check: start a probe when an associated link has been quiet
    /// for longer than the inactivity threshold.
    pub fn check(&self) -> Option<HealthAction> {
        if !self.associated.load(Ordering::Acquire) || self.probing.load(Ordering::Acquire) {
            return None;
        }

        let elapsed = self.elapsed_secs();
        if elapsed <= self.config.inactive_packet_secs {
            return None;
        }

        if self
            .probing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        self.probe_retries.store(0, Ordering::Release);
        debug!(elapsed, "link quiet, probing");
        Some(HealthAction::StartScan)
    }

    /// A probe scan finished.
    ///
    /// `current` is only queried when the scan produced records; a failed
    /// query counts as no match. Returns `StartScan` to retry, or
    /// `ReportLink(false)` once the retries are used up. Scan results that
    /// arrive while no probe is running are ignored.
    pub fn on_scan_done(
        &self,
        outcome: &ScanOutcome,
        current: impl FnOnce() -> RadioResult<ApRecord>,
    ) -> Option<HealthAction> {
        if !self.probing.load(Ordering::Acquire) {
            debug!("scan finished outside of a probe, ignoring");
            return None;
        }

        if self.probe_matches(outcome, current) {
            self.touch();
            self.probing.store(false, Ordering::Release);
            return None;
        }

        let retries = self.probe_retries.fetch_add(1, Ordering::AcqRel) + 1;
        if retries < self.config.probe_max_retries {
            debug!(retries, "access point not found, rescanning");
            Some(HealthAction::StartScan)
        } else {
            warn!(retries, "access point not found, reporting link down");
            self.probing.store(false, Ordering::Release);
            Some(HealthAction::ReportLink(false))
        }
    }

    fn probe_matches(
        &self,
        outcome: &ScanOutcome,
        current: impl FnOnce() -> RadioResult<ApRecord>,
    ) -> bool {
        if !outcome.success || outcome.records.is_empty() {
            return false;
        }
        let current = match current() {
            Ok(record) => record,
            Err(err) => {
                debug!(error = %err, "no current association during probe");
                return false;
            }
        };

        if outcome
            .records
            .iter()
            .any(|record| record.bssid == current.bssid)
        {
            self.beacon_quirk.store(false, Ordering::Release);
            return true;
        }

        // Fall back to the SSID for access points whose beacons carry a
        // different BSSID than the one we associated with.
        self.beacon_quirk.load(Ordering::Acquire)
            && current.has_ssid()
            && outcome
                .records
                .iter()
                .any(|record| record.has_ssid() && record.ssid == current.ssid)
    }

    fn elapsed_secs(&self) -> u32 {
        let now = self.clock.now_secs();
        let last = self.last_inbound_seen.load(Ordering::Acquire);
        // After a wrap only the time since the wrap is counted.
        if now < last {
            now
        } else {
            now - last
        }
    }

    pub fn state(&self) -> HealthState {
        if !self.associated.load(Ordering::Acquire) {
            HealthState::Disassociated
        } else if self.probing.load(Ordering::Acquire) {
            HealthState::Probing
        } else {
            HealthState::Associated
        }
    }

    pub fn is_associated(&self) -> bool {
        self.associated.load(Ordering::Acquire)
    }

    pub fn is_probing(&self) -> bool {
        self.probing.load(Ordering::Acquire)
    }

    pub fn beacon_quirk(&self) -> bool {
        self.beacon_quirk.load(Ordering::Acquire)
    }

    pub fn last_inbound_seen(&self) -> u32 {
        self.last_inbound_seen.load(Ordering::Acquire)
    }

    pub fn probe_retries(&self) -> u32 {
        self.probe_retries.load(Ordering::Acquire)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LinkHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHealth")
            .field("state", &self.state().as_str())
            .field("beacon_quirk", &self.beacon_quirk())
            .field("last_inbound_seen", &self.last_inbound_seen())
            .field("probe_retries", &self.probe_retries())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use uartnic_transport::RadioError;

    use super::*;

    const AP: [u8; 6] = [0x02, 0, 0, 0, 0, 0x01];

    fn health() -> (LinkHealth, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(100));
        let health = LinkHealth::new(HealthConfig::default(), clock.clone());
        (health, clock)
    }

    fn current() -> RadioResult<ApRecord> {
        Ok(ApRecord::new(AP, b"office"))
    }

    fn probing(health: &LinkHealth, clock: &ManualClock) {
        health.on_connected();
        clock.advance(6);
        assert_eq!(health.check(), Some(HealthAction::StartScan));
    }

    #[test]
    fn connect_reports_up_and_raises_driver_timeout() {
        let (health, _clock) = health();
        let actions = health.on_connected();
        assert_eq!(
            actions,
            vec![
                HealthAction::ReportLink(true),
                HealthAction::SetInactiveTime(64_800)
            ]
        );
        assert_eq!(health.state(), HealthState::Associated);
        assert!(health.beacon_quirk());
        assert_eq!(health.last_inbound_seen(), 100);
    }

    #[test]
    fn quiet_link_probes_once() {
        let (health, clock) = health();
        health.on_connected();

        clock.advance(5);
        assert_eq!(health.check(), None, "threshold is strictly greater than");

        clock.advance(1);
        assert_eq!(health.check(), Some(HealthAction::StartScan));
        assert_eq!(health.state(), HealthState::Probing);
        assert_eq!(health.check(), None);
    }

    #[test]
    fn traffic_defers_probe() {
        let (health, clock) = health();
        health.on_connected();
        clock.advance(4);
        health.touch();
        clock.advance(4);
        assert_eq!(health.check(), None);
    }

    #[test]
    fn disassociated_never_probes() {
        let (health, clock) = health();
        clock.advance(1000);
        assert_eq!(health.check(), None);
    }

    #[test]
    fn clock_wrap_counts_from_zero() {
        let (health, clock) = health();
        clock.set(u32::MAX - 1);
        health.on_connected();
        clock.set(3);
        assert_eq!(health.check(), None);
        clock.set(6);
        assert_eq!(health.check(), Some(HealthAction::StartScan));
    }

    #[test]
    fn bssid_match_clears_quirk() {
        let (health, clock) = health();
        probing(&health, &clock);
        clock.advance(2);

        let outcome = ScanOutcome::completed(vec![ApRecord::new(AP, b"other")]);
        assert_eq!(health.on_scan_done(&outcome, current), None);
        assert!(!health.is_probing());
        assert!(!health.beacon_quirk());
        assert_eq!(health.last_inbound_seen(), 108);
    }

    #[test]
    fn ssid_match_keeps_quirk() {
        let (health, clock) = health();
        probing(&health, &clock);

        let outcome = ScanOutcome::completed(vec![ApRecord::new([9; 6], b"office")]);
        assert_eq!(health.on_scan_done(&outcome, current), None);
        assert!(!health.is_probing());
        assert!(health.beacon_quirk());
    }

    #[test]
    fn ssid_fallback_only_while_quirk_set() {
        let (health, clock) = health();
        probing(&health, &clock);
        let exact = ScanOutcome::completed(vec![ApRecord::new(AP, b"office")]);
        health.on_scan_done(&exact, current);
        assert!(!health.beacon_quirk());

        clock.advance(10);
        assert_eq!(health.check(), Some(HealthAction::StartScan));
        let ssid_only = ScanOutcome::completed(vec![ApRecord::new([9; 6], b"office")]);
        assert_eq!(
            health.on_scan_done(&ssid_only, current),
            Some(HealthAction::StartScan)
        );
    }

    #[test]
    fn empty_ssids_never_match() {
        let (health, clock) = health();
        probing(&health, &clock);
        let outcome = ScanOutcome::completed(vec![ApRecord::new([9; 6], b"")]);
        let hidden = || Ok(ApRecord::new(AP, b""));
        assert_eq!(
            health.on_scan_done(&outcome, hidden),
            Some(HealthAction::StartScan)
        );
    }

    #[test]
    fn three_misses_report_down_without_fourth_scan() {
        let (health, clock) = health();
        probing(&health, &clock);

        let miss = ScanOutcome::completed(Vec::new());
        assert_eq!(
            health.on_scan_done(&miss, current),
            Some(HealthAction::StartScan)
        );
        assert_eq!(
            health.on_scan_done(&ScanOutcome::failed(), current),
            Some(HealthAction::StartScan)
        );
        assert_eq!(
            health.on_scan_done(&miss, current),
            Some(HealthAction::ReportLink(false))
        );
        assert!(!health.is_probing());
        assert_eq!(health.state(), HealthState::Associated);

        // A straggling result after giving up does nothing.
        assert_eq!(health.on_scan_done(&miss, current), None);
    }

    #[test]
    fn failed_association_query_is_a_miss() {
        let (health, clock) = health();
        probing(&health, &clock);
        let outcome = ScanOutcome::completed(vec![ApRecord::new(AP, b"office")]);
        assert_eq!(
            health.on_scan_done(&outcome, || Err(RadioError::NotConnected)),
            Some(HealthAction::StartScan)
        );
    }

    #[test]
    fn current_association_not_queried_for_empty_scan() {
        let (health, clock) = health();
        probing(&health, &clock);
        let mut queried = false;
        health.on_scan_done(&ScanOutcome::completed(Vec::new()), || {
            queried = true;
            current()
        });
        assert!(!queried);
    }

    #[test]
    fn reconnect_is_bounded() {
        let (health, _clock) = health();
        health.on_connected();
        for attempt in 1..=5 {
            let actions = health.on_disconnected();
            assert_eq!(
                actions,
                vec![HealthAction::ReportLink(false), HealthAction::Reconnect]
            );
            assert_eq!(health.reconnect_attempts(), attempt);
        }
        assert_eq!(
            health.on_disconnected(),
            vec![HealthAction::ReportLink(false)]
        );

        health.on_connected();
        assert_eq!(health.reconnect_attempts(), 0);
    }

    #[test]
    fn exhausted_budget_suppresses_reconnect() {
        let (health, _clock) = health();
        health.exhaust_reconnects();
        assert_eq!(
            health.on_disconnected(),
            vec![HealthAction::ReportLink(false)]
        );
        assert_eq!(health.state(), HealthState::Disassociated);
    }

    #[test]
    fn connect_clears_stale_probe() {
        let (health, clock) = health();
        probing(&health, &clock);
        health.on_connected();
        assert!(!health.is_probing());
    }
}
