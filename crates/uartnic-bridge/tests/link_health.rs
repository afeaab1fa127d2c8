mod support;

use std::sync::Arc;

use uartnic_bridge::HealthState;
use uartnic_frame::Message;
use uartnic_transport::{ApRecord, RadioEvent, ScanConfig, ScanOutcome};

use support::{start, wait_until, Call, Harness, BSSID};

fn scans(h: &Harness) -> usize {
    h.journal.count(|c| matches!(c, Call::StartScan(_)))
}

/// Associate, then let the link go quiet and trigger the check with a host
/// frame.
fn stale_link() -> Harness {
    let mut h = start();
    h.radio.set_association(Ok(ApRecord::new(BSSID, b"office")));
    h.handle.sink().on_event(RadioEvent::StationConnected);
    assert_eq!(h.host.recv(), Message::LinkStatus { up: true });

    h.clock.advance(6);
    h.host.send(&Message::GetLinkStatus);
    assert_eq!(h.host.recv(), Message::LinkStatus { up: true });
    let journal = Arc::clone(&h.journal);
    wait_until("probe scan", || {
        journal.count(|c| matches!(c, Call::StartScan(_))) == 1
    });
    h
}

#[test]
fn association_reports_up_and_raises_driver_timeout() {
    let mut h = start();
    h.handle.sink().on_event(RadioEvent::StationConnected);
    assert_eq!(h.host.recv(), Message::LinkStatus { up: true });

    let journal = Arc::clone(&h.journal);
    wait_until("inactive time", || {
        journal.count(|c| *c == Call::SetInactiveTime(64_800)) == 1
    });
    assert_eq!(h.handle.health().state(), HealthState::Associated);
    assert!(h.handle.health().beacon_quirk());
}

#[test]
fn fresh_link_is_not_probed() {
    let mut h = start();
    h.handle.sink().on_event(RadioEvent::StationConnected);
    assert_eq!(h.host.recv(), Message::LinkStatus { up: true });

    h.clock.advance(5);
    h.host.send(&Message::GetLinkStatus);
    h.host.recv();
    assert_eq!(scans(&h), 0);
}

#[test]
fn stale_link_probes_exactly_once() {
    let mut h = stale_link();
    let scan = h.journal.calls().into_iter().find_map(|c| match c {
        Call::StartScan(config) => Some(config),
        _ => None,
    });
    assert_eq!(scan, Some(ScanConfig::default()));
    assert_eq!(h.handle.health().state(), HealthState::Probing);

    // Further checks while probing issue no scans.
    h.clock.advance(30);
    h.host.send(&Message::GetLinkStatus);
    h.host.recv();
    assert_eq!(scans(&h), 1);
}

#[test]
fn bssid_match_ends_probe() {
    let h = stale_link();
    h.clock.advance(1);
    h.handle
        .sink()
        .on_event(RadioEvent::ScanDone(ScanOutcome::completed(vec![
            ApRecord::new(BSSID, b"elsewhere"),
        ])));

    let health = h.handle.health();
    wait_until("probe end", || !health.is_probing());
    assert!(!health.beacon_quirk());
    assert_eq!(health.last_inbound_seen(), 1_007);
    assert_eq!(scans(&h), 1);
}

#[test]
fn ssid_match_ends_probe_while_quirk_set() {
    let h = stale_link();
    h.handle
        .sink()
        .on_event(RadioEvent::ScanDone(ScanOutcome::completed(vec![
            ApRecord::new([0x90, 0x9a, 0x4a, 0x01, 0x02, 0xff], b"office"),
        ])));

    let health = h.handle.health();
    wait_until("probe end", || !health.is_probing());
    assert!(health.beacon_quirk());
    assert_eq!(scans(&h), 1);
}

#[test]
fn three_misses_report_down_without_fourth_scan() {
    let mut h = stale_link();
    let sink = h.handle.sink();
    let foreign = ScanOutcome::completed(vec![ApRecord::new([7; 6], b"neighbour")]);

    sink.on_event(RadioEvent::ScanDone(foreign.clone()));
    sink.on_event(RadioEvent::ScanDone(ScanOutcome::failed()));
    sink.on_event(RadioEvent::ScanDone(foreign));

    assert_eq!(h.host.recv(), Message::LinkStatus { up: false });
    assert_eq!(scans(&h), 3);
    assert!(!h.handle.health().is_probing());
    assert_eq!(h.handle.health().state(), HealthState::Associated);
}

#[test]
fn disconnect_reports_down_before_reconnecting() {
    let mut h = start();
    h.handle.sink().on_event(RadioEvent::StationConnected);
    assert_eq!(h.host.recv(), Message::LinkStatus { up: true });

    h.handle.sink().on_event(RadioEvent::StationDisconnected);
    assert_eq!(h.host.recv(), Message::LinkStatus { up: false });

    let journal = Arc::clone(&h.journal);
    wait_until("reconnect", || journal.count(|c| *c == Call::Connect) == 1);

    let calls = h.journal.calls();
    let connect_at = calls
        .iter()
        .position(|c| *c == Call::Connect)
        .expect("connect should be recorded");
    let down_frame = {
        let mut frame = uartnic_frame::DEFAULT_TOKEN.to_vec();
        frame.extend_from_slice(&[1, 0]);
        frame
    };
    let down_at = calls
        .iter()
        .position(|c| *c == Call::Uplink(down_frame.clone()))
        .expect("link down frame should be recorded");
    assert!(down_at < connect_at);
    assert_eq!(h.journal.count(|c| *c == Call::Connect), 1);
}

#[test]
fn reconnects_stop_after_budget() {
    let mut h = start();
    let sink = h.handle.sink();
    for _ in 0..7 {
        sink.on_event(RadioEvent::StationDisconnected);
        assert_eq!(h.host.recv(), Message::LinkStatus { up: false });
    }
    let journal = Arc::clone(&h.journal);
    wait_until("reconnects", || journal.count(|c| *c == Call::Connect) == 5);
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(h.journal.count(|c| *c == Call::Connect), 5);
}

#[test]
fn station_start_triggers_connect() {
    let h = start();
    h.handle.sink().on_event(RadioEvent::StationStarted);
    let journal = Arc::clone(&h.journal);
    wait_until("connect", || journal.count(|c| *c == Call::Connect) == 1);
}
