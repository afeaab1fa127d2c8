#![allow(dead_code)]

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use uartnic_bridge::{Bridge, BridgeConfig, BridgeHandle, ManualClock};
use uartnic_frame::{FrameConfig, FrameReader, FrameWriter, Message, ResyncToken};
use uartnic_transport::{
    AccessPointConfig, ApRecord, Interface, MacAddress, Radio, RadioError, RadioResult,
    RxBuffer, ScanConfig, SerialStream, StationConfig,
};

pub const STATION_MAC: MacAddress = [0x24, 0x0a, 0xc4, 0x11, 0x22, 0x33];
pub const AP_MAC: MacAddress = [0x24, 0x0a, 0xc4, 0x11, 0x22, 0x34];
pub const BSSID: MacAddress = [0x90, 0x9a, 0x4a, 0x01, 0x02, 0x03];

/// Everything the bridge did to the radio and the serial link, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    ConfigureStation(StationConfig),
    StartScan(ScanConfig),
    SetInactiveTime(u16),
    Transmit(Interface, Vec<u8>),
    StartAccessPoint(AccessPointConfig),
    Restart,
    /// One write to the serial link.
    Uplink(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct Journal {
    calls: Mutex<Vec<Call>>,
}

impl Journal {
    pub fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

/// Radio double recording every call.
pub struct MockRadio {
    journal: Arc<Journal>,
    association: Mutex<RadioResult<ApRecord>>,
    transmit_result: Mutex<RadioResult<()>>,
    transmit_held: Mutex<bool>,
    transmit_gate: Condvar,
}

impl MockRadio {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            association: Mutex::new(Err(RadioError::NotConnected)),
            transmit_result: Mutex::new(Ok(())),
            transmit_held: Mutex::new(false),
            transmit_gate: Condvar::new(),
        }
    }

    pub fn set_association(&self, association: RadioResult<ApRecord>) {
        *self.association.lock().unwrap() = association;
    }

    pub fn fail_transmit(&self, err: RadioError) {
        *self.transmit_result.lock().unwrap() = Err(err);
    }

    /// Block every `transmit` after it is journaled until `release_transmit`.
    pub fn hold_transmit(&self) {
        *self.transmit_held.lock().unwrap() = true;
    }

    pub fn release_transmit(&self) {
        *self.transmit_held.lock().unwrap() = false;
        self.transmit_gate.notify_all();
    }
}

impl Radio for MockRadio {
    fn mac(&self, iface: Interface) -> RadioResult<MacAddress> {
        Ok(match iface {
            Interface::Station => STATION_MAC,
            Interface::AccessPoint => AP_MAC,
        })
    }

    fn connect(&self) -> RadioResult<()> {
        self.journal.push(Call::Connect);
        Ok(())
    }

    fn configure_station(&self, config: &StationConfig) -> RadioResult<()> {
        self.journal.push(Call::ConfigureStation(config.clone()));
        Ok(())
    }

    fn current_association(&self) -> RadioResult<ApRecord> {
        self.association.lock().unwrap().clone()
    }

    fn start_scan(&self, config: &ScanConfig) -> RadioResult<()> {
        self.journal.push(Call::StartScan(config.clone()));
        Ok(())
    }

    fn set_inactive_time(&self, _iface: Interface, seconds: u16) -> RadioResult<()> {
        self.journal.push(Call::SetInactiveTime(seconds));
        Ok(())
    }

    fn transmit(&self, iface: Interface, frame: &[u8]) -> RadioResult<()> {
        self.journal.push(Call::Transmit(iface, frame.to_vec()));
        let mut held = self.transmit_held.lock().unwrap();
        while *held {
            held = self.transmit_gate.wait(held).unwrap();
        }
        drop(held);
        self.transmit_result.lock().unwrap().clone()
    }

    fn start_access_point(&self, config: &AccessPointConfig) -> RadioResult<()> {
        self.journal.push(Call::StartAccessPoint(config.clone()));
        Ok(())
    }

    fn restart(&self) {
        self.journal.push(Call::Restart);
    }
}

/// Radio buffer counting how often it is released.
pub struct CountingBuffer {
    data: Vec<u8>,
    released: Arc<AtomicUsize>,
}

impl CountingBuffer {
    pub fn boxed(data: Vec<u8>, released: &Arc<AtomicUsize>) -> Box<dyn RxBuffer> {
        Box::new(Self {
            data,
            released: Arc::clone(released),
        })
    }
}

impl RxBuffer for CountingBuffer {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for CountingBuffer {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serial writer that also journals every write.
struct JournalWriter {
    inner: SerialStream,
    journal: Arc<Journal>,
}

impl Write for JournalWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.journal.push(Call::Uplink(buf[..n].to_vec()));
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// The host microcontroller's end of the serial link.
pub struct Host {
    reader: FrameReader<SerialStream>,
    writer: FrameWriter<SerialStream>,
}

impl Host {
    pub fn new(stream: SerialStream) -> Self {
        let token = ResyncToken::default();
        let mut read_half = stream.try_clone().expect("stream should clone");
        read_half
            .set_read_timeout(Duration::from_secs(5))
            .expect("read timeout should apply");
        // The host takes whatever the radio delivers.
        let config = FrameConfig {
            max_packet_size: 1 << 20,
            retry_on_timeout: false,
            ..FrameConfig::default()
        };
        Self {
            reader: FrameReader::with_config(read_half, token.clone(), config),
            writer: FrameWriter::with_token(stream, token),
        }
    }

    pub fn send(&mut self, message: &Message) {
        self.writer.send(message).expect("host send should succeed");
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.writer
            .get_mut()
            .write_all(bytes)
            .expect("host raw write should succeed");
    }

    pub fn recv(&mut self) -> Message {
        self.reader
            .read_message()
            .expect("bridge should send a frame")
    }

    /// Next message matching `pred`, skipping others.
    pub fn recv_until(&mut self, pred: impl Fn(&Message) -> bool) -> Message {
        for _ in 0..200 {
            let message = self.recv();
            if pred(&message) {
                return message;
            }
        }
        panic!("no matching message from bridge");
    }

    pub fn token(&self) -> [u8; 8] {
        self.writer.token().get()
    }
}

pub struct Harness {
    pub handle: BridgeHandle,
    pub host: Host,
    pub radio: Arc<MockRadio>,
    pub journal: Arc<Journal>,
    pub clock: Arc<ManualClock>,
}

pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.poll_interval = Duration::from_millis(20);
    config.softap.tick = Duration::from_millis(1);
    config.softap.alive_every = 5;
    config
}

pub fn start() -> Harness {
    start_with(test_config())
}

pub fn start_with(config: BridgeConfig) -> Harness {
    let (bridge_end, host_end) = SerialStream::pair().expect("pair should open");
    let journal = Arc::new(Journal::default());
    let radio = Arc::new(MockRadio::new(Arc::clone(&journal)));
    let clock = Arc::new(ManualClock::new(1_000));

    let reader = bridge_end.try_clone().expect("stream should clone");
    let writer = JournalWriter {
        inner: bridge_end,
        journal: Arc::clone(&journal),
    };
    let handle = Bridge::builder(radio.clone())
        .with_config(config)
        .with_clock(clock.clone())
        .start(reader, writer)
        .expect("bridge should start");

    let mut host = Host::new(host_end);
    match host.recv() {
        Message::DeviceInfo {
            firmware_version,
            mac,
        } => {
            assert_eq!(firmware_version, 8);
            assert_eq!(mac, STATION_MAC);
        }
        other => panic!("expected device info first, got {other:?}"),
    }

    Harness {
        handle,
        host,
        radio,
        journal,
        clock,
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("timed out waiting for {what}");
}

/// A frame addressed to `dst` from some other station.
pub fn ethernet_frame(dst: MacAddress, payload: &[u8]) -> Vec<u8> {
    let mut frame = dst.to_vec();
    frame.extend_from_slice(&BSSID);
    frame.extend_from_slice(&[0x08, 0x00]);
    frame.extend_from_slice(payload);
    frame
}
