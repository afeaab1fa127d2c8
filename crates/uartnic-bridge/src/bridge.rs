use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use tracing::{debug, info, warn};
use uartnic_frame::{FrameReader, Message, ResyncToken, TOKEN_LEN};
use uartnic_transport::{
    Interface, Radio, RadioError, RadioEvent, ScanOutcome, SerialStream,
};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::health::{Clock, HealthAction, LinkHealth, SystemClock};
use crate::ingress::{RadioSink, StationMac};
use crate::queue::PacketQueue;
use crate::softap::SoftAp;
use crate::stats::{BridgeStats, StatsSnapshot};
use crate::uplink::Uplink;

/// Process-wide bridge context shared by all bridge threads.
pub struct Bridge {
    pub(crate) config: BridgeConfig,
    pub(crate) radio: Arc<dyn Radio>,
    pub(crate) uplink: Uplink,
    pub(crate) token: ResyncToken,
    pub(crate) health: Arc<LinkHealth>,
    pub(crate) ingress: PacketQueue,
    pub(crate) egress: PacketQueue,
    pub(crate) station_mac: Arc<StationMac>,
    pub(crate) stats: Arc<BridgeStats>,
    pub(crate) softap: SoftAp,
    events: Receiver<RadioEvent>,
    sink: RadioSink,
    running: AtomicBool,
}

impl Bridge {
    /// Start configuring a bridge around `radio`.
    pub fn builder(radio: Arc<dyn Radio>) -> BridgeBuilder {
        BridgeBuilder {
            radio,
            config: BridgeConfig::default(),
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask every bridge thread to stop and cancel the diagnostic task.
    pub(crate) fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!("bridge stopping");
        }
        self.softap.stop();
    }

    /// Perform a link health action.
    pub(crate) fn apply(&self, action: HealthAction) {
        match action {
            HealthAction::SetInactiveTime(secs) => {
                if let Err(err) = self.radio.set_inactive_time(Interface::Station, secs) {
                    warn!(secs, error = %err, "failed to set inactivity timeout");
                }
            }
            HealthAction::ReportLink(up) => {
                info!(up, "reporting link status");
                self.uplink
                    .send_logged(&Message::LinkStatus { up }, &self.stats);
            }
            HealthAction::Reconnect => {
                if let Err(err) = self.radio.connect() {
                    warn!(error = %err, "reconnect request failed");
                }
            }
            HealthAction::StartScan => {
                if let Err(err) = self.radio.start_scan(&self.config.scan) {
                    // No scan-done event will follow; count it as a failed scan.
                    warn!(error = %err, "failed to start probe scan");
                    let next = self
                        .health
                        .on_scan_done(&ScanOutcome::failed(), || Err(RadioError::NotConnected));
                    if let Some(next) = next {
                        self.apply(next);
                    }
                }
            }
        }
    }

    fn run_event_loop(self: &Arc<Self>) {
        info!("radio event task started");
        while self.is_running() {
            match self.events.recv_timeout(self.config.poll_interval) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("radio event task stopped");
    }

    fn handle_event(self: &Arc<Self>, event: RadioEvent) {
        debug!(?event, "radio event");
        match event {
            RadioEvent::StationStarted => {
                if let Err(err) = self.radio.connect() {
                    warn!(error = %err, "connect request failed");
                }
            }
            RadioEvent::StationConnected => {
                for action in self.health.on_connected() {
                    self.apply(action);
                }
            }
            RadioEvent::StationDisconnected => {
                for action in self.health.on_disconnected() {
                    self.apply(action);
                }
            }
            RadioEvent::ScanDone(outcome) => {
                let radio = &self.radio;
                if let Some(action) = self
                    .health
                    .on_scan_done(&outcome, || radio.current_association())
                {
                    self.apply(action);
                }
            }
            RadioEvent::AccessPointStarted => self.on_access_point_started(),
            RadioEvent::AccessPointStopped => self.softap.stop(),
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("running", &self.is_running())
            .field("token", &self.token)
            .field("health", &self.health)
            .field("ingress", &self.ingress)
            .field("egress", &self.egress)
            .finish_non_exhaustive()
    }
}

/// Configures and starts a [`Bridge`].
pub struct BridgeBuilder {
    radio: Arc<dyn Radio>,
    config: BridgeConfig,
    clock: Arc<dyn Clock>,
}

impl BridgeBuilder {
    /// Override bridge configuration.
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the clock used for link inactivity.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start the bridge on a serial link.
    pub fn start_serial(self, stream: SerialStream) -> Result<BridgeHandle> {
        let reader = stream.try_clone()?;
        self.start(reader, stream)
    }

    /// Start the bridge threads on separate read and write halves of the
    /// serial link.
    pub fn start<R, W>(self, reader: R, writer: W) -> Result<BridgeHandle>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let BridgeBuilder {
            radio,
            config,
            clock,
        } = self;

        let token = ResyncToken::default();
        let stats = Arc::new(BridgeStats::default());
        let health = Arc::new(LinkHealth::new(config.health.clone(), clock));
        let ingress = PacketQueue::new("ingress", config.queue_capacity);
        let egress = PacketQueue::new("egress", config.queue_capacity);
        let station_mac = Arc::new(StationMac::default());
        match radio.mac(Interface::Station) {
            Ok(mac) => station_mac.set(mac),
            Err(err) => warn!(error = %err, "station MAC unavailable at startup"),
        }

        let (events_tx, events_rx) = unbounded();
        let sink = RadioSink {
            health: Arc::clone(&health),
            queue: ingress.clone(),
            events: events_tx,
            station_mac: Arc::clone(&station_mac),
            stats: Arc::clone(&stats),
        };

        let reader = FrameReader::with_config(reader, token.clone(), config.frame.clone());
        let uplink = Uplink::new(Box::new(writer), token.clone(), config.frame.clone());

        let bridge = Arc::new(Bridge {
            config,
            radio,
            uplink,
            token,
            health,
            ingress,
            egress,
            station_mac,
            stats,
            softap: SoftAp::default(),
            events: events_rx,
            sink,
            running: AtomicBool::new(true),
        });

        let mut handle = BridgeHandle {
            bridge: Arc::clone(&bridge),
            reader: None,
            workers: Vec::new(),
        };

        let worker = Arc::clone(&bridge);
        handle
            .workers
            .push(spawn("ingress-drain", move || worker.run_ingress_drain())?);
        let worker = Arc::clone(&bridge);
        handle
            .workers
            .push(spawn("egress-drain", move || worker.run_egress_drain())?);
        let worker = Arc::clone(&bridge);
        handle
            .workers
            .push(spawn("radio-events", move || worker.run_event_loop())?);
        let worker = Arc::clone(&bridge);
        handle.reader = Some(spawn("egress-read", move || worker.run_read_loop(reader))?.1);

        info!(
            firmware_version = bridge.config.firmware_version,
            "bridge started"
        );
        Ok(handle)
    }
}

fn spawn<T, F>(name: &'static str, f: F) -> Result<(&'static str, JoinHandle<T>)>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(format!("uartnic-{name}"))
        .spawn(f)
        .map(|handle| (name, handle))
        .map_err(|source| BridgeError::Spawn { name, source })
}

/// Owner of a running bridge.
///
/// Dropping the handle asks the bridge to stop without waiting for it.
pub struct BridgeHandle {
    bridge: Arc<Bridge>,
    reader: Option<JoinHandle<Result<()>>>,
    workers: Vec<(&'static str, JoinHandle<()>)>,
}

impl BridgeHandle {
    /// Callback entry points to hand to the radio driver.
    pub fn sink(&self) -> RadioSink {
        self.bridge.sink.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.bridge.stats.snapshot()
    }

    /// The live counters, readable after the handle is consumed.
    pub fn counters(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.bridge.stats)
    }

    pub fn health(&self) -> &LinkHealth {
        &self.bridge.health
    }

    /// The resync token currently in effect.
    pub fn token(&self) -> [u8; TOKEN_LEN] {
        self.bridge.token.get()
    }

    pub fn is_running(&self) -> bool {
        self.bridge.is_running()
    }

    /// Whether the diagnostic access point task is running.
    pub fn diagnostic_task_running(&self) -> bool {
        self.bridge.softap.is_task_running()
    }

    /// Block until the serial link closes or a reboot is requested, then
    /// stop the remaining threads.
    pub fn wait(mut self) -> Result<()> {
        let result = match self.reader.take() {
            Some(reader) => reader
                .join()
                .map_err(|_| BridgeError::Panicked("egress-read"))?,
            None => Ok(()),
        };
        self.join_workers()?;
        result
    }

    /// Stop the bridge and wait for every thread except the serial reader,
    /// which exits once the link delivers its next frame or closes.
    pub fn shutdown(mut self) -> Result<()> {
        self.join_workers()
    }

    fn join_workers(&mut self) -> Result<()> {
        self.bridge.stop();
        for (name, worker) in self.workers.drain(..) {
            worker.join().map_err(|_| BridgeError::Panicked(name))?;
        }
        Ok(())
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.bridge.stop();
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("bridge", &self.bridge)
            .field("threads", &(self.workers.len() + usize::from(self.reader.is_some())))
            .finish()
    }
}
