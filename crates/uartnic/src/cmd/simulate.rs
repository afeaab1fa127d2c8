use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::info;
use uartnic_bridge::{Bridge, BridgeConfig, LoopbackRadio, StatsSnapshot};
use uartnic_transport::{SerialStream, SocketSerial};

use crate::cmd::{install_ctrlc_handler, SimulateArgs};
use crate::exit::{bridge_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_stats, OutputFormat};

const POLL: Duration = Duration::from_millis(50);

/// Serve hosts one at a time on a pseudo serial port. Each connection gets
/// a fresh bridge and radio, as if the device had just powered up.
pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let port =
        SocketSerial::bind(&args.socket).map_err(|err| transport_error("bind failed", err))?;
    port.set_nonblocking(true)
        .map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let config = BridgeConfig {
        firmware_version: args.firmware_version,
        queue_capacity: args.queue_capacity,
        ..BridgeConfig::default()
    };

    let mut sessions = 0u64;
    while running.load(Ordering::SeqCst) {
        let stream = match port
            .try_accept()
            .map_err(|err| transport_error("accept failed", err))?
        {
            Some(stream) => stream,
            None => {
                thread::sleep(POLL);
                continue;
            }
        };

        sessions += 1;
        info!(session = sessions, "host connected");
        let stats = serve(stream, config.clone(), &running)?;
        info!(session = sessions, "host disconnected");
        print_stats(&stats, format);

        if args.once {
            break;
        }
    }

    Ok(SUCCESS)
}

fn serve(
    stream: SerialStream,
    config: BridgeConfig,
    running: &AtomicBool,
) -> CliResult<StatsSnapshot> {
    let radio = Arc::new(LoopbackRadio::new());
    let handle = Bridge::builder(radio.clone())
        .with_config(config)
        .start_serial(stream)
        .map_err(|err| bridge_error("bridge failed to start", err))?;
    radio.attach(handle.sink());

    while handle.is_running() && running.load(Ordering::SeqCst) {
        thread::sleep(POLL);
    }

    let counters = handle.counters();
    let result = if handle.is_running() {
        handle.shutdown()
    } else {
        handle.wait()
    };
    result.map_err(|err| bridge_error("bridge failed", err))?;

    if radio.restarted() {
        info!("host requested a reboot");
    }
    Ok(counters.snapshot())
}
