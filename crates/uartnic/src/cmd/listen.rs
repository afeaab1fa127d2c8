use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use uartnic_frame::{FrameConfig, FrameError, FrameReader};

use crate::cmd::{install_ctrlc_handler, ListenArgs};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

/// How often a quiet link is checked for Ctrl-C.
const POLL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let token = args.port.resync_token()?;
    let mut stream = args.port.open()?;
    stream
        .set_read_timeout(POLL)
        .map_err(|err| transport_error("failed to configure port", err))?;

    let config = FrameConfig {
        retry_on_timeout: false,
        ..FrameConfig::default()
    };
    let mut reader = FrameReader::with_config(stream, token, config);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let message = match reader.read_message() {
            Ok(message) => message,
            Err(FrameError::ConnectionClosed) => break,
            Err(FrameError::Io(err)) if is_timeout(&err) => continue,
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "skipping frame");
                continue;
            }
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        print_message(&message, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
