use std::fs;
use std::io::Read;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};
use uartnic_bridge::softap::{REBOOT_CHANNEL, SILENT_CHANNEL_OFFSET};
use uartnic_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, Message, MessageType};
use uartnic_transport::{PASSWORD_LEN, SSID_LEN};

use crate::cmd::listen::is_timeout;
use crate::cmd::{parse_hex, parse_token, PacketArgs, Request, SendArgs};
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let token = args.port.resync_token()?;
    let message = build_message(&args.request)?;
    let wait = response_wait(&args.request)?;

    let stream = args.port.open()?;
    let mut reader = match wait {
        Some((timeout, _)) => {
            let mut read_half = stream
                .try_clone()
                .map_err(|err| transport_error("failed to clone port", err))?;
            read_half
                .set_read_timeout(timeout)
                .map_err(|err| transport_error("failed to configure port", err))?;
            let config = FrameConfig {
                retry_on_timeout: false,
                ..FrameConfig::default()
            };
            Some(FrameReader::with_config(read_half, token.clone(), config))
        }
        None => None,
    };

    let mut writer = FrameWriter::with_token(stream, token);
    writer
        .send(&message)
        .map_err(|err| frame_error("send failed", err))?;
    info!(kind = %message.message_type(), size = message.wire_size(), "frame sent");

    if let (Some((timeout, expected)), Some(reader)) = (wait, reader.as_mut()) {
        let response = wait_for_response(reader, expected, timeout)?;
        print_message(&response, format);
    }

    Ok(SUCCESS)
}

fn build_message(request: &Request) -> CliResult<Message> {
    Ok(match request {
        Request::Link(_) => Message::GetLinkStatus,
        Request::Join(join) => {
            if join.ssid.len() > SSID_LEN {
                return Err(CliError::usage(format!(
                    "ssid is {} bytes, the bridge keeps at most {SSID_LEN}",
                    join.ssid.len()
                )));
            }
            if join.password.len() > PASSWORD_LEN {
                return Err(CliError::usage(format!(
                    "password is {} bytes, the bridge keeps at most {PASSWORD_LEN}",
                    join.password.len()
                )));
            }
            Message::ClientConfig {
                ssid: Bytes::from(join.ssid.clone().into_bytes()),
                password: Bytes::from(join.password.clone().into_bytes()),
            }
        }
        Request::Token(args) => Message::SetResyncToken(parse_token(&args.new_token)?),
        Request::Softap(args) => Message::StartAccessPoint {
            channel: if args.silent {
                args.channel + SILENT_CHANNEL_OFFSET
            } else {
                args.channel
            },
        },
        Request::Reboot => Message::StartAccessPoint {
            channel: REBOOT_CHANNEL,
        },
        Request::Packet(args) => Message::Packet(Bytes::from(resolve_payload(args)?)),
    })
}

/// The answer a request is waiting for, if `--wait` was given.
fn response_wait(request: &Request) -> CliResult<Option<(Duration, MessageType)>> {
    let (wait, expected) = match request {
        Request::Link(wait) => (wait, MessageType::LinkStatus),
        Request::Join(join) => (&join.wait, MessageType::DeviceInfo),
        _ => return Ok(None),
    };
    if !wait.wait {
        return Ok(None);
    }
    Ok(Some((parse_duration(&wait.wait_timeout)?, expected)))
}

fn resolve_payload(args: &PacketArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::usage("packet needs one of --hex, --data or --file"))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

trait MessageSource {
    fn next_message(&mut self) -> uartnic_frame::Result<Message>;
}

impl<T: Read> MessageSource for FrameReader<T> {
    fn next_message(&mut self) -> uartnic_frame::Result<Message> {
        self.read_message()
    }
}

/// Read until a message of the `expected` type arrives. Packets and other
/// traffic in between are skipped.
fn wait_for_response<S: MessageSource>(
    source: &mut S,
    expected: MessageType,
    timeout: Duration,
) -> CliResult<Message> {
    let deadline = Instant::now() + timeout;
    let timed_out = || {
        CliError::new(
            TIMEOUT,
            format!("no {expected} from the bridge within {timeout:?}"),
        )
    };

    while Instant::now() < deadline {
        match source.next_message() {
            Ok(message) if message.message_type() == expected => return Ok(message),
            Ok(message) => debug!(kind = %message.message_type(), "skipping frame"),
            Err(FrameError::Io(err)) if is_timeout(&err) => return Err(timed_out()),
            Err(err) if err.is_recoverable() => warn!(error = %err, "skipping frame"),
            Err(err) => return Err(frame_error("receive failed", err)),
        }
    }
    Err(timed_out())
}
