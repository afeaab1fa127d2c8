use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Subcommand};
use uartnic_bridge::FIRMWARE_VERSION;
use uartnic_frame::{ResyncToken, DEFAULT_TOKEN, TOKEN_LEN};
use uartnic_transport::{SerialConfig, SerialStream};

use crate::exit::{transport_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
#[cfg(unix)]
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every frame arriving on a serial port.
    Listen(ListenArgs),
    /// Send one request or packet to a bridge.
    Send(SendArgs),
    /// Run a bridge on a simulated radio behind a pseudo serial port.
    #[cfg(unix)]
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        #[cfg(unix)]
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct PortArgs {
    /// Serial device, or the socket path of a running simulator.
    pub port: PathBuf,
    /// Line speed for serial devices.
    #[arg(long, default_value_t = 4_600_000)]
    pub baud: u32,
    /// Resync token in effect on the link (16 hex digits).
    #[arg(long, value_name = "HEX")]
    pub token: Option<String>,
}

impl PortArgs {
    pub fn open(&self) -> CliResult<SerialStream> {
        let config = SerialConfig {
            baud_rate: self.baud,
            ..SerialConfig::default()
        };
        SerialStream::open(&self.port, &config).map_err(|err| {
            transport_error(&format!("failed to open {}", self.port.display()), err)
        })
    }

    pub fn resync_token(&self) -> CliResult<ResyncToken> {
        match &self.token {
            Some(hex) => parse_token(hex).map(ResyncToken::new),
            None => Ok(ResyncToken::new(DEFAULT_TOKEN)),
        }
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    #[command(subcommand)]
    pub request: Request,
}

#[derive(Subcommand, Debug)]
pub enum Request {
    /// Query the station link status.
    Link(WaitArgs),
    /// Join a network with the given credentials.
    Join(JoinArgs),
    /// Switch both ends to a new resync token.
    Token(TokenArgs),
    /// Bring up the diagnostic access point.
    Softap(SoftapArgs),
    /// Reboot the bridge.
    Reboot,
    /// Transmit one raw packet.
    Packet(PacketArgs),
}

#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Wait for the bridge's answer and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct JoinArgs {
    /// Network name (up to 32 bytes are used).
    #[arg(long)]
    pub ssid: String,
    /// WPA2 passphrase; leave empty for an open network.
    #[arg(long, env = "UARTNIC_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
    #[command(flatten)]
    pub wait: WaitArgs,
}

#[derive(Args, Debug)]
pub struct TokenArgs {
    /// The new token (16 hex digits).
    pub new_token: String,
}

#[derive(Args, Debug)]
pub struct SoftapArgs {
    /// Access point channel.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=14))]
    pub channel: u8,
    /// Skip the diagnostic broadcast task.
    #[arg(long)]
    pub silent: bool,
}

#[derive(Args, Debug)]
pub struct PacketArgs {
    /// Payload as hex digits.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Payload as a raw string.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Read the payload from a file.
    #[arg(long, conflicts_with_all = ["hex", "data"])]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Socket path to expose as the pseudo serial port.
    pub socket: PathBuf,
    /// Exit after the first host disconnects.
    #[arg(long)]
    pub once: bool,
    /// Firmware version reported in DeviceInfo.
    #[arg(long, default_value_t = FIRMWARE_VERSION)]
    pub firmware_version: u16,
    /// Capacity of each packet queue.
    #[arg(long, default_value_t = 20)]
    pub queue_capacity: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a resync token given as 16 hex digits.
pub fn parse_token(input: &str) -> CliResult<[u8; TOKEN_LEN]> {
    let bytes = parse_hex(input)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        CliError::usage(format!(
            "token must be {TOKEN_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}

/// Decode hex digits, ignoring whitespace between them.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&digits).map_err(|err| CliError::usage(format!("invalid hex {input:?}: {err}")))
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
