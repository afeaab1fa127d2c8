mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "uartnic", version, about = "Serial network bridge host tools")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::Request;

    #[test]
    fn parses_send_link_with_wait() {
        let cli = Cli::try_parse_from([
            "uartnic",
            "send",
            "/tmp/bridge.sock",
            "link",
            "--wait",
            "--wait-timeout",
            "2s",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => match args.request {
                Request::Link(wait) => {
                    assert!(wait.wait);
                    assert_eq!(wait.wait_timeout, "2s");
                }
                other => panic!("unexpected request {other:?}"),
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_packet_payloads() {
        let err = Cli::try_parse_from([
            "uartnic",
            "send",
            "/tmp/bridge.sock",
            "packet",
            "--hex",
            "ffff",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_out_of_range_softap_channel() {
        let err = Cli::try_parse_from([
            "uartnic",
            "send",
            "/dev/ttyUSB0",
            "softap",
            "--channel",
            "15",
        ])
        .expect_err("channel 15 should be rejected");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "uartnic",
            "listen",
            "/dev/ttyUSB0",
            "--count",
            "3",
            "--format",
            "pretty",
            "--log-level",
            "debug",
        ])
        .expect("listen args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Pretty)));
        assert!(matches!(cli.log_level, LogLevel::Debug));
        match cli.command {
            Command::Listen(args) => assert_eq!(args.count, Some(3)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn parses_simulate_subcommand() {
        let cli = Cli::try_parse_from(["uartnic", "simulate", "/tmp/bridge.sock", "--once"])
            .expect("simulate args should parse");
        match cli.command {
            Command::Simulate(args) => {
                assert!(args.once);
                assert_eq!(args.firmware_version, 8);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
