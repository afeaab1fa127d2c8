use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use uartnic_bridge::StatsSnapshot;
use uartnic_frame::Message;
use uartnic_transport::format_mac;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput {
    #[serde(rename = "type")]
    kind: &'static str,
    type_code: u8,
    wire_size: usize,
    #[serde(flatten)]
    fields: MessageFields,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageFields {
    DeviceInfo { firmware_version: u16, mac: String },
    LinkStatus { up: bool },
    ClientConfig { ssid: String, password_len: usize },
    Packet { size: usize, payload: String },
    SetResyncToken { token: String },
    StartAccessPoint { channel: u8 },
    Alive { code: u8 },
    None {},
}

impl MessageFields {
    fn from_message(message: &Message) -> Self {
        match message {
            Message::DeviceInfo {
                firmware_version,
                mac,
            } => Self::DeviceInfo {
                firmware_version: *firmware_version,
                mac: format_mac(mac),
            },
            Message::LinkStatus { up } => Self::LinkStatus { up: *up },
            Message::GetLinkStatus => Self::None {},
            Message::ClientConfig { ssid, password } => Self::ClientConfig {
                ssid: String::from_utf8_lossy(ssid).into_owned(),
                password_len: password.len(),
            },
            Message::Packet(data) => Self::Packet {
                size: data.len(),
                payload: hex::encode(data),
            },
            Message::SetResyncToken(token) => Self::SetResyncToken {
                token: hex::encode(token),
            },
            Message::StartAccessPoint { channel } => Self::StartAccessPoint { channel: *channel },
            Message::Alive { code } => Self::Alive { code: *code },
        }
    }
}

pub fn print_message(message: &Message, format: OutputFormat) {
    let kind = message.message_type();
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind: kind.name(),
                type_code: kind.as_u8(),
                wire_size: message.wire_size(),
                fields: MessageFields::from_message(message),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "SIZE", "DETAIL"])
                .add_row(vec![
                    kind.name().to_string(),
                    message.wire_size().to_string(),
                    describe(message),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} size={} {}",
                kind.name(),
                message.wire_size(),
                describe(message)
            );
        }
        // Only packet payloads have a raw form.
        OutputFormat::Raw => {
            if let Message::Packet(data) = message {
                print_raw(data);
            }
        }
    }
}

pub fn print_stats(stats: &StatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(stats).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in stat_rows(stats) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (name, value) in stat_rows(stats) {
                println!("{name}={value}");
            }
        }
    }
}

fn stat_rows(stats: &StatsSnapshot) -> Vec<(&'static str, u64)> {
    vec![
        ("frames_from_host", stats.frames_from_host),
        ("frames_to_host", stats.frames_to_host),
        ("packets_to_host", stats.packets_to_host),
        ("packets_to_radio", stats.packets_to_radio),
        ("rx_filtered", stats.rx_filtered),
        ("ingress_dropped", stats.ingress_dropped),
        ("egress_dropped", stats.egress_dropped),
        ("oversized", stats.oversized),
        ("out_of_memory", stats.out_of_memory),
        ("unknown_type", stats.unknown_type),
        ("transmit_failed", stats.transmit_failed),
        ("uplink_errors", stats.uplink_errors),
    ]
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// One-line summary of the message fields.
pub fn describe(message: &Message) -> String {
    match message {
        Message::DeviceInfo {
            firmware_version,
            mac,
        } => format!("firmware={firmware_version} mac={}", format_mac(mac)),
        Message::LinkStatus { up } => format!("up={up}"),
        Message::GetLinkStatus => String::new(),
        Message::ClientConfig { ssid, password } => format!(
            "ssid={} password_len={}",
            String::from_utf8_lossy(ssid),
            password.len()
        ),
        Message::Packet(data) => format!("len={} payload={}", data.len(), payload_preview(data)),
        Message::SetResyncToken(token) => format!("token={}", hex::encode(token)),
        Message::StartAccessPoint { channel } => format!("channel={channel}"),
        Message::Alive { code } => format!("code={code}"),
    }
}

fn payload_preview(payload: &[u8]) -> String {
    const PREVIEW: usize = 32;
    if payload.len() <= PREVIEW {
        hex::encode(payload)
    } else {
        format!("{}..", hex::encode(&payload[..PREVIEW]))
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn describe_device_info() {
        let message = Message::DeviceInfo {
            firmware_version: 8,
            mac: [0x24, 0x0a, 0xc4, 0x11, 0x22, 0x33],
        };
        assert_eq!(describe(&message), "firmware=8 mac=24:0a:c4:11:22:33");
    }

    #[test]
    fn describe_never_shows_password() {
        let message = Message::ClientConfig {
            ssid: Bytes::from_static(b"lab"),
            password: Bytes::from_static(b"hunter22"),
        };
        let text = describe(&message);
        assert!(!text.contains("hunter22"));
        assert!(text.contains("password_len=8"));
    }

    #[test]
    fn long_packets_are_truncated() {
        let message = Message::Packet(Bytes::from(vec![0xab; 100]));
        let text = describe(&message);
        assert!(text.starts_with("len=100 payload=abab"));
        assert!(text.ends_with(".."));
    }

    #[test]
    fn json_fields_flatten_into_message() {
        let out = MessageOutput {
            kind: "LINK_STATUS",
            type_code: 1,
            wire_size: 10,
            fields: MessageFields::from_message(&Message::LinkStatus { up: true }),
            timestamp: "0".to_string(),
        };
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["type"], "LINK_STATUS");
        assert_eq!(value["up"], true);
        assert_eq!(value["wire_size"], 10);
    }

    #[test]
    fn token_renders_as_lowercase_hex() {
        let fields = MessageFields::from_message(&Message::SetResyncToken(*b"NEWTOKEN"));
        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(value["token"], "4e4557544f4b454e");
        assert_eq!(
            describe(&Message::SetResyncToken([0xde, 0xad, 0, 1, 2, 3, 4, 5])),
            "token=dead000102030405"
        );
    }
}
