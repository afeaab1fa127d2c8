//! Resync-token message framing for the uartnic serial protocol.
//!
//! Every message on the serial link is framed as:
//! - the current 8-byte resync token, used to regain byte alignment
//! - a 1-byte message type
//! - a type-specific payload; variable-length payloads carry their own
//!   length field, multi-byte integers are little-endian
//!
//! There is no checksum. A reader that loses alignment simply scans for the
//! next token.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod token;
pub mod writer;

pub use codec::{encode_message, FrameConfig, Message, MAX_PACKET_SIZE};
pub use error::{FrameError, Result};
pub use message::{message_name, MessageType};
pub use reader::FrameReader;
pub use token::{ResyncToken, TokenMatcher, DEFAULT_TOKEN, TOKEN_LEN};
pub use writer::FrameWriter;
