use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Resync token length in bytes.
pub const TOKEN_LEN: usize = 8;

/// Token in effect until the host replaces it: "UN" 0 1 2 3 4 5.
pub const DEFAULT_TOKEN: [u8; TOKEN_LEN] = [b'U', b'N', 0, 1, 2, 3, 4, 5];

/// The process-wide resync token, shared by every reader and writer.
///
/// Cloning yields another handle to the same token. The value is held in a
/// single 64-bit atomic so a writer never observes a half-updated token.
#[derive(Clone)]
pub struct ResyncToken {
    value: Arc<AtomicU64>,
}

impl ResyncToken {
    pub fn new(token: [u8; TOKEN_LEN]) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(u64::from_le_bytes(token))),
        }
    }

    /// Current token bytes.
    pub fn get(&self) -> [u8; TOKEN_LEN] {
        self.value.load(Ordering::Acquire).to_le_bytes()
    }

    /// Replace the token for all holders.
    pub fn set(&self, token: [u8; TOKEN_LEN]) {
        self.value
            .store(u64::from_le_bytes(token), Ordering::Release);
    }
}

impl Default for ResyncToken {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN)
    }
}

impl fmt::Debug for ResyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResyncToken")
            .field(&format_args!("{:02x?}", self.get()))
            .finish()
    }
}

/// Incremental token scanner.
///
/// Keeps only a cursor into the token. A mismatching byte resets the cursor
/// to zero and is not re-checked against the first token byte, so scanning
/// never rewinds consumed input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenMatcher {
    pos: usize,
}

impl TokenMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Returns true once the whole token has been seen, after
    /// which the matcher starts over.
    pub fn push(&mut self, byte: u8, token: &[u8; TOKEN_LEN]) -> bool {
        if byte == token[self.pos] {
            self.pos += 1;
        } else {
            self.pos = 0;
        }
        if self.pos == TOKEN_LEN {
            self.pos = 0;
            return true;
        }
        false
    }

    /// Number of token bytes matched so far.
    pub fn matched(&self) -> usize {
        self.pos
    }
}
