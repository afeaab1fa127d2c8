use std::fmt;

use bytes::Bytes;
use uartnic_transport::RxBuffer;

/// An owned packet travelling between the radio and the serial link.
///
/// A buffer has exactly one owner. Moving it into a queue moves ownership;
/// dropping it releases the storage (radio buffers go back to the driver),
/// so a buffer can neither be released twice nor read after release.
pub struct PacketBuffer {
    storage: Storage,
}

enum Storage {
    Radio(Box<dyn RxBuffer>),
    Heap(Bytes),
}

impl PacketBuffer {
    /// Wrap a frame handed over by the radio driver.
    pub fn from_radio(buffer: Box<dyn RxBuffer>) -> Self {
        Self {
            storage: Storage::Radio(buffer),
        }
    }

    /// Wrap a payload read from the serial link.
    pub fn from_heap(data: impl Into<Bytes>) -> Self {
        Self {
            storage: Storage::Heap(data.into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Radio(buffer) => buffer.as_bytes(),
            Storage::Heap(data) => data,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Whether the storage belongs to the radio driver.
    pub fn is_radio(&self) -> bool {
        matches!(self.storage, Storage::Radio(_))
    }
}

impl fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("origin", &if self.is_radio() { "radio" } else { "heap" })
            .field("len", &self.len())
            .finish()
    }
}
