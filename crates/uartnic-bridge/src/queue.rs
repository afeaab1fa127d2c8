use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::trace;

use crate::buffer::PacketBuffer;
use crate::error::{BridgeError, Result};

/// Bounded FIFO carrying packet ownership between bridge threads.
///
/// Enqueueing never blocks: when the queue is full the buffer is released
/// and the newest packet is lost. Clones share the same queue.
#[derive(Clone)]
pub struct PacketQueue {
    name: &'static str,
    tx: Sender<PacketBuffer>,
    rx: Receiver<PacketBuffer>,
}

impl PacketQueue {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { name, tx, rx }
    }

    /// Move `buffer` into the queue, or release it if the queue is full.
    pub fn try_push(&self, buffer: PacketBuffer) -> Result<()> {
        match self.tx.try_send(buffer) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(buffer)) | Err(TrySendError::Disconnected(buffer)) => {
                trace!(queue = self.name, len = buffer.len(), "releasing dropped buffer");
                drop(buffer);
                Err(BridgeError::QueueFull(self.name))
            }
        }
    }

    /// Take the oldest buffer, waiting at most `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<PacketBuffer> {
        match self.rx.recv_timeout(timeout) {
            Ok(buffer) => Some(buffer),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }
}

impl std::fmt::Debug for PacketQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketQueue")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use uartnic_transport::RxBuffer;

    use super::*;

    struct Counted(Arc<AtomicUsize>);

    impl RxBuffer for Counted {
        fn as_bytes(&self) -> &[u8] {
            &[0x01, 0, 0, 0, 0, 0]
        }
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn fifo_order() {
        let queue = PacketQueue::new("test", 4);
        for i in 0..3u8 {
            queue.try_push(PacketBuffer::from_heap(vec![i])).unwrap();
        }
        assert_eq!(queue.len(), 3);
        for i in 0..3u8 {
            let buffer = queue.pop_timeout(Duration::from_millis(10)).unwrap();
            assert_eq!(buffer.as_bytes(), &[i]);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_releases_buffer_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let queue = PacketQueue::new("ingress", 2);
        for _ in 0..2 {
            queue
                .try_push(PacketBuffer::from_radio(Box::new(Counted(Arc::clone(
                    &released,
                )))))
                .unwrap();
        }

        let err = queue
            .try_push(PacketBuffer::from_radio(Box::new(Counted(Arc::clone(
                &released,
            )))))
            .unwrap_err();
        assert!(matches!(err, BridgeError::QueueFull("ingress")));
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len(), 2);

        drop(queue);
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn pop_times_out_when_empty() {
        let queue = PacketQueue::new("egress", 20);
        assert_eq!(queue.capacity(), 20);
        assert!(queue.pop_timeout(Duration::from_millis(5)).is_none());
    }
}
