use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Outcome of offering an item to a hand-off queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    /// The slot was occupied; the offered item was discarded
    Dropped,
}

#[derive(Debug, Default)]
struct HandoffStats {
    accepted: AtomicU64,
    dropped: AtomicU64,
}

/// Single-slot queue between one producer and one consumer.
///
/// Offering to a full queue never blocks and never evicts the waiting item:
/// the new item is dropped instead. Clones share the same slot.
pub struct HandoffQueue<T> {
    name: &'static str,
    tx: Sender<T>,
    rx: Receiver<T>,
    stats: Arc<HandoffStats>,
}

impl<T> Clone for HandoffQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> HandoffQueue<T> {
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = bounded(1);
        Self {
            name,
            tx,
            rx,
            stats: Arc::new(HandoffStats::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue `item` if the slot is free, otherwise drop it
    pub fn offer(&self, item: T) -> Offer {
        match self.tx.try_send(item) {
            Ok(()) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                Offer::Accepted
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("{} queue full, dropping item", self.name);
                Offer::Dropped
            }
        }
    }

    /// Take the waiting item, waiting at most `timeout` for one to arrive
    pub fn poll(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take the waiting item without blocking
    pub fn try_take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Empty the queue without blocking; returns how many items were discarded
    pub fn drain(&self) -> usize {
        let mut drained = 0;
        while self.rx.try_recv().is_ok() {
            drained += 1;
        }
        if drained > 0 {
            trace!("Drained {} item(s) from {} queue", drained, self.name);
        }
        drained
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn accepted(&self) -> u64 {
        self.stats.accepted.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_full_queue_drops_newest() {
        let queue = HandoffQueue::new("test");

        assert_eq!(queue.offer(1), Offer::Accepted);
        assert_eq!(queue.offer(2), Offer::Dropped);

        // The first item survives the rejected offer
        assert_eq!(queue.poll(Duration::from_millis(10)), Some(1));
        assert_eq!(queue.poll(Duration::from_millis(10)), None);
        assert_eq!(queue.accepted(), 1);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_offer_never_blocks() {
        let queue = HandoffQueue::new("test");
        queue.offer(0u32);

        let start = Instant::now();
        for i in 1..1000 {
            queue.offer(i);
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(queue.dropped(), 999);
    }

    #[test]
    fn test_poll_times_out() {
        let queue: HandoffQueue<u8> = HandoffQueue::new("test");

        let start = Instant::now();
        assert_eq!(queue.poll(Duration::from_millis(50)), None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = HandoffQueue::new("test");
        queue.offer("frame");

        assert_eq!(queue.drain(), 1);
        assert!(queue.is_empty());
        assert_eq!(queue.drain(), 0);
    }

    #[test]
    fn test_cross_thread_handoff() {
        let queue = HandoffQueue::new("test");
        let consumer = queue.clone();

        let handle = thread::spawn(move || consumer.poll(Duration::from_secs(2)));
        thread::sleep(Duration::from_millis(20));
        queue.offer(42);

        assert_eq!(handle.join().unwrap(), Some(42));
    }
}
