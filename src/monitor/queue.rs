//! Ingest queue feeding a dispatch loop.
//!
//! Unbounded FIFO with many producers and one consumer. `push` never blocks
//! on the consumer, which is what lets driver callbacks return promptly.
//! Once the queue is closed every push is counted and dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::error::MonitorError;

#[derive(Debug, Default)]
struct Shared {
    // Pushes hold the read side, `close` takes the write side, so no push can
    // land after the final drain.
    closed: RwLock<bool>,
    pushed: AtomicU64,
    discarded: AtomicU64,
}

/// Push handle handed to driver callbacks.
#[derive(Debug)]
pub struct IngestProducer<T> {
    tx: Sender<T>,
    shared: Arc<Shared>,
}

impl<T> Clone for IngestProducer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> IngestProducer<T> {
    /// Appends `item` to the tail and wakes the consumer.
    ///
    /// Returns false if the queue is closed; the item is dropped and counted
    /// as discarded.
    pub fn push(&self, item: T) -> bool {
        let closed = self.shared.closed.read().unwrap_or_else(PoisonError::into_inner);
        // The queue owns a receiver for its whole lifetime, so send only fails
        // once the queue itself is gone.
        if *closed || self.tx.send(item).is_err() {
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.shared.pushed.fetch_add(1, Ordering::Relaxed);
        true
    }
}

/// The queue itself; owns the single consumer end.
#[derive(Debug)]
pub struct IngestQueue<T> {
    producer: IngestProducer<T>,
    rx: Receiver<T>,
}

impl<T> Default for IngestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IngestQueue<T> {
    /// An empty, open queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            producer: IngestProducer {
                tx,
                shared: Arc::new(Shared::default()),
            },
            rx,
        }
    }

    /// A cloneable push handle.
    #[must_use]
    pub fn producer(&self) -> IngestProducer<T> {
        self.producer.clone()
    }

    /// Appends `item` to the tail. Returns false once the queue is closed.
    pub fn push(&self, item: T) -> bool {
        self.producer.push(item)
    }

    /// Blocks until an item is available and returns the oldest one.
    ///
    /// Returns `None` only if every producer is gone, which cannot happen
    /// while the queue is alive since it keeps one itself.
    pub fn pop(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, MonitorError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => MonitorError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => MonitorError::Disconnected {
                path: "ingest_queue".to_string(),
            },
        })
    }

    /// Removes and returns everything currently queued without blocking.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    /// Number of items waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Total items ever accepted.
    #[must_use]
    pub fn pushed(&self) -> u64 {
        self.producer.shared.pushed.load(Ordering::Relaxed)
    }

    /// Items dropped because the queue was closed, either still queued at
    /// close time or pushed afterwards.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.producer.shared.discarded.load(Ordering::Relaxed)
    }

    /// Refuses every later push and drops whatever is still queued.
    ///
    /// Idempotent. Returns how many queued items this call dropped.
    pub fn close(&self) -> usize {
        {
            let mut closed = self.producer.shared.closed.write().unwrap_or_else(PoisonError::into_inner);
            *closed = true;
        }
        let dropped = self.rx.try_iter().count();
        self.producer
            .shared
            .discarded
            .fetch_add(u64::try_from(dropped).unwrap_or(u64::MAX), Ordering::Relaxed);
        dropped
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.producer.shared.closed.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn pop_returns_items_in_push_order() {
        let q = IngestQueue::new();
        for i in 0..5 {
            q.push(i);
        }
        let got: Vec<i32> = (0..5).map(|_| q.pop().unwrap()).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
        assert_eq!(q.pushed(), 5);
    }

    #[test]
    fn pop_blocks_until_a_producer_pushes() {
        let q = IngestQueue::new();
        let producer = q.producer();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push("late");
        });
        assert_eq!(q.pop(), Some("late"));
        t.join().unwrap();
    }

    #[test]
    fn pop_timeout_reports_timeout_when_empty() {
        let q: IngestQueue<u8> = IngestQueue::new();
        let err = q.pop_timeout(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, MonitorError::Timeout { duration_ms: 5 }));
    }

    #[test]
    fn close_drops_queued_items_and_refuses_later_pushes() {
        let q = IngestQueue::new();
        let producer = q.producer();
        for i in 0..3 {
            assert!(producer.push(i));
        }

        assert_eq!(q.close(), 3);
        assert!(q.is_closed());
        assert!(q.is_empty());

        for i in 0..10_000 {
            assert!(!producer.push(i));
        }
        assert!(!q.push(7));
        assert_eq!(q.len(), 0);
        assert_eq!(q.pushed(), 3);
        assert_eq!(q.discarded(), 10_004);
        assert_eq!(q.close(), 0);
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        let q = IngestQueue::new();
        let mut handles = Vec::new();
        for p in 0..4u32 {
            let producer = q.producer();
            handles.push(thread::spawn(move || {
                for i in 0..250u32 {
                    producer.push((p, i));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let items = q.drain();
        assert_eq!(items.len(), 1000);
        for p in 0..4u32 {
            let seq: Vec<u32> = items.iter().filter(|(pp, _)| *pp == p).map(|(_, i)| *i).collect();
            assert_eq!(seq, (0..250).collect::<Vec<_>>());
        }
    }
}
