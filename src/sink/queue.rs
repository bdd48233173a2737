//! Pending-record queue shared by the producer side and one sink worker.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;

/// Queue depth past which the high-water callback fires.
pub const DEFAULT_HIGH_WATER: usize = 10_000;

/// Invoked with the current depth when a push takes the queue past its
/// high-water mark. Advisory only: the queue never throttles or sheds.
pub type HighWaterCallback = Box<dyn Fn(usize) + Send + Sync>;

/// Unbounded multi-producer/single-consumer buffer of pending records.
///
/// FIFO, except that [`push_front`](Self::push_front) reinserts a failed
/// record at the head so its retry precedes anything enqueued after it.
pub struct RecordQueue<T> {
    sink: &'static str,
    records: Mutex<VecDeque<T>>,
    available: Notify,
    high_water: usize,
    on_high_water: HighWaterCallback,
}

impl<T> RecordQueue<T> {
    /// Queue with the default high-water mark and a callback that emits the
    /// operational high-capacity log.
    pub fn new(sink: &'static str) -> Self {
        Self::with_high_water(
            sink,
            DEFAULT_HIGH_WATER,
            Box::new(move |depth| {
                tracing::error!(sink = sink, depth = depth, "Queue has reached high capacity");
            }),
        )
    }

    /// Queue with a custom high-water mark and backpressure policy. The
    /// callback decides what "too deep" means operationally (page, shed,
    /// block); the queue itself only reports.
    pub fn with_high_water(
        sink: &'static str,
        high_water: usize,
        on_high_water: HighWaterCallback,
    ) -> Self {
        Self {
            sink,
            records: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            high_water,
            on_high_water,
        }
    }

    /// Append a record. Never blocks.
    pub fn push_back(&self, record: T) {
        let depth = {
            let mut records = self.records.lock();
            records.push_back(record);
            records.len()
        };
        self.after_push(depth);
    }

    /// Reinsert a record at the head, ahead of everything enqueued after
    /// it. Used by workers to retry a failed write before newer records.
    pub fn push_front(&self, record: T) {
        let depth = {
            let mut records = self.records.lock();
            records.push_front(record);
            records.len()
        };
        self.after_push(depth);
    }

    fn after_push(&self, depth: usize) {
        crate::metrics::set_queue_depth(self.sink, depth);
        if depth > self.high_water {
            (self.on_high_water)(depth);
        }
        self.available.notify_one();
    }

    /// Take the head record, waiting up to `wait` for one to arrive.
    ///
    /// Returns `None` on timeout so the single consumer can re-check its
    /// running flags between waits.
    pub async fn pop_front(&self, wait: Duration) -> Option<T> {
        if let Some(record) = self.take_head() {
            return Some(record);
        }
        let _ = tokio::time::timeout(wait, self.available.notified()).await;
        self.take_head()
    }

    fn take_head(&self) -> Option<T> {
        let (record, depth) = {
            let mut records = self.records.lock();
            let record = records.pop_front();
            (record, records.len())
        };
        if record.is_some() {
            crate::metrics::set_queue_depth(self.sink, depth);
        }
        record
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
