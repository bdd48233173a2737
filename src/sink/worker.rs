//! Generic durable-write worker shared by the relational sinks.
//!
//! The original pipeline duplicated the dequeue/retry/backoff loop per
//! store; here it exists once, parameterized by a [`StoreWriter`] that
//! supplies the event-to-statement mapping and the write itself. Each
//! store is a small adapter.

use crate::message::{LoggableMessage, TimeoutMessage};
use crate::sink::queue::RecordQueue;
use crate::sink::{Sink, SinkEvent, WriteError};
use crate::state::SharedState;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// How long a worker waits on its queue before re-checking running flags.
pub(crate) const POLL_WAIT: Duration = Duration::from_secs(1);

/// Fixed delay after a failed write, so a degraded store is not hot-looped.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Store-specific half of a relational sink.
#[async_trait]
pub trait StoreWriter: Send + Sync + 'static {
    /// The unit queued for this store.
    type Record: Send + 'static;

    /// Static store name for logs and metrics.
    fn store(&self) -> &'static str;

    /// Map an inbound event to this store's queued record. `None` means
    /// the store does not support the event kind; it is dropped before
    /// ever entering the queue.
    fn map(&self, event: SinkEvent) -> Option<Self::Record>;

    /// Attempt one durable write. Any error requeues the record at the
    /// head for retry after backoff.
    async fn write(&self, record: &Self::Record) -> Result<(), WriteError>;
}

/// A relational sink: one unbounded queue, one retrying consumer loop,
/// writes delegated to a [`StoreWriter`].
pub struct RelationalSink<W: StoreWriter> {
    writer: Arc<W>,
    queue: Arc<RecordQueue<W::Record>>,
    state: SharedState,
    running: AtomicBool,
}

impl<W: StoreWriter> RelationalSink<W> {
    pub fn new(writer: W, state: SharedState) -> Self {
        let queue = Arc::new(RecordQueue::new(writer.store()));
        Self {
            writer: Arc::new(writer),
            queue,
            state,
            running: AtomicBool::new(true),
        }
    }

    /// Sink with a custom pending-record queue (high-water mark or
    /// backpressure policy other than the default advisory log).
    pub fn with_queue(writer: W, state: SharedState, queue: RecordQueue<W::Record>) -> Self {
        Self {
            writer: Arc::new(writer),
            queue: Arc::new(queue),
            state,
            running: AtomicBool::new(true),
        }
    }

    /// Records currently waiting for a write.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn enqueue(&self, event: SinkEvent) {
        if let Some(record) = self.writer.map(event) {
            self.queue.push_back(record);
        }
    }

    /// The worker loop. Dequeues one record at a time and attempts a
    /// durable write; a failed record goes back to the head of the queue
    /// and is retried after a fixed backoff, so original submission order
    /// is preserved. Exits when the process stops running or the sink is
    /// shut down, without draining what is left queued.
    async fn drive(self: Arc<Self>) {
        let store = self.writer.store();
        info!(store = store, "Sink worker started");

        let mut last_failed = false;
        while self.state.is_running() && self.running.load(Ordering::Acquire) {
            let Some(record) = self.queue.pop_front(POLL_WAIT).await else {
                continue;
            };

            match self.writer.write(&record).await {
                Ok(()) => {
                    crate::metrics::record_commit(store);
                    last_failed = false;
                }
                Err(e) => {
                    warn!(store = store, error = %e, "Write failed, requeueing at head");
                    self.queue.push_front(record);
                    crate::metrics::record_write_failure(store);
                    last_failed = true;
                }
            }

            if last_failed {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }

        info!(store = store, pending = self.queue.len(), "Sink worker stopped");
    }
}

impl<W: StoreWriter> Sink for RelationalSink<W> {
    fn record_message(&self, message: LoggableMessage) {
        self.enqueue(SinkEvent::Message(message));
    }

    fn record_whisper(&self, message: LoggableMessage) {
        self.enqueue(SinkEvent::Whisper(message));
    }

    fn add_timeout(&self, timeout: TimeoutMessage) {
        self.enqueue(SinkEvent::Timeout(timeout));
    }

    fn add_nam_list_timeout(&self, timeout: TimeoutMessage) {
        self.enqueue(SinkEvent::NamListTimeout(timeout));
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn run(self: Arc<Self>) -> Option<BoxFuture<'static, ()>> {
        Some(Box::pin(self.drive()))
    }

    fn name(&self) -> &'static str {
        self.writer.store()
    }
}
