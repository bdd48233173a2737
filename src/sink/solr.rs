//! Batched Solr search-index sink.
//!
//! Single inserts are prohibitively expensive for Solr, so this sink does
//! not write per event. Dequeued messages are transformed into index
//! documents and parked in a commit backlog; the whole backlog is flushed
//! as one bulk update at most every [`COMMIT_INTERVAL`], trading up to that
//! much durability lag for amortized write cost.

use crate::config::SolrConfig;
use crate::message::LoggableMessage;
use crate::sink::queue::RecordQueue;
use crate::sink::worker::POLL_WAIT;
use crate::sink::{Sink, WriteError};
use crate::state::SharedState;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Minimum spacing between bulk flush attempts.
pub const COMMIT_INTERVAL: Duration = Duration::from_secs(10);

/// `commitWithin` handed to Solr with each update, in milliseconds.
const COMMIT_WITHIN_MS: u64 = 1000;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One message as indexed by Solr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolrDocument {
    /// Event uuid; Solr dedupes on it.
    pub id: String,
    /// RFC3339 timestamp.
    pub time: String,
    pub username: String,
    pub message: String,
}

impl From<&LoggableMessage> for SolrDocument {
    fn from(message: &LoggableMessage) -> Self {
        Self {
            id: message.uuid().to_string(),
            time: message.time_iso(),
            username: message.sender().to_string(),
            message: message.text().to_string(),
        }
    }
}

/// Bulk-update half of the search sink. Seam for tests; production uses
/// [`HttpSolrClient`].
#[async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    /// Submit one bulk add. All-or-nothing from the sink's perspective.
    async fn add_documents(&self, documents: &[SolrDocument]) -> Result<(), WriteError>;
}

/// Solr client posting JSON document arrays to the core's update handler.
pub struct HttpSolrClient {
    http: reqwest::Client,
    update_url: String,
}

impl HttpSolrClient {
    pub fn new(config: &SolrConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let update_url = format!(
            "{}/update?commitWithin={}",
            config.url.trim_end_matches('/'),
            COMMIT_WITHIN_MS
        );
        Ok(Self { http, update_url })
    }
}

#[async_trait]
impl SearchBackend for HttpSolrClient {
    async fn add_documents(&self, documents: &[SolrDocument]) -> Result<(), WriteError> {
        let response = self
            .http
            .post(&self.update_url)
            .json(documents)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WriteError::Remote(response.status()));
        }
        Ok(())
    }
}

/// Search-index sink with time-windowed bulk writes.
///
/// Only chat messages are indexed; the other event kinds fall through to
/// the [`Sink`] no-op defaults.
pub struct SolrSink<B: SearchBackend = HttpSolrClient> {
    backend: Arc<B>,
    queue: Arc<RecordQueue<LoggableMessage>>,
    state: SharedState,
    running: AtomicBool,
}

impl SolrSink {
    /// Build the production sink against the configured core.
    pub fn connect(config: &SolrConfig, state: SharedState) -> Result<Self, reqwest::Error> {
        Ok(Self::with_backend(HttpSolrClient::new(config)?, state))
    }
}

impl<B: SearchBackend> SolrSink<B> {
    pub fn with_backend(backend: B, state: SharedState) -> Self {
        Self {
            backend: Arc::new(backend),
            queue: Arc::new(RecordQueue::new("solr")),
            state,
            running: AtomicBool::new(true),
        }
    }

    /// Dequeue loop and flush policy. Two independent timing domains: a
    /// short timed wait pulls messages into the backlog one at a time, and
    /// the backlog is flushed as a unit once [`COMMIT_INTERVAL`] has passed
    /// since the previous flush attempt. A failed flush leaves the backlog
    /// untouched and simply resets the timer; whatever is still backlogged
    /// at shutdown is lost.
    async fn drive(self: Arc<Self>) {
        info!(store = "solr", "Sink worker started");

        let mut backlog: Vec<SolrDocument> = Vec::new();
        let mut last_commit = Instant::now();

        while self.state.is_running() && self.running.load(Ordering::Acquire) {
            if let Some(message) = self.queue.pop_front(POLL_WAIT).await {
                backlog.push(SolrDocument::from(&message));
            }

            if !backlog.is_empty() && last_commit.elapsed() >= COMMIT_INTERVAL {
                // Flush exactly the documents present now; anything arriving
                // later waits for the next window.
                let batch = backlog.len();
                match self.backend.add_documents(&backlog[..batch]).await {
                    Ok(()) => {
                        debug!(store = "solr", added = batch, "Committed batch");
                        crate::metrics::record_batch_commit(batch);
                        backlog.drain(..batch);
                    }
                    Err(e) => {
                        warn!(store = "solr", error = %e, pending = backlog.len(), "Solr error, keeping backlog");
                        crate::metrics::record_write_failure("solr");
                    }
                }
                last_commit = Instant::now();
            }
        }

        info!(store = "solr", undelivered = backlog.len(), "Sink worker stopped");
    }
}

impl<B: SearchBackend> Sink for SolrSink<B> {
    fn record_message(&self, message: LoggableMessage) {
        self.queue.push_back(message);
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn run(self: Arc<Self>) -> Option<BoxFuture<'static, ()>> {
        Some(Box::pin(self.drive()))
    }

    fn name(&self) -> &'static str {
        "solr"
    }
}
