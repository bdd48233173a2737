//! Test infrastructure: in-memory fakes for the store and search-backend
//! seams, plus helpers for building records and waiting on worker progress.

// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use chatsink::message::{LoggableMessage, TimeoutMessage};
use chatsink::sink::solr::{SearchBackend, SolrDocument};
use chatsink::sink::worker::StoreWriter;
use chatsink::sink::{Sink, SinkEvent, WriteError};
use chrono::Utc;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Chat message with a distinct raw line, so event uuids stay unique.
pub fn message(text: &str) -> LoggableMessage {
    LoggableMessage::new(
        "alice",
        "1234",
        text,
        false,
        false,
        format!(":alice!alice@chat PRIVMSG #channel :{text}"),
        Utc::now(),
    )
}

pub fn timeout_message(username: &str) -> TimeoutMessage {
    TimeoutMessage::new(username, "42", 600)
}

/// Spin (on the paused clock) until `done` holds, panicking if it never
/// does.
pub async fn wait_until(what: &str, done: impl Fn() -> bool) {
    for _ in 0..600 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {what}");
}

/// In-memory message store with scripted failures. Stands in for a
/// relational store behind the [`StoreWriter`] seam.
#[derive(Clone, Default)]
pub struct FakeStore {
    written: Arc<Mutex<Vec<String>>>,
    attempts: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until [`recover`](Self::recover) is called.
    pub fn break_store(&self) {
        self.failing.store(true, Ordering::Release);
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::Release);
    }

    /// Texts of successfully written messages, in write order.
    pub fn written(&self) -> Vec<String> {
        self.written.lock().clone()
    }

    /// Total write attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }
}

#[async_trait]
impl StoreWriter for FakeStore {
    type Record = LoggableMessage;

    fn store(&self) -> &'static str {
        "fake"
    }

    fn map(&self, event: SinkEvent) -> Option<LoggableMessage> {
        match event {
            SinkEvent::Message(message) => Some(message),
            _ => None,
        }
    }

    async fn write(&self, record: &LoggableMessage) -> Result<(), WriteError> {
        self.attempts.fetch_add(1, Ordering::AcqRel);
        if self.failing.load(Ordering::Acquire) {
            return Err(WriteError::Database(sqlx::Error::Protocol(
                "injected store failure".into(),
            )));
        }
        self.written.lock().push(record.text().to_string());
        Ok(())
    }
}

/// In-memory search backend recording every bulk attempt.
#[derive(Clone, Default)]
pub struct FakeSearchBackend {
    attempts: Arc<Mutex<Vec<Vec<SolrDocument>>>>,
    commits: Arc<Mutex<Vec<Vec<SolrDocument>>>>,
    failing: Arc<AtomicBool>,
}

impl FakeSearchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn break_index(&self) {
        self.failing.store(true, Ordering::Release);
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::Release);
    }

    /// Every bulk attempt, failed ones included.
    pub fn attempts(&self) -> Vec<Vec<SolrDocument>> {
        self.attempts.lock().clone()
    }

    /// Successful bulk commits only.
    pub fn commits(&self) -> Vec<Vec<SolrDocument>> {
        self.commits.lock().clone()
    }
}

#[async_trait]
impl SearchBackend for FakeSearchBackend {
    async fn add_documents(&self, documents: &[SolrDocument]) -> Result<(), WriteError> {
        self.attempts.lock().push(documents.to_vec());
        if self.failing.load(Ordering::Acquire) {
            return Err(WriteError::Remote(
                reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
        self.commits.lock().push(documents.to_vec());
        Ok(())
    }
}

/// Calls observed by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeenEvent {
    Message(String),
    Whisper(String),
    Timeout(String),
    NamListTimeout(String),
}

/// Loop-less sink that records every fan-out call it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub seen: Mutex<Vec<SeenEvent>>,
    pub shutdowns: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Sink for RecordingSink {
    fn record_message(&self, message: LoggableMessage) {
        self.seen
            .lock()
            .push(SeenEvent::Message(message.uuid().to_string()));
    }

    fn record_whisper(&self, message: LoggableMessage) {
        self.seen
            .lock()
            .push(SeenEvent::Whisper(message.uuid().to_string()));
    }

    fn add_timeout(&self, timeout: TimeoutMessage) {
        self.seen
            .lock()
            .push(SeenEvent::Timeout(timeout.username().to_string()));
    }

    fn add_nam_list_timeout(&self, timeout: TimeoutMessage) {
        self.seen
            .lock()
            .push(SeenEvent::NamListTimeout(timeout.username().to_string()));
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::AcqRel);
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Sink whose worker never makes progress and ignores shutdown - the
/// pathological case the dispatcher's bounded wait exists for.
#[derive(Default)]
pub struct StuckSink {
    pub shutdowns: AtomicUsize,
}

impl StuckSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Sink for StuckSink {
    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::AcqRel);
    }

    fn run(self: Arc<Self>) -> Option<BoxFuture<'static, ()>> {
        Some(Box::pin(std::future::pending()))
    }

    fn name(&self) -> &'static str {
        "stuck"
    }
}
