//! Persistence sinks.
//!
//! Every sink is an independent persistence target: it owns its queue of
//! pending records and (usually) a background worker that drains it. The
//! [`Dispatcher`](crate::dispatcher::Dispatcher) fans each event out to all
//! configured sinks; failures past that point are a sink-local concern and
//! never reach the producer.

pub mod maria;
pub mod postgres;
pub mod queue;
pub mod solr;
pub mod worker;

pub use maria::{MariaSink, MariaWriter};
pub use postgres::{PostgresSink, PostgresWriter};
pub use queue::RecordQueue;
pub use solr::{HttpSolrClient, SearchBackend, SolrDocument, SolrSink};
pub use worker::{RelationalSink, StoreWriter};

use crate::message::{LoggableMessage, TimeoutMessage};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;

/// Errors on a sink's write path.
///
/// These are recovered locally (retry or keep-for-next-batch) and logged;
/// they are never surfaced to the caller of `record*`.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("search index error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search index rejected update: {0}")]
    Remote(reqwest::StatusCode),
    /// Malformed record surfaced at write time (the pipeline performs no
    /// validation on intake).
    #[error("invalid record: {0}")]
    Invalid(String),
}

/// A queued write destined for a relational store.
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Message(LoggableMessage),
    Whisper(LoggableMessage),
    Timeout(TimeoutMessage),
    NamListTimeout(TimeoutMessage),
}

impl SinkEvent {
    /// Static label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SinkEvent::Message(_) => "message",
            SinkEvent::Whisper(_) => "whisper",
            SinkEvent::Timeout(_) => "timeout",
            SinkEvent::NamListTimeout(_) => "namlist_timeout",
        }
    }
}

/// One persistence target with its own queue and worker.
///
/// The `record*`/`add*` operations enqueue and return immediately. A sink
/// opts into the event kinds it supports; the defaults are no-ops, so an
/// unsupported event simply does not reach that sink's store.
pub trait Sink: Send + Sync + 'static {
    /// Queue a chat message for durable storage.
    fn record_message(&self, _message: LoggableMessage) {}

    /// Queue a whisper for durable storage.
    fn record_whisper(&self, _message: LoggableMessage) {}

    /// Queue a moderation timeout.
    fn add_timeout(&self, _timeout: TimeoutMessage) {}

    /// Queue a timeout for the tracked-names list.
    fn add_nam_list_timeout(&self, _timeout: TimeoutMessage) {}

    /// Signal the sink's worker to stop. Does not block and does not
    /// interrupt an in-flight write; the worker observes the flag at its
    /// next iteration boundary.
    fn shutdown(&self);

    /// The sink's background worker, if it runs one. The dispatcher spawns
    /// the returned future exactly once; sinks without a loop return `None`
    /// and are not scheduled.
    fn run(self: Arc<Self>) -> Option<BoxFuture<'static, ()>> {
        None
    }

    /// Static name for logs and metrics.
    fn name(&self) -> &'static str;
}
