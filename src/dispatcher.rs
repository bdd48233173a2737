//! Fan-out dispatcher multiplexing chat events across all configured sinks.

use crate::config::Config;
use crate::message::{LoggableMessage, TimeoutMessage};
use crate::sink::{MariaSink, PostgresSink, Sink, SolrSink};
use crate::state::SharedState;
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Bound on how long [`Dispatcher::destroy`] waits for workers to finish.
pub const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Errors building the pipeline from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("search index client failed: {0}")]
    Search(#[from] reqwest::Error),
}

/// Fans every inbound event out to an ordered list of sinks and owns their
/// worker tasks.
///
/// `record*` calls enqueue into each sink's own queue, in configured
/// order, before returning; sink failures past that point never propagate
/// back to the producer. There is no ordering guarantee *across* sinks -
/// the same event may be durable in one store before another.
pub struct Dispatcher {
    sinks: Vec<Arc<dyn Sink>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Take ownership of `sinks` and spawn one worker task per sink that
    /// exposes a run loop. Sinks without a background loop are not
    /// scheduled.
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        let workers: Vec<JoinHandle<()>> = sinks
            .iter()
            .filter_map(|sink| Arc::clone(sink).run().map(tokio::spawn))
            .collect();

        info!(sinks = sinks.len(), workers = workers.len(), "Dispatcher started");
        Self {
            sinks,
            workers: Mutex::new(workers),
        }
    }

    /// Connect the production sinks (Postgres archive, MariaDB stats, Solr
    /// index, in that order) and start their workers.
    pub async fn connect(config: &Config, state: SharedState) -> Result<Self, SetupError> {
        let postgres = PostgresSink::connect(&config.postgres, state.clone()).await?;
        let maria = MariaSink::connect(&config.maria, state.clone()).await?;
        let solr = SolrSink::connect(&config.solr, state)?;

        Ok(Self::new(vec![
            Arc::new(postgres),
            Arc::new(maria),
            Arc::new(solr),
        ]))
    }

    /// Record a chat message into every sink.
    pub fn record_message(&self, message: &LoggableMessage) {
        crate::metrics::record_dispatch("message");
        for sink in &self.sinks {
            sink.record_message(message.clone());
        }
    }

    /// Record a whisper into every sink.
    pub fn record_whisper(&self, message: &LoggableMessage) {
        crate::metrics::record_dispatch("whisper");
        for sink in &self.sinks {
            sink.record_whisper(message.clone());
        }
    }

    /// Record a moderation timeout into every sink.
    pub fn add_timeout(&self, timeout: &TimeoutMessage) {
        crate::metrics::record_dispatch("timeout");
        for sink in &self.sinks {
            sink.add_timeout(timeout.clone());
        }
    }

    /// Record a tracked-names timeout into every sink.
    pub fn add_nam_list_timeout(&self, timeout: &TimeoutMessage) {
        crate::metrics::record_dispatch("namlist_timeout");
        for sink in &self.sinks {
            sink.add_nam_list_timeout(timeout.clone());
        }
    }

    /// Shut every sink down, then wait up to [`SHUTDOWN_WAIT`] for their
    /// workers to exit between iterations. Workers that miss the deadline
    /// are abandoned, not aborted; records still queued with them (and any
    /// unflushed search backlog) are lost. Idempotent.
    pub async fn destroy(&self) {
        for sink in &self.sinks {
            sink.shutdown();
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }

        let count = workers.len();
        if tokio::time::timeout(SHUTDOWN_WAIT, join_all(workers))
            .await
            .is_err()
        {
            warn!(
                workers = count,
                wait = ?SHUTDOWN_WAIT,
                "Sink workers did not stop in time, abandoning"
            );
        } else {
            info!(workers = count, "Dispatcher stopped");
        }
    }
}
