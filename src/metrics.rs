//! Prometheus metrics for the persistence pipeline.
//!
//! Tracks event fan-out, per-store commit/failure counts, batch commits to
//! the search index and queue depths. The embedding bot calls [`init`]
//! once at startup and serves [`gather_metrics`] however it likes; every
//! recording helper is a no-op until then, so library tests and embedders
//! that do not care about metrics pay nothing.

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all pipeline metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Events fanned out by the dispatcher, by kind.
pub static EVENTS_DISPATCHED: OnceLock<IntCounterVec> = OnceLock::new();

/// Records durably written, by store.
pub static WRITES_COMMITTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Failed write attempts (retried or re-batched), by store.
pub static WRITE_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Documents committed to the search index in bulk flushes.
pub static DOCUMENTS_INDEXED: OnceLock<IntCounter> = OnceLock::new();

/// Pending records per sink queue.
pub static QUEUE_DEPTH: OnceLock<IntGaugeVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(EVENTS_DISPATCHED, IntCounterVec::new(Opts::new("chatsink_events_dispatched_total", "Events fanned out to sinks by kind"), &["kind"]));
    register!(WRITES_COMMITTED, IntCounterVec::new(Opts::new("chatsink_writes_committed_total", "Records durably written by store"), &["store"]));
    register!(WRITE_FAILURES, IntCounterVec::new(Opts::new("chatsink_write_failures_total", "Failed write attempts by store"), &["store"]));
    register!(DOCUMENTS_INDEXED, IntCounter::new("chatsink_documents_indexed_total", "Documents committed to the search index"));
    register!(QUEUE_DEPTH, IntGaugeVec::new(Opts::new("chatsink_queue_depth", "Pending records per sink queue"), &["sink"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

pub(crate) fn record_dispatch(kind: &'static str) {
    if let Some(counter) = EVENTS_DISPATCHED.get() {
        counter.with_label_values(&[kind]).inc();
    }
}

pub(crate) fn record_commit(store: &'static str) {
    if let Some(counter) = WRITES_COMMITTED.get() {
        counter.with_label_values(&[store]).inc();
    }
}

pub(crate) fn record_write_failure(store: &'static str) {
    if let Some(counter) = WRITE_FAILURES.get() {
        counter.with_label_values(&[store]).inc();
    }
}

pub(crate) fn record_batch_commit(documents: usize) {
    if let Some(counter) = DOCUMENTS_INDEXED.get() {
        counter.inc_by(documents as u64);
    }
}

pub(crate) fn set_queue_depth(sink: &'static str, depth: usize) {
    if let Some(gauge) = QUEUE_DEPTH.get() {
        gauge.with_label_values(&[sink]).set(depth as i64);
    }
}
