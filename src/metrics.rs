use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime metrics for the collector.
///
/// Purpose:
/// - Track open Jetstream connections
/// - Track frame throughput and decode quality
/// - Track how many posts survive each gate
///
/// Design:
/// - Lock-free (Atomics)
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    // Connections
    pub connections_active: AtomicUsize,
    pub connect_failures: AtomicUsize,

    // Frames
    pub frames_received: AtomicUsize,
    pub decode_errors: AtomicUsize,
    pub processing_errors: AtomicUsize,

    // Gates
    pub events_skipped: AtomicUsize,
    pub posts_matched: AtomicUsize,
    pub items_too_short: AtomicUsize,
    pub items_emitted: AtomicUsize,
}

impl RuntimeMetrics {
    /// Single-line snapshot for periodic reporting.
    pub fn summary(&self) -> String {
        format!(
            "ws={} connect_err={} frames={} decode_err={} proc_err={} skipped={} matched={} short={} emitted={}",
            self.connections_active.load(Ordering::Relaxed),
            self.connect_failures.load(Ordering::Relaxed),
            self.frames_received.load(Ordering::Relaxed),
            self.decode_errors.load(Ordering::Relaxed),
            self.processing_errors.load(Ordering::Relaxed),
            self.events_skipped.load(Ordering::Relaxed),
            self.posts_matched.load(Ordering::Relaxed),
            self.items_too_short.load(Ordering::Relaxed),
            self.items_emitted.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));

/// Increments a counter by one.
pub fn incr(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Decrements a counter by one.
pub fn decr(counter: &AtomicUsize) {
    counter.fetch_sub(1, Ordering::Relaxed);
}
