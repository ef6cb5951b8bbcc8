//! Lightweight global metrics for initialization.
//!
//! Потокобезопасные атомарные счётчики, общие для всех Initializer'ов процесса:
//! - labels / bytes / batches produced by compute providers and appended to files
//! - per-file outcomes (completed, truncated)
//! - cancellations and discovered PoW nonces

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Batches -----
static BATCHES_COMPUTED: AtomicU64 = AtomicU64::new(0);
static LABELS_WRITTEN: AtomicU64 = AtomicU64::new(0);
static BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static WRITER_FLUSHES: AtomicU64 = AtomicU64::new(0);

// ----- Files -----
static FILES_COMPLETED: AtomicU64 = AtomicU64::new(0);
static FILES_TRUNCATED: AtomicU64 = AtomicU64::new(0);

// ----- Runs -----
static CANCELLATIONS: AtomicU64 = AtomicU64::new(0);
static NONCES_FOUND: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub batches_computed: u64,
    pub labels_written: u64,
    pub bytes_written: u64,
    pub writer_flushes: u64,

    pub files_completed: u64,
    pub files_truncated: u64,

    pub cancellations: u64,
    pub nonces_found: u64,
}

impl MetricsSnapshot {
    pub fn avg_batch_labels(&self) -> f64 {
        if self.batches_computed == 0 {
            0.0
        } else {
            self.labels_written as f64 / self.batches_computed as f64
        }
    }
}

// ----- Recorders -----
pub fn record_batch(labels: u64, bytes: usize) {
    BATCHES_COMPUTED.fetch_add(1, Ordering::Relaxed);
    LABELS_WRITTEN.fetch_add(labels, Ordering::Relaxed);
    BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_flush() {
    WRITER_FLUSHES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_file_completed() {
    FILES_COMPLETED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_file_truncated() {
    FILES_TRUNCATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_cancellation() {
    CANCELLATIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_nonce_found() {
    NONCES_FOUND.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        batches_computed: BATCHES_COMPUTED.load(Ordering::Relaxed),
        labels_written: LABELS_WRITTEN.load(Ordering::Relaxed),
        bytes_written: BYTES_WRITTEN.load(Ordering::Relaxed),
        writer_flushes: WRITER_FLUSHES.load(Ordering::Relaxed),

        files_completed: FILES_COMPLETED.load(Ordering::Relaxed),
        files_truncated: FILES_TRUNCATED.load(Ordering::Relaxed),

        cancellations: CANCELLATIONS.load(Ordering::Relaxed),
        nonces_found: NONCES_FOUND.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    BATCHES_COMPUTED.store(0, Ordering::Relaxed);
    LABELS_WRITTEN.store(0, Ordering::Relaxed);
    BYTES_WRITTEN.store(0, Ordering::Relaxed);
    WRITER_FLUSHES.store(0, Ordering::Relaxed);

    FILES_COMPLETED.store(0, Ordering::Relaxed);
    FILES_TRUNCATED.store(0, Ordering::Relaxed);

    CANCELLATIONS.store(0, Ordering::Relaxed);
    NONCES_FOUND.store(0, Ordering::Relaxed);
}
