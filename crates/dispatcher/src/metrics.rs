//! Per-sink delivery accounting
//!
//! Besides write/failure counts, each sink tracks the model frame ids it has
//! delivered: gaps between consecutive delivered ids are cycles the consumer
//! never saw (prepare-only cycles, camera drops, queue drops).

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use contracts::ModelOutputRecord;

/// Counters for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    written: AtomicU64,
    failed: AtomicU64,
    queue_full: AtomicU64,
    stale: AtomicU64,
    frame_gaps: AtomicU64,
    uncalibrated: AtomicU64,
    last_frame_id: AtomicU32,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Account a delivered record.
    ///
    /// Only the sink worker calls this, so the load/store pair on the last
    /// frame id does not race.
    pub fn record_written(&self, record: &ModelOutputRecord) {
        let previous = self.written.fetch_add(1, Ordering::Relaxed);
        if previous > 0 {
            let last = self.last_frame_id.load(Ordering::Relaxed);
            let gap = record.frame_id.saturating_sub(last).saturating_sub(1);
            self.frame_gaps.fetch_add(u64::from(gap), Ordering::Relaxed);
        }
        self.last_frame_id.store(record.frame_id, Ordering::Relaxed);
        if !record.live_calib_seen {
            self.uncalibrated.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_full(&self) {
        self.queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.queue_full.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let write_count = self.write_count();
        MetricsSnapshot {
            queue_len: self.queue_len.load(Ordering::Relaxed),
            write_count,
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
            stale_count: self.stale.load(Ordering::Relaxed),
            frame_gap_total: self.frame_gaps.load(Ordering::Relaxed),
            uncalibrated_count: self.uncalibrated.load(Ordering::Relaxed),
            last_frame_id: (write_count > 0).then(|| self.last_frame_id.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    /// Rejected because the sink queue was full
    pub dropped_count: u64,
    /// Rejected because the frame id did not advance
    pub stale_count: u64,
    /// Frame ids skipped between consecutive delivered records
    pub frame_gap_total: u64,
    /// Delivered before any live calibration was seen
    pub uncalibrated_count: u64,
    pub last_frame_id: Option<u32>,
}
