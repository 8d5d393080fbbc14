//! Backpressure configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// What a full frame channel does with a new frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DropPolicy {
    /// Evict the oldest queued frame (camera ring-buffer behaviour)
    #[default]
    DropOldest,
    /// Discard the incoming frame
    DropNewest,
}

/// Backpressure configuration
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    /// Channel capacity
    pub channel_capacity: usize,

    /// Drop policy when full
    pub drop_policy: DropPolicy,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 4,
            drop_policy: DropPolicy::DropOldest,
        }
    }
}

impl BackpressureConfig {
    /// Create new backpressure configuration
    pub fn new(channel_capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
            drop_policy,
        }
    }
}

/// Per-stream feed metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Frames handed to the channel
    pub frames_sent: AtomicU64,

    /// Frames lost to a full channel
    pub frames_overflowed: AtomicU64,

    /// Frames the producer skipped on purpose (simulated drops)
    pub frames_skipped: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow(&self) {
        self.frames_overflowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_overflowed: self.frames_overflowed.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub frames_overflowed: u64,
    pub frames_skipped: u64,
}
