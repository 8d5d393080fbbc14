//! Channel-backed frame transport.
//!
//! A `FrameFeeder` is the producer half (camera side); a
//! `ChannelFrameSource` implements `FrameSource` for the model loop.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use async_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use contracts::{BufferInfo, CameraFrame, FrameSource, StreamType};
use tracing::{debug, trace};

use crate::config::{BackpressureConfig, DropPolicy, IngestionMetrics};
use crate::error::{IngestionError, Result};

/// Thread parked in `receive`, woken by the feeder
///
/// The receiver registers itself before checking the queue, so a frame queued
/// between the check and the park leaves an unpark token and is not missed.
#[derive(Debug, Default)]
struct Waiter {
    thread: Mutex<Option<Thread>>,
}

impl Waiter {
    fn register(&self) {
        *self.thread.lock().unwrap_or_else(PoisonError::into_inner) = Some(thread::current());
    }

    fn clear(&self) {
        *self.thread.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        if let Some(thread) = self.thread.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            thread.unpark();
        }
    }
}

/// Create a connected feeder / source pair for `stream`
pub fn frame_channel(
    stream: StreamType,
    info: BufferInfo,
    config: &BackpressureConfig,
    receive_timeout: Duration,
) -> (FrameFeeder, ChannelFrameSource) {
    let (tx, rx) = bounded(config.channel_capacity.max(1));
    let metrics = Arc::new(IngestionMetrics::new());
    let waiter = Arc::new(Waiter::default());
    (
        FrameFeeder {
            stream,
            tx,
            drop_policy: config.drop_policy,
            metrics: metrics.clone(),
            waiter: waiter.clone(),
        },
        ChannelFrameSource {
            stream,
            rx,
            info,
            receive_timeout,
            connected: false,
            connect_after: 0,
            connect_calls: 0,
            metrics,
            waiter,
        },
    )
}

/// Producer half of a frame channel
#[derive(Debug, Clone)]
pub struct FrameFeeder {
    stream: StreamType,
    tx: Sender<CameraFrame>,
    drop_policy: DropPolicy,
    metrics: Arc<IngestionMetrics>,
    waiter: Arc<Waiter>,
}

impl FrameFeeder {
    pub fn stream(&self) -> StreamType {
        self.stream
    }

    /// Queue one frame, applying the drop policy when full
    ///
    /// # Errors
    /// `ChannelClosed` once the consumer is gone.
    pub fn feed(&self, frame: CameraFrame) -> Result<()> {
        let frame_id = frame.frame_id;
        match self.drop_policy {
            DropPolicy::DropOldest => match self.tx.force_send(frame) {
                Ok(None) => {}
                Ok(Some(evicted)) => {
                    self.metrics.record_overflow();
                    trace!(stream = %self.stream, evicted = evicted.frame_id, "frame evicted");
                }
                Err(_) => return Err(self.closed()),
            },
            DropPolicy::DropNewest => match self.tx.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.metrics.record_overflow();
                    trace!(stream = %self.stream, frame_id, "frame discarded, channel full");
                    return Ok(());
                }
                Err(TrySendError::Closed(_)) => return Err(self.closed()),
            },
        }
        self.metrics.record_sent();
        self.waiter.wake();
        Ok(())
    }

    /// Record a frame the producer deliberately skipped
    pub fn skip(&self) {
        self.metrics.record_skipped();
    }

    /// Disconnect; the source drains what is queued, then reports no frame
    pub fn close(&self) {
        self.tx.close();
        self.waiter.wake();
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    fn closed(&self) -> IngestionError {
        IngestionError::ChannelClosed {
            stream: self.stream,
        }
    }
}

/// Consumer half of a frame channel
#[derive(Debug)]
pub struct ChannelFrameSource {
    stream: StreamType,
    rx: Receiver<CameraFrame>,
    info: BufferInfo,
    receive_timeout: Duration,
    connected: bool,
    connect_after: u32,
    connect_calls: u32,
    metrics: Arc<IngestionMetrics>,
    waiter: Arc<Waiter>,
}

impl ChannelFrameSource {
    /// Refuse the first `attempts` non-blocking connects (producer not up yet)
    pub fn with_connect_delay(mut self, attempts: u32) -> Self {
        self.connect_after = attempts;
        self
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl FrameSource for ChannelFrameSource {
    fn stream(&self) -> StreamType {
        self.stream
    }

    fn connect(&mut self, blocking: bool) -> bool {
        self.connect_calls = self.connect_calls.saturating_add(1);
        if blocking || self.connect_calls > self.connect_after {
            self.connected = true;
        }
        if self.connected {
            debug!(stream = %self.stream, attempts = self.connect_calls, "frame source connected");
        }
        self.connected
    }

    fn receive(&mut self) -> Option<CameraFrame> {
        if !self.connected {
            return None;
        }

        let deadline = Instant::now() + self.receive_timeout;
        self.waiter.register();
        let frame = loop {
            match self.rx.try_recv() {
                Ok(frame) => break Some(frame),
                Err(TryRecvError::Closed) => break None,
                Err(TryRecvError::Empty) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break None;
                    }
                    thread::park_timeout(remaining);
                }
            }
        };
        self.waiter.clear();
        frame
    }

    fn buffer_info(&self) -> Option<BufferInfo> {
        self.connected.then_some(self.info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn make_frame(frame_id: u32) -> CameraFrame {
        CameraFrame {
            stream: StreamType::Road,
            frame_id,
            timestamp_sof: u64::from(frame_id) * 50_000_000,
            timestamp_eof: u64::from(frame_id) * 50_000_000 + 1,
            info: BufferInfo::nv12(4, 4),
            data: Bytes::new(),
        }
    }

    fn make_pair(capacity: usize, policy: DropPolicy) -> (FrameFeeder, ChannelFrameSource) {
        frame_channel(
            StreamType::Road,
            BufferInfo::nv12(4, 4),
            &BackpressureConfig::new(capacity, policy),
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_receive_requires_connect() {
        let (feeder, mut source) = make_pair(4, DropPolicy::DropOldest);
        feeder.feed(make_frame(1)).unwrap();
        assert!(source.receive().is_none());
        assert!(source.buffer_info().is_none());
        assert!(source.connect(false));
        assert_eq!(source.receive().map(|f| f.frame_id), Some(1));
        assert!(source.receive().is_none());
    }

    #[test]
    fn test_connect_delay() {
        let (_feeder, source) = make_pair(4, DropPolicy::DropOldest);
        let mut source = source.with_connect_delay(2);
        assert!(!source.connect(false));
        assert!(!source.connect(false));
        assert!(source.connect(false));
        assert!(source.buffer_info().is_some());
    }

    #[test]
    fn test_drop_oldest_keeps_latest() {
        let (feeder, mut source) = make_pair(2, DropPolicy::DropOldest);
        for id in 1..=4 {
            feeder.feed(make_frame(id)).unwrap();
        }
        source.connect(true);
        assert_eq!(source.receive().map(|f| f.frame_id), Some(3));
        assert_eq!(source.receive().map(|f| f.frame_id), Some(4));
        assert_eq!(feeder.metrics().snapshot().frames_overflowed, 2);
    }

    #[test]
    fn test_drop_newest_keeps_earliest() {
        let (feeder, mut source) = make_pair(2, DropPolicy::DropNewest);
        for id in 1..=4 {
            feeder.feed(make_frame(id)).unwrap();
        }
        source.connect(true);
        assert_eq!(source.receive().map(|f| f.frame_id), Some(1));
        assert_eq!(source.receive().map(|f| f.frame_id), Some(2));
        let snapshot = feeder.metrics().snapshot();
        assert_eq!(snapshot.frames_sent, 2);
        assert_eq!(snapshot.frames_overflowed, 2);
    }

    #[test]
    fn test_closed_feeder_drains_then_stops() {
        let (feeder, mut source) = make_pair(4, DropPolicy::DropOldest);
        feeder.feed(make_frame(1)).unwrap();
        feeder.close();
        source.connect(true);
        assert!(source.receive().is_some());
        assert!(source.receive().is_none());
        assert!(matches!(
            feeder.feed(make_frame(2)),
            Err(IngestionError::ChannelClosed { .. })
        ));
    }

    #[test]
    fn test_dropped_source_closes_feeder() {
        let (feeder, source) = make_pair(4, DropPolicy::DropNewest);
        drop(source);
        assert!(feeder.feed(make_frame(1)).is_err());
    }

    #[test]
    fn test_receive_wakes_on_frame_from_other_thread() {
        let (feeder, mut source) = frame_channel(
            StreamType::Road,
            BufferInfo::nv12(4, 4),
            &BackpressureConfig::new(4, DropPolicy::DropOldest),
            Duration::from_secs(5),
        );
        source.connect(true);

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            feeder.feed(make_frame(3)).unwrap();
            feeder
        });

        let start = Instant::now();
        assert_eq!(source.receive().map(|f| f.frame_id), Some(3));
        assert!(start.elapsed() < Duration::from_secs(2));
        drop(producer.join().unwrap());
    }

    #[test]
    fn test_receive_times_out_without_frame() {
        let (_feeder, mut source) = make_pair(4, DropPolicy::DropOldest);
        source.connect(true);
        let start = Instant::now();
        assert!(source.receive().is_none());
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
