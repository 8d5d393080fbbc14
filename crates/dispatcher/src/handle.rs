//! Per-sink delivery queue and worker task.

use std::sync::Arc;

use contracts::{DataSink, ModelOutputRecord};
use observability::record_frame_published;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, SinkMetrics};

/// Bounded queue in front of one sink, drained by its own task
///
/// Records are queued in main frame id order. A record whose id does not
/// advance past the last queued one is rejected, so a sink never sees the
/// same cycle twice or out of order.
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Arc<ModelOutputRecord>>,
    metrics: Arc<SinkMetrics>,
    last_queued: Option<u32>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    pub fn spawn<S: DataSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());
        let worker = tokio::spawn(drain(sink, rx, Arc::clone(&metrics)));

        Self {
            name,
            tx,
            metrics,
            last_queued: None,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue `record` without waiting on the sink.
    ///
    /// # Errors
    /// `StaleRecord` when the frame id does not advance, `QueueFull` when the
    /// sink is behind, `SinkClosed` when its worker is gone. The record is not
    /// delivered to this sink in every case.
    pub fn try_send(&mut self, record: Arc<ModelOutputRecord>) -> Result<(), DispatcherError> {
        let frame_id = record.frame_id;
        if let Some(last_frame_id) = self.last_queued.filter(|last| frame_id <= *last) {
            self.metrics.record_stale();
            return Err(DispatcherError::StaleRecord {
                sink_name: self.name.clone(),
                frame_id,
                last_frame_id,
            });
        }

        match self.tx.try_send(record) {
            Ok(()) => {
                self.last_queued = Some(frame_id);
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.record_queue_full();
                Err(DispatcherError::QueueFull {
                    sink_name: self.name.clone(),
                    frame_id,
                })
            }
            Err(TrySendError::Closed(_)) => Err(DispatcherError::SinkClosed {
                sink_name: self.name.clone(),
            }),
        }
    }

    /// Close the queue, wait for the sink to drain and return its final counters
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> MetricsSnapshot {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "sink worker panicked");
        }
        self.metrics.snapshot()
    }
}

async fn drain<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<ModelOutputRecord>>,
    metrics: Arc<SinkMetrics>,
) {
    let name = sink.name().to_string();
    debug!(sink = %name, "sink worker started");

    while let Some(record) = rx.recv().await {
        metrics.set_queue_len(rx.len());
        let delivered = match sink.write(&record).await {
            Ok(()) => {
                metrics.record_written(&record);
                true
            }
            Err(e) => {
                metrics.record_failed();
                warn!(sink = %name, frame_id = record.frame_id, error = %e, "record not written");
                false
            }
        };
        record_frame_published(&name, delivered);
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "flush on shutdown failed");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "close on shutdown failed");
    }
    debug!(sink = %name, "sink worker stopped");
}
