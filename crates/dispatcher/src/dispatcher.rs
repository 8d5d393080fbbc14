//! Fan-out of model output records to the configured sinks.

use std::sync::Arc;

use contracts::{ContractError, ModelOutputRecord, SinkConfig, SinkType};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Totals over every record the dispatcher received
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DispatchSummary {
    pub records: u64,
    /// Records that no sink accepted
    pub undelivered: u64,
    /// Sum of the camera frames the model loop reported as dropped
    pub camera_frames_dropped: u64,
    pub max_drop_ratio: f32,
    pub first_frame_id: Option<u32>,
    pub last_frame_id: Option<u32>,
}

impl DispatchSummary {
    fn observe(&mut self, record: &ModelOutputRecord, accepted: usize) {
        self.records += 1;
        if accepted == 0 {
            self.undelivered += 1;
        }
        self.camera_frames_dropped += u64::from(record.frames_dropped);
        self.max_drop_ratio = self.max_drop_ratio.max(record.frame_drop_ratio);
        self.first_frame_id.get_or_insert(record.frame_id);
        self.last_frame_id = Some(record.frame_id);
    }

    /// Cycles between the first and last record that never reached the dispatcher
    pub fn missing_cycles(&self) -> u64 {
        match (self.first_frame_id, self.last_frame_id) {
            (Some(first), Some(last)) => {
                (u64::from(last.saturating_sub(first)) + 1).saturating_sub(self.records)
            }
            _ => 0,
        }
    }
}

/// What a finished dispatcher hands back
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub summary: DispatchSummary,
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl DispatchReport {
    pub fn sink(&self, name: &str) -> Option<&MetricsSnapshot> {
        self.sinks
            .iter()
            .find(|(sink, _)| sink == name)
            .map(|(_, snapshot)| snapshot)
    }
}

/// Fans model output records out to every sink
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<ModelOutputRecord>,
    summary: DispatchSummary,
}

impl Dispatcher {
    pub fn with_handles(
        handles: Vec<SinkHandle>,
        input_rx: mpsc::Receiver<ModelOutputRecord>,
    ) -> Self {
        Self {
            handles,
            input_rx,
            summary: DispatchSummary::default(),
        }
    }

    /// Spawn one handle per sink config
    ///
    /// # Errors
    /// The first sink that cannot be created aborts the whole set.
    #[instrument(name = "dispatcher_from_configs", skip_all, fields(sinks = configs.len()))]
    pub async fn from_configs(
        configs: &[SinkConfig],
        input_rx: mpsc::Receiver<ModelOutputRecord>,
    ) -> Result<Self, DispatcherError> {
        let mut handles = Vec::with_capacity(configs.len());
        for config in configs {
            handles.push(spawn_sink(config).await?);
        }
        Ok(Self::with_handles(handles, input_rx))
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Consume records until every publisher is dropped, then drain the sinks
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> DispatchReport {
        info!(sinks = self.handles.len(), "dispatcher started");

        while let Some(record) = self.input_rx.recv().await {
            self.dispatch(record);
        }

        let mut sinks = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let name = handle.name().to_string();
            sinks.push((name, handle.shutdown().await));
        }

        info!(
            records = self.summary.records,
            undelivered = self.summary.undelivered,
            last_frame_id = ?self.summary.last_frame_id,
            "dispatcher drained"
        );
        DispatchReport {
            summary: self.summary,
            sinks,
        }
    }

    pub fn spawn(self) -> JoinHandle<DispatchReport> {
        tokio::spawn(self.run())
    }

    fn dispatch(&mut self, record: ModelOutputRecord) {
        let record = Arc::new(record);
        let mut accepted = 0;
        for handle in &mut self.handles {
            match handle.try_send(Arc::clone(&record)) {
                Ok(()) => accepted += 1,
                Err(e) => warn!(error = %e, "record not delivered"),
            }
        }
        self.summary.observe(&record, accepted);

        if self.summary.records.is_multiple_of(200) {
            debug!(
                records = self.summary.records,
                frame_id = record.frame_id,
                "dispatcher progress"
            );
        }
    }
}

async fn spawn_sink(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let creation = |e: ContractError| DispatcherError::sink_creation(&config.name, e);
    let handle = match config.sink_type {
        SinkType::Log => SinkHandle::spawn(
            LogSink::from_params(&config.name, &config.params),
            config.queue_capacity,
        ),
        SinkType::File => SinkHandle::spawn(
            FileSink::from_params(&config.name, &config.params).map_err(creation)?,
            config.queue_capacity,
        ),
        SinkType::Network => SinkHandle::spawn(
            NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(creation)?,
            config.queue_capacity,
        ),
    };
    debug!(sink = %config.name, sink_type = ?config.sink_type, "sink spawned");
    Ok(handle)
}

/// Build a dispatcher for `sink_configs` reading from `input_rx`
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<ModelOutputRecord>,
) -> Result<Dispatcher, DispatcherError> {
    Dispatcher::from_configs(&sink_configs, input_rx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_record(frame_id: u32, frames_dropped: u32) -> ModelOutputRecord {
        ModelOutputRecord {
            frame_id,
            frame_id_extra: frame_id,
            frame_id_plan: frame_id,
            frame_drop_ratio: frames_dropped as f32 * 0.01,
            frames_dropped,
            timestamp_eof: 0,
            model_execution_time: 0.0,
            live_calib_seen: true,
            raw_output: vec![1.0, 2.0],
        }
    }

    fn log_config(name: &str) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 16,
            params: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_fanout_and_summary() {
        let (input_tx, input_rx) = mpsc::channel(16);
        let dispatcher = create_dispatcher(vec![log_config("a"), log_config("b")], input_rx)
            .await
            .unwrap();
        assert_eq!(dispatcher.sink_count(), 2);
        let task = dispatcher.spawn();

        for (frame_id, dropped) in [(1, 0), (2, 0), (5, 2), (6, 0)] {
            input_tx.send(make_record(frame_id, dropped)).await.unwrap();
        }
        drop(input_tx);

        let report = task.await.unwrap();
        assert_eq!(report.summary.records, 4);
        assert_eq!(report.summary.undelivered, 0);
        assert_eq!(report.summary.camera_frames_dropped, 2);
        assert!((report.summary.max_drop_ratio - 0.02).abs() < 1e-6);
        assert_eq!(report.summary.first_frame_id, Some(1));
        assert_eq!(report.summary.last_frame_id, Some(6));
        assert_eq!(report.summary.missing_cycles(), 2);

        for name in ["a", "b"] {
            let sink = report.sink(name).unwrap();
            assert_eq!(sink.write_count, 4);
            assert_eq!(sink.frame_gap_total, 2);
            assert_eq!(sink.last_frame_id, Some(6));
        }
    }

    #[tokio::test]
    async fn test_out_of_order_record_undelivered() {
        let (input_tx, input_rx) = mpsc::channel(16);
        let task = create_dispatcher(vec![log_config("only")], input_rx)
            .await
            .unwrap()
            .spawn();

        for frame_id in [3, 2, 4] {
            input_tx.send(make_record(frame_id, 0)).await.unwrap();
        }
        drop(input_tx);

        let report = task.await.unwrap();
        assert_eq!(report.summary.records, 3);
        assert_eq!(report.summary.undelivered, 1);
        let sink = report.sink("only").unwrap();
        assert_eq!(sink.write_count, 2);
        assert_eq!(sink.stale_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_network_sink_rejected() {
        let (_input_tx, input_rx) = mpsc::channel(1);
        let configs = vec![SinkConfig {
            name: "bad_net".to_string(),
            sink_type: SinkType::Network,
            queue_capacity: 10,
            params: HashMap::new(),
        }];

        let result = create_dispatcher(configs, input_rx).await;
        assert!(matches!(
            result,
            Err(DispatcherError::SinkCreation { ref name, .. }) if name == "bad_net"
        ));
    }
}
