//! LogSink - logs record summaries via tracing

use std::collections::HashMap;

use contracts::{ContractError, DataSink, ModelOutputRecord};
use tracing::{info, instrument};

/// Sink that logs record summaries for debugging
pub struct LogSink {
    name: String,
    /// Log every n-th record
    every: u64,
    seen: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            every: 1,
            seen: 0,
        }
    }

    /// Recognised params: `every` (log one record out of n, default 1)
    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> Self {
        let every = params
            .get("every")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        Self {
            every,
            ..Self::new(name)
        }
    }

    fn log_record_summary(&self, record: &ModelOutputRecord) {
        info!(
            sink = %self.name,
            frame_id = record.frame_id,
            frame_id_extra = record.frame_id_extra,
            frame_id_plan = record.frame_id_plan,
            drop_ratio = record.frame_drop_ratio,
            execution_ms = record.model_execution_time * 1000.0,
            calib = record.live_calib_seen,
            outputs = record.raw_output.len(),
            "Model output"
        );
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, record),
        fields(sink = %self.name, frame_id = record.frame_id)
    )]
    async fn write(&mut self, record: &ModelOutputRecord) -> Result<(), ContractError> {
        if self.seen.is_multiple_of(self.every) {
            self.log_record_summary(record);
        }
        self.seen += 1;
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, records = self.seen, "LogSink closed");
        Ok(())
    }
}
