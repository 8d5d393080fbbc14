use contracts::ContractError;
use thiserror::Error;

/// Delivery failures of the publish fan-out
#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("failed to create sink '{name}'")]
    SinkCreation {
        name: String,
        #[source]
        source: ContractError,
    },

    /// Sink queue full, record not delivered to that sink
    #[error("sink '{sink_name}' queue full, frame {frame_id} not delivered")]
    QueueFull { sink_name: String, frame_id: u32 },

    /// Frame id did not advance past the last record queued for the sink
    #[error("sink '{sink_name}' rejected frame {frame_id}: last queued frame was {last_frame_id}")]
    StaleRecord {
        sink_name: String,
        frame_id: u32,
        last_frame_id: u32,
    },

    /// Sink worker is gone
    #[error("sink '{sink_name}' worker stopped")]
    SinkClosed { sink_name: String },
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, source: ContractError) -> Self {
        Self::SinkCreation {
            name: name.into(),
            source,
        }
    }
}
