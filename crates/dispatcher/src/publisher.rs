//! Bridge from the blocking model loop into the async dispatcher

use contracts::{ContractError, ModelOutputRecord, ModelPublisher};
use tokio::sync::mpsc;
use tracing::warn;

const PUBLISHER_NAME: &str = "dispatcher";

/// Create a publisher and the receiver the [`Dispatcher`](crate::Dispatcher) consumes
pub fn publisher_channel(capacity: usize) -> (ChannelPublisher, mpsc::Receiver<ModelOutputRecord>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelPublisher { tx }, rx)
}

/// `ModelPublisher` that never blocks the caller
///
/// A full queue drops the record and reports a write error.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<ModelOutputRecord>,
}

impl ChannelPublisher {
    pub fn new(tx: mpsc::Sender<ModelOutputRecord>) -> Self {
        Self { tx }
    }
}

impl ModelPublisher for ChannelPublisher {
    fn publish(&mut self, record: ModelOutputRecord) -> Result<(), ContractError> {
        match self.tx.try_send(record) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(record)) => {
                warn!(frame_id = record.frame_id, "Dispatcher queue full, record dropped");
                Err(ContractError::sink_write(PUBLISHER_NAME, "queue full"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ContractError::SinkConnection {
                sink_name: PUBLISHER_NAME.to_string(),
                message: "dispatcher closed".to_string(),
            }),
        }
    }
}
