use contracts::{ContractError, StreamType};
use thiserror::Error;

/// Stream setup errors
#[derive(Debug, Error)]
pub enum FrameSyncError {
    /// Transport never reported any stream
    #[error("no camera streams available after {attempts} attempts")]
    StreamsUnavailable { attempts: u32 },

    /// Neither road camera is published
    #[error("no road-facing stream in {available:?}")]
    NoRoadStream { available: Vec<StreamType> },

    /// Stream client never attached
    #[error("stream '{stream}' failed to connect after {attempts} attempts")]
    ConnectFailed { stream: StreamType, attempts: u32 },

    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] ContractError),
}
