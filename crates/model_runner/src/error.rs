use calibration::CalibrationError;
use contracts::ContractError;
use frame_sync::FrameSyncError;
use thiserror::Error;

/// Main loop errors; all of them terminate the loop
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Engine, preprocessor or input-shape failure
    #[error("collaborator failure: {0}")]
    Collaborator(#[from] ContractError),

    /// Stream discovery or connection failed at startup
    #[error("stream setup failed: {0}")]
    StreamSetup(#[from] FrameSyncError),

    /// Calibration constants could not be prepared
    #[error("calibration setup failed: {0}")]
    Calibration(#[from] CalibrationError),
}
