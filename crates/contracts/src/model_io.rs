//! Model input slots and the downstream publish record

use serde::{Deserialize, Serialize};

use crate::{
    ContractError, DESIRE_HISTORY_SIZE, FEATURE_HISTORY_SIZE, IMAGE_BUFFER_SIZE,
    NAV_FEATURE_LEN, TRAFFIC_CONVENTION_LEN,
};

/// Named model input slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelInput {
    DesirePulse,
    TrafficConvention,
    NavFeatures,
    FeatureBuffer,
    InputImgs,
    BigInputImgs,
}

impl ModelInput {
    /// Every slot the engine expects, in binding order
    pub const ALL: [ModelInput; 6] = [
        ModelInput::DesirePulse,
        ModelInput::TrafficConvention,
        ModelInput::NavFeatures,
        ModelInput::FeatureBuffer,
        ModelInput::InputImgs,
        ModelInput::BigInputImgs,
    ];

    /// Tensor name as exported in the model
    pub fn name(self) -> &'static str {
        match self {
            ModelInput::DesirePulse => "desire_pulse",
            ModelInput::TrafficConvention => "traffic_convention",
            ModelInput::NavFeatures => "nav_features",
            ModelInput::FeatureBuffer => "feature_buffer",
            ModelInput::InputImgs => "input_imgs",
            ModelInput::BigInputImgs => "big_input_imgs",
        }
    }

    /// Fixed element count of the slot
    pub fn len(self) -> usize {
        match self {
            ModelInput::DesirePulse => DESIRE_HISTORY_SIZE,
            ModelInput::TrafficConvention => TRAFFIC_CONVENTION_LEN,
            ModelInput::NavFeatures => NAV_FEATURE_LEN,
            ModelInput::FeatureBuffer => FEATURE_HISTORY_SIZE,
            ModelInput::InputImgs | ModelInput::BigInputImgs => IMAGE_BUFFER_SIZE,
        }
    }

    /// Check a host buffer against the slot length
    pub fn check_len(self, actual: usize) -> Result<(), ContractError> {
        if actual == self.len() {
            Ok(())
        } else {
            Err(ContractError::InputShape {
                input: self.name().to_string(),
                expected: self.len(),
                actual,
            })
        }
    }
}

impl std::fmt::Display for ModelInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-cycle result published downstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutputRecord {
    /// Main stream frame id
    pub frame_id: u32,

    /// Extra stream frame id (equals `frame_id` in single-camera mode)
    pub frame_id_extra: u32,

    /// Road-camera frame id the upstream plan was computed on
    pub frame_id_plan: u32,

    /// Smoothed drop ratio in `[0, 1)`
    pub frame_drop_ratio: f32,

    /// Raw frames dropped before this cycle
    pub frames_dropped: u32,

    /// Main frame end-of-frame timestamp (ns)
    pub timestamp_eof: u64,

    /// Wall time spent in the evaluation (seconds)
    pub model_execution_time: f32,

    /// Whether a live calibration has ever been received
    pub live_calib_seen: bool,

    /// Raw model output vector
    pub raw_output: Vec<f32>,
}

/// Downstream publisher
pub trait ModelPublisher: Send {
    /// Hand one record to the downstream transport.
    ///
    /// # Errors
    /// Returns an error when the record could not be queued; callers treat
    /// this as non-fatal.
    fn publish(&mut self, record: ModelOutputRecord) -> Result<(), ContractError>;
}
