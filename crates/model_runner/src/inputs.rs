//! Upstream decoding and the model input set.

use contracts::{
    ContractError, InferenceEngine, ModelInput, UpstreamState, DESIRE_LEN, NAV_FEATURE_LEN,
    TRAFFIC_CONVENTION_LEN,
};

use crate::TemporalBufferManager;

/// Lateral-plan desire as a one-hot vector; out-of-range means none
pub fn desire_vector(desire: i32) -> [f32; DESIRE_LEN] {
    let mut vec = [0.0; DESIRE_LEN];
    if let Ok(index) = usize::try_from(desire) {
        if index < DESIRE_LEN {
            vec[index] = 1.0;
        }
    }
    vec
}

/// `[left-hand drive, right-hand drive]` one-hot
pub fn traffic_convention(is_rhd: bool) -> [f32; TRAFFIC_CONVENTION_LEN] {
    let mut vec = [0.0; TRAFFIC_CONVENTION_LEN];
    vec[usize::from(is_rhd)] = 1.0;
    vec
}

/// Per-cycle inputs decoded from upstream state
#[derive(Debug, Clone)]
pub struct UpstreamInputs<'a> {
    pub desire: [f32; DESIRE_LEN],
    pub traffic_convention: [f32; TRAFFIC_CONVENTION_LEN],
    pub nav_features: &'a [f32],
}

impl<'a> UpstreamInputs<'a> {
    pub fn from_state(state: &'a UpstreamState) -> Self {
        Self {
            desire: desire_vector(state.desire),
            traffic_convention: traffic_convention(state.is_rhd),
            nav_features: &state.nav_features,
        }
    }
}

/// Named non-image model inputs
#[derive(Debug, Clone)]
pub struct ModelInputSet {
    pub buffers: TemporalBufferManager,
    traffic_convention: [f32; TRAFFIC_CONVENTION_LEN],
    nav_features: Vec<f32>,
}

impl Default for ModelInputSet {
    fn default() -> Self {
        Self {
            buffers: TemporalBufferManager::new(),
            traffic_convention: [0.0; TRAFFIC_CONVENTION_LEN],
            nav_features: vec![0.0; NAV_FEATURE_LEN],
        }
    }
}

impl ModelInputSet {
    pub fn set_traffic_convention(&mut self, value: &[f32; TRAFFIC_CONVENTION_LEN]) {
        self.traffic_convention = *value;
    }

    pub fn set_nav_features(&mut self, value: &[f32]) -> Result<(), ContractError> {
        ModelInput::NavFeatures.check_len(value.len())?;
        self.nav_features.copy_from_slice(value);
        Ok(())
    }

    /// Host buffer backing `input`; image slots are owned by the engine
    pub fn slot(&self, input: ModelInput) -> Option<&[f32]> {
        match input {
            ModelInput::DesirePulse => Some(self.buffers.desire_history()),
            ModelInput::TrafficConvention => Some(&self.traffic_convention),
            ModelInput::NavFeatures => Some(&self.nav_features),
            ModelInput::FeatureBuffer => Some(self.buffers.feature_history()),
            ModelInput::InputImgs | ModelInput::BigInputImgs => None,
        }
    }

    /// Bind every host slot to the engine
    pub fn bind<E: InferenceEngine>(&self, engine: &mut E) -> Result<(), ContractError> {
        for input in ModelInput::ALL {
            if let Some(data) = self.slot(input) {
                input.check_len(data.len())?;
                engine.set_input(input, data)?;
            }
        }
        Ok(())
    }
}
