//! Deterministic stand-ins for the inference backend.
//!
//! Used by the simulation backend and by tests; output values are derived
//! from the bound inputs so pipelines can be checked end to end.

use std::collections::HashMap;

use contracts::{
    CameraFrame, ContractError, FramePreprocessor, InferenceEngine, ModelInput, DESIRE_LEN,
    FEATURE_LEN, IMAGE_BUFFER_SIZE, MODEL_OUTPUT_SIZE, OUTPUT_SIZE, TRAFFIC_CONVENTION_LEN,
};

const REQUIRED: [ModelInput; 5] = [
    ModelInput::DesirePulse,
    ModelInput::TrafficConvention,
    ModelInput::NavFeatures,
    ModelInput::FeatureBuffer,
    ModelInput::InputImgs,
];

/// Mock inference engine
///
/// Output layout:
/// - `[0..8]`: newest desire pulse block
/// - `[8..10]`: traffic convention
/// - `[OUTPUT_SIZE..OUTPUT_SIZE + FEATURE_LEN]`: `n + i * 1e-3` for run `n`
#[derive(Debug, Default)]
pub struct MockEngine {
    host: HashMap<ModelInput, Vec<f32>>,
    device: HashMap<ModelInput, Vec<f32>>,
    executions: u64,
    fail_after: Option<u64>,
}

impl MockEngine {
    /// Engine without device buffers; every input is bound from host memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine exposing device buffers for both image inputs
    pub fn with_device_buffers() -> Self {
        let device = [ModelInput::InputImgs, ModelInput::BigInputImgs]
            .into_iter()
            .map(|input| (input, vec![0.0; IMAGE_BUFFER_SIZE]))
            .collect();
        Self {
            device,
            ..Self::default()
        }
    }

    /// Fail every execution after `n` successful ones
    pub fn failing_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn executions(&self) -> u64 {
        self.executions
    }

    /// Last data bound or prepared for `input`
    pub fn input(&self, input: ModelInput) -> Option<&[f32]> {
        self.device
            .get(&input)
            .or_else(|| self.host.get(&input))
            .map(Vec::as_slice)
    }
}

impl InferenceEngine for MockEngine {
    fn set_input(&mut self, input: ModelInput, data: &[f32]) -> Result<(), ContractError> {
        input.check_len(data.len())?;
        match self.host.get_mut(&input) {
            Some(slot) => slot.copy_from_slice(data),
            None => {
                self.host.insert(input, data.to_vec());
            }
        }
        Ok(())
    }

    fn device_buffer(&mut self, input: ModelInput) -> Option<&mut [f32]> {
        self.device.get_mut(&input).map(Vec::as_mut_slice)
    }

    fn execute(&mut self, output: &mut [f32]) -> Result<(), ContractError> {
        if self.fail_after.is_some_and(|n| self.executions >= n) {
            return Err(ContractError::engine("mock engine failure"));
        }
        if output.len() != MODEL_OUTPUT_SIZE {
            return Err(ContractError::engine(format!(
                "output buffer holds {} values, expected {MODEL_OUTPUT_SIZE}",
                output.len()
            )));
        }
        if let Some(missing) = REQUIRED.iter().find(|input| self.input(**input).is_none()) {
            return Err(ContractError::engine(format!("input '{missing}' not bound")));
        }

        self.executions += 1;
        output.fill(0.0);

        if let Some(desire) = self.input(ModelInput::DesirePulse) {
            output[..DESIRE_LEN].copy_from_slice(&desire[desire.len() - DESIRE_LEN..]);
        }
        if let Some(traffic) = self.input(ModelInput::TrafficConvention) {
            output[DESIRE_LEN..DESIRE_LEN + TRAFFIC_CONVENTION_LEN].copy_from_slice(traffic);
        }
        let run = self.executions as f32;
        for (i, value) in output[OUTPUT_SIZE..OUTPUT_SIZE + FEATURE_LEN]
            .iter_mut()
            .enumerate()
        {
            *value = run + i as f32 * 1e-3;
        }
        Ok(())
    }
}

/// Mock frame preprocessor: every tensor element is the frame id
#[derive(Debug, Default)]
pub struct MockPreprocessor {
    calls: u64,
    last_frame_id: Option<u32>,
    last_warp: Option<[f32; 9]>,
    fail: bool,
}

impl MockPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preprocessor whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn last_frame_id(&self) -> Option<u32> {
        self.last_frame_id
    }

    pub fn last_warp(&self) -> Option<[f32; 9]> {
        self.last_warp
    }
}

impl FramePreprocessor for MockPreprocessor {
    fn prepare(
        &mut self,
        frame: &CameraFrame,
        warp: &[f32; 9],
        device_out: Option<&mut [f32]>,
    ) -> Result<Option<Vec<f32>>, ContractError> {
        if self.fail {
            return Err(ContractError::preprocess(frame.frame_id, "mock preprocessor failure"));
        }
        self.calls += 1;
        self.last_frame_id = Some(frame.frame_id);
        self.last_warp = Some(*warp);

        let value = frame.frame_id as f32;
        match device_out {
            Some(buffer) => {
                buffer.fill(value);
                Ok(None)
            }
            None => Ok(Some(vec![value; IMAGE_BUFFER_SIZE])),
        }
    }
}
