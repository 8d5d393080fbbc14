//! InferenceEngine / FramePreprocessor traits - external inference backend
//!
//! The engine and the GPU warp kernel are opaque collaborators; any error
//! they return is treated as fatal by the caller.

use crate::{CameraFrame, ContractError, ModelInput};

/// Opaque neural-network execution engine
pub trait InferenceEngine: Send {
    /// Bind a host buffer to an input slot (copied by the engine)
    fn set_input(&mut self, input: ModelInput, data: &[f32]) -> Result<(), ContractError>;

    /// Device-resident buffer for zero-copy frame preparation, if supported
    fn device_buffer(&mut self, input: ModelInput) -> Option<&mut [f32]>;

    /// Run the model synchronously, writing `MODEL_OUTPUT_SIZE` values
    fn execute(&mut self, output: &mut [f32]) -> Result<(), ContractError>;
}

/// Raw camera buffer + warp matrix → model-ready image tensor
pub trait FramePreprocessor: Send {
    /// Prepare one frame.
    ///
    /// When `device_out` is given the tensor is written there and `None` is
    /// returned; otherwise a host tensor is returned for binding.
    fn prepare(
        &mut self,
        frame: &CameraFrame,
        warp: &[f32; 9],
        device_out: Option<&mut [f32]>,
    ) -> Result<Option<Vec<f32>>, ContractError>;
}
