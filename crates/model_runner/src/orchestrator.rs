//! Inference orchestration: inputs → preprocessor → engine → feature feedback.

use contracts::{
    CameraFrame, ContractError, FramePreprocessor, InferenceEngine, ModelInput, FEATURE_LEN,
    MODEL_OUTPUT_SIZE, OUTPUT_SIZE,
};
use tracing::{debug, instrument};

use crate::{ModelInputSet, UpstreamInputs};

/// Drives one model evaluation per cycle
pub struct InferenceOrchestrator<E, P> {
    engine: E,
    main_prep: P,
    wide_prep: P,
    inputs: ModelInputSet,
    output: Vec<f32>,
}

impl<E, P> InferenceOrchestrator<E, P>
where
    E: InferenceEngine,
    P: FramePreprocessor,
{
    /// `main_prep` and `wide_prep` keep separate frame state per camera
    pub fn new(engine: E, main_prep: P, wide_prep: P) -> Self {
        Self {
            engine,
            main_prep,
            wide_prep,
            inputs: ModelInputSet::default(),
            output: vec![0.0; MODEL_OUTPUT_SIZE],
        }
    }

    /// Evaluate one cycle.
    ///
    /// The desire history always advances and the images are always
    /// prepared; with `prepare_only` the engine is skipped and `None` is
    /// returned, leaving the feature history untouched.
    ///
    /// # Errors
    /// Engine and preprocessor failures are returned unchanged.
    #[instrument(
        level = "debug",
        name = "inference_evaluate",
        skip_all,
        fields(frame_id = main.frame_id, prepare_only)
    )]
    pub fn evaluate(
        &mut self,
        main: &CameraFrame,
        wide: Option<&CameraFrame>,
        warp_main: &[f32; 9],
        warp_wide: &[f32; 9],
        upstream: &UpstreamInputs<'_>,
        prepare_only: bool,
    ) -> Result<Option<&[f32]>, ContractError> {
        self.inputs.buffers.push_desire(&upstream.desire);
        debug!("desire enqueued");

        self.inputs
            .set_traffic_convention(&upstream.traffic_convention);
        self.inputs.set_nav_features(upstream.nav_features)?;

        prepare_image(
            &mut self.engine,
            &mut self.main_prep,
            ModelInput::InputImgs,
            main,
            warp_main,
        )?;
        debug!("image added");

        if let Some(wide) = wide {
            prepare_image(
                &mut self.engine,
                &mut self.wide_prep,
                ModelInput::BigInputImgs,
                wide,
                warp_wide,
            )?;
            debug!(extra_frame_id = wide.frame_id, "extra image added");
        }

        if prepare_only {
            return Ok(None);
        }

        self.inputs.bind(&mut self.engine)?;
        self.engine.execute(&mut self.output)?;
        debug!("execution finished");

        let features = self
            .output
            .get(OUTPUT_SIZE..)
            .and_then(|tail| tail.first_chunk::<FEATURE_LEN>())
            .ok_or_else(|| {
                ContractError::engine(format!(
                    "output of {} values has no feature block at {OUTPUT_SIZE}",
                    self.output.len()
                ))
            })?;
        self.inputs.buffers.push_feature(features);
        debug!("features enqueued");

        Ok(Some(&self.output))
    }

    pub fn inputs(&self) -> &ModelInputSet {
        &self.inputs
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn main_preprocessor(&self) -> &P {
        &self.main_prep
    }

    pub fn wide_preprocessor(&self) -> &P {
        &self.wide_prep
    }
}

/// Prepare `frame` straight into the engine's device slot when it has one,
/// otherwise bind the returned host tensor.
fn prepare_image<E, P>(
    engine: &mut E,
    prep: &mut P,
    slot: ModelInput,
    frame: &CameraFrame,
    warp: &[f32; 9],
) -> Result<(), ContractError>
where
    E: InferenceEngine,
    P: FramePreprocessor,
{
    let host = match engine.device_buffer(slot) {
        Some(device) => prep.prepare(frame, warp, Some(device))?,
        None => match prep.prepare(frame, warp, None)? {
            Some(tensor) => Some(tensor),
            None => {
                return Err(ContractError::preprocess(
                    frame.frame_id,
                    format!("no host tensor for '{slot}'"),
                ))
            }
        },
    };

    if let Some(tensor) = host {
        slot.check_len(tensor.len())?;
        engine.set_input(slot, &tensor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEngine, MockPreprocessor};
    use crate::{desire_vector, traffic_convention};
    use bytes::Bytes;
    use contracts::{BufferInfo, StreamType, FEATURE_HISTORY_SIZE, NAV_FEATURE_LEN};

    fn make_frame(stream: StreamType, frame_id: u32) -> CameraFrame {
        CameraFrame {
            stream,
            frame_id,
            timestamp_sof: u64::from(frame_id) * 50_000_000,
            timestamp_eof: u64::from(frame_id) * 50_000_000 + 1,
            info: BufferInfo::nv12(4, 4),
            data: Bytes::from_static(&[0u8; 24]),
        }
    }

    fn make_orchestrator(engine: MockEngine) -> InferenceOrchestrator<MockEngine, MockPreprocessor> {
        InferenceOrchestrator::new(engine, MockPreprocessor::new(), MockPreprocessor::new())
    }

    fn run(
        orchestrator: &mut InferenceOrchestrator<MockEngine, MockPreprocessor>,
        frame_id: u32,
        wide: bool,
        prepare_only: bool,
    ) -> Option<Vec<f32>> {
        let nav = vec![0.0; NAV_FEATURE_LEN];
        let inputs = UpstreamInputs {
            desire: desire_vector(2),
            traffic_convention: traffic_convention(false),
            nav_features: &nav,
        };
        let main = make_frame(StreamType::Road, frame_id);
        let extra = make_frame(StreamType::WideRoad, frame_id);
        orchestrator
            .evaluate(
                &main,
                wide.then_some(&extra),
                &[1.0; 9],
                &[2.0; 9],
                &inputs,
                prepare_only,
            )
            .unwrap()
            .map(<[f32]>::to_vec)
    }

    #[test]
    fn test_evaluate_executes_and_feeds_back_features() {
        let mut orchestrator = make_orchestrator(MockEngine::new());
        let output = run(&mut orchestrator, 1, true, false).unwrap();
        assert_eq!(output.len(), MODEL_OUTPUT_SIZE);
        assert_eq!(orchestrator.engine().executions(), 1);

        let history = orchestrator.inputs().buffers.feature_history();
        assert_eq!(
            &history[FEATURE_HISTORY_SIZE - FEATURE_LEN..],
            &output[OUTPUT_SIZE..OUTPUT_SIZE + FEATURE_LEN]
        );
        assert_eq!(orchestrator.wide_preprocessor().calls(), 1);
    }

    #[test]
    fn test_prepare_only_skips_engine_and_features() {
        let mut orchestrator = make_orchestrator(MockEngine::new());
        assert!(run(&mut orchestrator, 1, true, true).is_none());
        assert_eq!(orchestrator.engine().executions(), 0);
        assert!(orchestrator
            .inputs()
            .buffers
            .feature_history()
            .iter()
            .all(|v| *v == 0.0));
        // images still prepared and the desire history still advanced
        assert_eq!(orchestrator.main_preprocessor().calls(), 1);
        assert_eq!(orchestrator.wide_preprocessor().calls(), 1);
        assert_eq!(orchestrator.engine().input(ModelInput::InputImgs).map(<[f32]>::len), Some(ModelInput::InputImgs.len()));
        assert_eq!(orchestrator.inputs().buffers.prev_desire(), &desire_vector(2));
    }

    #[test]
    fn test_single_camera_skips_wide_path() {
        let mut orchestrator = make_orchestrator(MockEngine::new());
        run(&mut orchestrator, 1, false, false).unwrap();
        assert_eq!(orchestrator.wide_preprocessor().calls(), 0);
        assert!(orchestrator.engine().input(ModelInput::BigInputImgs).is_none());
    }

    #[test]
    fn test_device_buffers_receive_frames() {
        let mut orchestrator = make_orchestrator(MockEngine::with_device_buffers());
        run(&mut orchestrator, 7, true, false).unwrap();
        let main = orchestrator.engine().input(ModelInput::InputImgs).unwrap();
        assert!(main.iter().all(|v| *v == 7.0));
    }

    #[test]
    fn test_engine_failure_propagates() {
        let mut orchestrator = make_orchestrator(MockEngine::new().failing_after(1));
        run(&mut orchestrator, 1, false, false).unwrap();

        let nav = vec![0.0; NAV_FEATURE_LEN];
        let inputs = UpstreamInputs {
            desire: [0.0; contracts::DESIRE_LEN],
            traffic_convention: traffic_convention(true),
            nav_features: &nav,
        };
        let main = make_frame(StreamType::Road, 2);
        let err = orchestrator
            .evaluate(&main, None, &[0.0; 9], &[0.0; 9], &inputs, false)
            .unwrap_err();
        assert!(matches!(err, ContractError::Engine { .. }));
    }

    #[test]
    fn test_preprocessor_failure_propagates() {
        let mut orchestrator = InferenceOrchestrator::new(
            MockEngine::new(),
            MockPreprocessor::failing(),
            MockPreprocessor::new(),
        );
        let nav = vec![0.0; NAV_FEATURE_LEN];
        let inputs = UpstreamInputs {
            desire: [0.0; contracts::DESIRE_LEN],
            traffic_convention: traffic_convention(false),
            nav_features: &nav,
        };
        let main = make_frame(StreamType::Road, 1);
        let err = orchestrator
            .evaluate(&main, None, &[0.0; 9], &[0.0; 9], &inputs, false)
            .unwrap_err();
        assert!(matches!(err, ContractError::Preprocess { frame_id: 1, .. }));
        assert_eq!(orchestrator.engine().executions(), 0);
    }
}
