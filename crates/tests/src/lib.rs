//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约常量快照
//! - 帧同步状态（单/双相机）
//! - 端到端主循环场景（通道帧源 + 脚本化上游 + mock 推理）
//! - 经 dispatcher 的发布链路

#[cfg(test)]
mod contract_tests {
    use contracts::*;

    #[test]
    fn test_model_contract_sizes() {
        assert_eq!(ModelInput::DesirePulse.len(), DESIRE_HISTORY_SIZE);
        assert_eq!(DESIRE_HISTORY_SIZE, DESIRE_LEN * (HISTORY_BUFFER_LEN + 1));
        assert_eq!(ModelInput::FeatureBuffer.len(), FEATURE_HISTORY_SIZE);
        assert_eq!(FEATURE_HISTORY_SIZE, HISTORY_BUFFER_LEN * FEATURE_LEN);
        assert_eq!(ModelInput::InputImgs.len(), IMAGE_BUFFER_SIZE);
        assert_eq!(ModelInput::BigInputImgs.len(), IMAGE_BUFFER_SIZE);
        assert!(OUTPUT_SIZE + FEATURE_LEN <= MODEL_OUTPUT_SIZE);
    }
}

#[cfg(test)]
mod harness {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::Bytes;
    use contracts::{
        BufferInfo, CameraFrame, ContractError, ModelOutputRecord, ModelPublisher, StreamType,
        UpstreamUpdate,
    };
    use ingestion::{BackpressureConfig, ChannelTransport, DropPolicy, FrameFeeder};

    pub const FRAME_NS: u64 = 50_000_000;
    pub const MS: u64 = 1_000_000;

    pub fn make_frame(stream: StreamType, frame_id: u32, timestamp_sof: u64) -> CameraFrame {
        CameraFrame {
            stream,
            frame_id,
            timestamp_sof,
            timestamp_eof: timestamp_sof + 20 * MS,
            info: BufferInfo::nv12(8, 4),
            data: Bytes::from_static(&[0u8; 48]),
        }
    }

    /// Channel transport with the given streams and their feeders
    pub fn make_transport(streams: &[StreamType]) -> (ChannelTransport, Vec<FrameFeeder>) {
        let mut transport = ChannelTransport::new();
        let backpressure = BackpressureConfig::new(64, DropPolicy::DropOldest);
        let feeders = streams
            .iter()
            .map(|stream| {
                transport.add_stream(
                    *stream,
                    BufferInfo::nv12(8, 4),
                    &backpressure,
                    Duration::from_millis(5),
                )
            })
            .collect();
        (transport, feeders)
    }

    /// Feed frames with ids `ids`, timestamped `id * 50ms + offset`
    pub fn feed(feeder: &FrameFeeder, ids: &[u32], offset_ns: u64) {
        for &id in ids {
            feeder
                .feed(make_frame(
                    feeder.stream(),
                    id,
                    u64::from(id) * FRAME_NS + offset_ns,
                ))
                .unwrap();
        }
    }

    pub fn calibration_update() -> UpstreamUpdate {
        UpstreamUpdate {
            live_calibration: Some([0.0, 0.01, -0.02]),
            ..Default::default()
        }
    }

    /// Publisher collecting records in memory
    #[derive(Clone, Default)]
    pub struct CollectingPublisher {
        pub records: Arc<Mutex<Vec<ModelOutputRecord>>>,
    }

    impl CollectingPublisher {
        pub fn records(&self) -> Vec<ModelOutputRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    impl ModelPublisher for CollectingPublisher {
        fn publish(&mut self, record: ModelOutputRecord) -> Result<(), ContractError> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }
    }
}

#[cfg(test)]
mod sync_tests {
    use contracts::{ModeldConfig, StreamType};
    use frame_sync::{FrameSyncCoordinator, SyncOutcome, SyncState};

    use super::harness::*;

    #[test]
    fn test_coordinator_state_per_camera_mode() {
        let config = ModeldConfig::default();

        let (mut transport, feeders) = make_transport(&[StreamType::Road]);
        feed(&feeders[0], &[1], 0);
        let (mut single, _) =
            FrameSyncCoordinator::open(&mut transport, &config.streams, config.sync.clone())
                .unwrap();
        assert_eq!(single.state(), SyncState::WaitingMain);
        assert!(matches!(single.next_pair(), SyncOutcome::Synced(_)));
        assert_eq!(single.state(), SyncState::SingleCamera);

        let (mut transport, feeders) = make_transport(&[StreamType::Road, StreamType::WideRoad]);
        feed(&feeders[0], &[1, 2], 0);
        feed(&feeders[1], &[1], 0);
        let (mut dual, _) =
            FrameSyncCoordinator::open(&mut transport, &config.streams, config.sync.clone())
                .unwrap();
        assert!(matches!(dual.next_pair(), SyncOutcome::Synced(_)));
        assert_eq!(dual.state(), SyncState::Synced);
        assert!(matches!(dual.next_pair(), SyncOutcome::NoExtraFrame));
        assert_eq!(dual.state(), SyncState::WaitingExtra);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::AtomicBool;

    use contracts::{
        ModelInput, ModeldConfig, StreamType, UpstreamUpdate, FEATURE_LEN, OUTPUT_SIZE,
    };
    use ingestion::ScriptedUpstream;
    use model_runner::mock::{MockEngine, MockPreprocessor};
    use model_runner::{CycleOutcome, InferenceOrchestrator, MainLoop, RunnerError};

    use super::harness::*;

    type TestLoop = MainLoop<MockEngine, MockPreprocessor>;

    fn make_loop(
        transport: &mut ingestion::ChannelTransport,
        config: &ModeldConfig,
        upstream: ScriptedUpstream,
        engine: MockEngine,
        publisher: CollectingPublisher,
    ) -> TestLoop {
        let orchestrator =
            InferenceOrchestrator::new(engine, MockPreprocessor::new(), MockPreprocessor::new());
        MainLoop::start(
            transport,
            config,
            Box::new(upstream),
            orchestrator,
            Box::new(publisher),
        )
        .unwrap()
    }

    fn evaluated(outcome: CycleOutcome) -> contracts::CycleReport {
        match outcome {
            CycleOutcome::Evaluated(report) => report,
            other => panic!("expected evaluated cycle, got {other:?}"),
        }
    }

    /// Aligned dual-camera streams: every cycle evaluates, ids pair up,
    /// calibration is latched from the first upstream update.
    #[test]
    fn test_dual_camera_aligned_stream() {
        let (mut transport, feeders) = make_transport(&[StreamType::Road, StreamType::WideRoad]);
        feed(&feeders[0], &[1, 2, 3, 4, 5], 0);
        feed(&feeders[1], &[1, 2, 3, 4, 5], 0);

        let publisher = CollectingPublisher::default();
        let upstream = ScriptedUpstream::new([calibration_update()]).with_road_frame_counter();
        let mut main_loop = make_loop(
            &mut transport,
            &ModeldConfig::default(),
            upstream,
            MockEngine::new(),
            publisher.clone(),
        );
        assert!(!main_loop.is_single_camera());

        for id in 1..=5u32 {
            let report = evaluated(main_loop.run_cycle().unwrap());
            assert_eq!(report.frame_id, id);
            assert_eq!(report.frame_id_extra, id);
            assert_eq!(report.frames_dropped, 0);
            assert!(!report.desynced);
        }
        assert!(matches!(main_loop.run_cycle().unwrap(), CycleOutcome::NoFrame));

        let records = publisher.records();
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.live_calib_seen));
        assert_eq!(records[2].frame_id_plan, 3);
        assert_eq!(records[4].raw_output.len(), contracts::MODEL_OUTPUT_SIZE);

        let orchestrator = main_loop.orchestrator();
        assert_eq!(orchestrator.main_preprocessor().calls(), 5);
        assert_eq!(orchestrator.wide_preprocessor().calls(), 5);
        assert_ne!(orchestrator.main_preprocessor().last_warp(), Some([0.0; 9]));
        assert_ne!(
            orchestrator.main_preprocessor().last_warp(),
            orchestrator.wide_preprocessor().last_warp()
        );

        // Newest feature block comes from the fifth execution
        let history = orchestrator.inputs().buffers.feature_history();
        let newest = &history[history.len() - FEATURE_LEN..];
        assert!((newest[0] - 5.0).abs() < 1e-6);
        assert!((newest[1] - 5.001).abs() < 1e-5);
    }

    /// Only the road camera is published: single-camera mode aliases the
    /// extra frame to the main one and never touches the wide path.
    #[test]
    fn test_single_road_camera() {
        let (mut transport, feeders) = make_transport(&[StreamType::Road]);
        feed(&feeders[0], &[1, 2, 3], 0);

        let publisher = CollectingPublisher::default();
        let mut main_loop = make_loop(
            &mut transport,
            &ModeldConfig::default(),
            ScriptedUpstream::default(),
            MockEngine::new(),
            publisher.clone(),
        );
        assert!(main_loop.is_single_camera());
        assert!(!main_loop.context().main_wide_camera);

        for id in 1..=3u32 {
            let report = evaluated(main_loop.run_cycle().unwrap());
            assert_eq!(report.frame_id_extra, id);
            assert_eq!(report.skew_ns, 0);
        }

        assert_eq!(main_loop.orchestrator().wide_preprocessor().calls(), 0);
        let records = publisher.records();
        assert!(records.iter().all(|r| !r.live_calib_seen));
        assert!(records.iter().all(|r| r.frame_id == r.frame_id_extra));
    }

    /// Only the wide camera is published: it becomes the main stream.
    #[test]
    fn test_wide_camera_as_main() {
        let (mut transport, feeders) = make_transport(&[StreamType::WideRoad]);
        feed(&feeders[0], &[1, 2], 0);

        let upstream = ScriptedUpstream::new([calibration_update()]);
        let mut main_loop = make_loop(
            &mut transport,
            &ModeldConfig::default(),
            upstream,
            MockEngine::new(),
            CollectingPublisher::default(),
        );
        assert!(main_loop.context().main_wide_camera);
        assert!(main_loop.is_single_camera());

        evaluated(main_loop.run_cycle().unwrap());
        let ctx = main_loop.context();
        assert!(ctx.calibration.seen);

        // Main and extra warps both use the wide intrinsics, differing only
        // in the model frame
        assert_ne!(ctx.calibration.warp_main, ctx.calibration.warp_wide);
    }

    /// A gap in main frame ids makes that cycle prepare-only: images are
    /// prepared, the engine is skipped and the feature history is unchanged.
    #[test]
    fn test_dropped_frames_prepare_only() {
        let (mut transport, feeders) = make_transport(&[StreamType::Road, StreamType::WideRoad]);
        feed(&feeders[0], &[1, 2, 5, 6], 0);
        feed(&feeders[1], &[1, 2, 5, 6], 0);

        let publisher = CollectingPublisher::default();
        let mut main_loop = make_loop(
            &mut transport,
            &ModeldConfig::default(),
            ScriptedUpstream::default(),
            MockEngine::new(),
            publisher.clone(),
        );

        evaluated(main_loop.run_cycle().unwrap());
        evaluated(main_loop.run_cycle().unwrap());
        let before = main_loop
            .orchestrator()
            .inputs()
            .buffers
            .feature_history()
            .to_vec();

        match main_loop.run_cycle().unwrap() {
            CycleOutcome::PrepareOnly(report) => {
                assert_eq!(report.frame_id, 5);
                assert_eq!(report.frames_dropped, 2);
                assert!(!report.executed);
                // Still warming up
                assert_eq!(report.frame_drop_ratio, 0.0);
            }
            other => panic!("expected prepare-only cycle, got {other:?}"),
        }
        let orchestrator = main_loop.orchestrator();
        assert_eq!(orchestrator.inputs().buffers.feature_history(), &before[..]);
        assert_eq!(orchestrator.engine().executions(), 2);
        assert_eq!(orchestrator.main_preprocessor().last_frame_id(), Some(5));

        let report = evaluated(main_loop.run_cycle().unwrap());
        assert_eq!(report.frame_id, 6);
        assert_eq!(report.frames_dropped, 0);
        assert_eq!(publisher.records().len(), 3);
        assert_eq!(main_loop.context().last_main_frame_id, 6);
    }

    /// The extra stream runs dry: the cycle yields no frame without touching
    /// the loop state, and the retained main frame pairs up once the extra
    /// stream catches up.
    #[test]
    fn test_extra_stream_late() {
        let (mut transport, feeders) = make_transport(&[StreamType::Road, StreamType::WideRoad]);
        feed(&feeders[0], &[1], 0);

        let mut main_loop = make_loop(
            &mut transport,
            &ModeldConfig::default(),
            ScriptedUpstream::default(),
            MockEngine::new(),
            CollectingPublisher::default(),
        );

        assert!(matches!(main_loop.run_cycle().unwrap(), CycleOutcome::NoFrame));
        assert_eq!(main_loop.context().last_main_frame_id, 0);
        assert_eq!(main_loop.context().run_count, 0);

        feed(&feeders[1], &[1], 0);
        let report = evaluated(main_loop.run_cycle().unwrap());
        assert_eq!(report.frame_id, 1);
        assert_eq!(report.frame_id_extra, 1);
    }

    /// Wide frames lagging by 15 ms pair up but are reported out of sync.
    #[test]
    fn test_desync_reported() {
        let (mut transport, feeders) = make_transport(&[StreamType::Road, StreamType::WideRoad]);
        feed(&feeders[0], &[1, 2], 0);
        feed(&feeders[1], &[1, 2], 15 * MS);

        let mut main_loop = make_loop(
            &mut transport,
            &ModeldConfig::default(),
            ScriptedUpstream::default(),
            MockEngine::new(),
            CollectingPublisher::default(),
        );

        for id in 1..=2u32 {
            let report = evaluated(main_loop.run_cycle().unwrap());
            assert_eq!(report.frame_id_extra, id);
            assert_eq!(report.skew_ns, 15 * MS);
            assert!(report.desynced);
        }
    }

    /// Desire is fed as a rising-edge pulse and traffic convention follows
    /// the right-hand-drive flag.
    #[test]
    fn test_desire_pulse_and_traffic_convention() {
        let (mut transport, feeders) = make_transport(&[StreamType::Road]);
        feed(&feeders[0], &[1, 2, 3], 0);

        let steady = UpstreamUpdate {
            desire: Some(3),
            is_rhd: Some(true),
            ..Default::default()
        };
        let publisher = CollectingPublisher::default();
        let mut main_loop = make_loop(
            &mut transport,
            &ModeldConfig::default(),
            ScriptedUpstream::default().with_steady(steady),
            MockEngine::new(),
            publisher.clone(),
        );
        for _ in 0..3 {
            evaluated(main_loop.run_cycle().unwrap());
        }

        let records = publisher.records();
        assert_eq!(&records[0].raw_output[..8], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(&records[1].raw_output[..8], &[0.0; 8]);
        assert_eq!(&records[2].raw_output[..8], &[0.0; 8]);
        assert_eq!(&records[0].raw_output[8..10], &[0.0, 1.0]);
        assert_eq!(records[0].raw_output[OUTPUT_SIZE], 1.0);
    }

    /// Engine failures terminate the loop.
    #[test]
    fn test_engine_failure_stops_run() {
        let (mut transport, feeders) = make_transport(&[StreamType::Road]);
        feed(&feeders[0], &[1, 2, 3], 0);

        let mut main_loop = make_loop(
            &mut transport,
            &ModeldConfig::default(),
            ScriptedUpstream::default(),
            MockEngine::new().failing_after(1),
            CollectingPublisher::default(),
        );

        let stop = AtomicBool::new(false);
        let result = main_loop.run(&stop, None);
        assert!(matches!(result, Err(RunnerError::Collaborator(_))));
        assert_eq!(main_loop.orchestrator().engine().executions(), 1);
    }

    /// Device buffers: images land in engine-owned slots.
    #[test]
    fn test_run_with_device_buffers() {
        let (mut transport, feeders) = make_transport(&[StreamType::Road, StreamType::WideRoad]);
        feed(&feeders[0], &[1, 2, 3, 4], 0);
        feed(&feeders[1], &[1, 2, 3, 4], 0);

        let mut main_loop = make_loop(
            &mut transport,
            &ModeldConfig::default(),
            ScriptedUpstream::default(),
            MockEngine::with_device_buffers(),
            CollectingPublisher::default(),
        );

        let stop = AtomicBool::new(false);
        let stats = main_loop.run(&stop, Some(4)).unwrap();
        assert_eq!(stats.iterations, 4);
        assert_eq!(stats.summary.evaluated_cycles, 4);
        assert_eq!(stats.sync.synced, 4);

        let engine = main_loop.orchestrator().engine();
        assert!(engine
            .input(ModelInput::BigInputImgs)
            .unwrap()
            .iter()
            .all(|v| *v == 4.0));
    }

    /// Thresholds from a loaded configuration reach the coordinator.
    #[test]
    fn test_loaded_config_threshold() {
        let config = config_loader::ConfigLoader::load_from_str(
            "[sync]\ndesync_threshold_ns = 20000000\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let (mut transport, feeders) = make_transport(&[StreamType::Road, StreamType::WideRoad]);
        feed(&feeders[0], &[1], 0);
        feed(&feeders[1], &[1], 15 * MS);

        let mut main_loop = make_loop(
            &mut transport,
            &config,
            ScriptedUpstream::default(),
            MockEngine::new(),
            CollectingPublisher::default(),
        );
        let report = evaluated(main_loop.run_cycle().unwrap());
        assert!(!report.desynced);
    }
}

#[cfg(test)]
mod dispatch_tests {
    use std::collections::HashMap;

    use contracts::{ModeldConfig, SinkConfig, SinkType, StreamType};
    use dispatcher::sinks::{raw_file_name, records_file_name};
    use dispatcher::{create_dispatcher, publisher_channel};
    use ingestion::ScriptedUpstream;
    use model_runner::mock::{MockEngine, MockPreprocessor};
    use model_runner::{InferenceOrchestrator, MainLoop};

    use super::harness::*;

    /// Model loop -> ChannelPublisher -> Dispatcher -> FileSink
    #[tokio::test]
    async fn test_records_reach_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = vec![
            SinkConfig {
                name: "file".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 16,
                params: HashMap::from([(
                    "base_path".to_string(),
                    dir.path().to_string_lossy().into_owned(),
                )]),
            },
            SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 16,
                params: HashMap::new(),
            },
        ];

        let (publisher, rx) = publisher_channel(16);
        let dispatcher = create_dispatcher(sinks, rx).await.unwrap();
        let dispatcher_handle = dispatcher.spawn();

        let (mut transport, feeders) = make_transport(&[StreamType::Road, StreamType::WideRoad]);
        feed(&feeders[0], &[1, 2, 3], 0);
        feed(&feeders[1], &[1, 2, 3], 0);

        let orchestrator = InferenceOrchestrator::new(
            MockEngine::new(),
            MockPreprocessor::new(),
            MockPreprocessor::new(),
        );
        let mut main_loop = MainLoop::start(
            &mut transport,
            &ModeldConfig::default(),
            Box::new(ScriptedUpstream::new([calibration_update()])),
            orchestrator,
            Box::new(publisher),
        )
        .unwrap();
        for _ in 0..3 {
            main_loop.run_cycle().unwrap();
        }
        drop(main_loop);

        let report = dispatcher_handle.await.unwrap();
        assert_eq!(report.summary.records, 3);
        assert_eq!(report.summary.undelivered, 0);
        assert_eq!(report.summary.last_frame_id, Some(3));
        assert!(report.sinks.iter().all(|(_, m)| m.write_count == 3));
        assert_eq!(report.sink("file").unwrap().frame_gap_total, 0);

        let lines = std::fs::read_to_string(dir.path().join(records_file_name(0))).unwrap();
        let records: Vec<serde_json::Value> = lines
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["frame_id"], 3);
        assert_eq!(records[0]["live_calib_seen"], true);

        let output_len = records[0]["output_len"].as_u64().unwrap();
        assert_eq!(records[2]["raw_offset"].as_u64().unwrap(), 2 * output_len * 4);
        let raw = std::fs::read(dir.path().join(raw_file_name(0))).unwrap();
        assert_eq!(raw.len() as u64, 3 * output_len * 4);
    }
}
