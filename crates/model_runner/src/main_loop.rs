//! Fixed-cadence driver.
//!
//! One cycle: sync frames → read upstream → maybe update calibration →
//! update drop estimate → evaluate → publish. All per-cycle state lives in
//! [`CycleContext`], owned and mutated only here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use calibration::{CalibrationState, CalibrationTransform};
use contracts::{
    CycleReport, DropFilterConfig, FramePreprocessor, FrameTransport, InferenceEngine,
    ModelOutputRecord, ModelPublisher, ModeldConfig, UpstreamSource, UpstreamState,
};
use frame_sync::{dropped_frames, DropRateEstimator, FrameSyncCoordinator, SyncOutcome, SyncStats};
use observability::{CycleMetricsAggregator, MetricsSummary};
use tracing::{info, instrument, warn};

use crate::{InferenceOrchestrator, RunnerError, UpstreamInputs};

/// Loop state carried from one cycle to the next
#[derive(Debug, Clone, Default)]
pub struct CycleContext {
    /// Main frame id of the last completed cycle
    pub last_main_frame_id: u32,
    pub calibration: CalibrationState,
    pub upstream: UpstreamState,
    /// Completed cycles (frames obtained)
    pub run_count: u64,
    /// Main stream is the wide camera
    pub main_wide_camera: bool,
}

/// What one call to [`MainLoop::run_cycle`] did
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// A stream had no frame; nothing was mutated
    NoFrame,
    /// Frames were dropped; images prepared, engine skipped
    PrepareOnly(CycleReport),
    /// Engine ran and the result was handed to the publisher
    Evaluated(CycleReport),
}

/// Totals returned by [`MainLoop::run`]
#[derive(Debug, Clone)]
pub struct LoopStats {
    pub iterations: u64,
    pub sync: SyncStats,
    pub summary: MetricsSummary,
}

/// The model loop
pub struct MainLoop<E, P> {
    sync: FrameSyncCoordinator,
    upstream: Box<dyn UpstreamSource>,
    orchestrator: InferenceOrchestrator<E, P>,
    publisher: Box<dyn ModelPublisher>,
    drop_rate: DropRateEstimator,
    transform: CalibrationTransform,
    ctx: CycleContext,
    aggregator: CycleMetricsAggregator,
}

impl<E, P> MainLoop<E, P>
where
    E: InferenceEngine,
    P: FramePreprocessor,
{
    pub fn new(
        sync: FrameSyncCoordinator,
        main_wide_camera: bool,
        upstream: Box<dyn UpstreamSource>,
        orchestrator: InferenceOrchestrator<E, P>,
        publisher: Box<dyn ModelPublisher>,
        drop_filter: &DropFilterConfig,
    ) -> Result<Self, RunnerError> {
        Ok(Self {
            sync,
            upstream,
            orchestrator,
            publisher,
            drop_rate: DropRateEstimator::new(drop_filter),
            transform: CalibrationTransform::new()?,
            ctx: CycleContext {
                main_wide_camera,
                ..CycleContext::default()
            },
            aggregator: CycleMetricsAggregator::new(),
        })
    }

    /// Discover and connect camera streams, then build the loop
    pub fn start(
        transport: &mut dyn FrameTransport,
        config: &ModeldConfig,
        upstream: Box<dyn UpstreamSource>,
        orchestrator: InferenceOrchestrator<E, P>,
        publisher: Box<dyn ModelPublisher>,
    ) -> Result<Self, RunnerError> {
        let (sync, selection) =
            FrameSyncCoordinator::open(transport, &config.streams, config.sync.clone())?;
        info!(
            main_wide_camera = selection.main_wide_camera,
            use_extra = selection.use_extra,
            "vision streams connected, modeld starting"
        );
        Self::new(
            sync,
            selection.main_wide_camera,
            upstream,
            orchestrator,
            publisher,
            &config.drop_filter,
        )
    }

    /// Run a single cycle.
    ///
    /// # Errors
    /// Only collaborator failures; missing frames and publish failures are
    /// reported through the outcome.
    #[instrument(name = "modeld_cycle", skip(self), fields(cycle = self.ctx.run_count))]
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, RunnerError> {
        let frames = match self.sync.next_pair() {
            SyncOutcome::Synced(frames) => frames,
            SyncOutcome::NoMainFrame => return Ok(self.skip("no_main_frame")),
            SyncOutcome::NoExtraFrame => return Ok(self.skip("no_extra_frame")),
        };

        self.ctx.upstream.apply(self.upstream.poll());
        if self.ctx.upstream.updated.live_calibration {
            if let Some(rpy) = self.ctx.upstream.live_calibration {
                self.ctx
                    .calibration
                    .apply(&self.transform, rpy, self.ctx.main_wide_camera);
            }
        }

        let dropped = dropped_frames(frames.main.frame_id, self.ctx.last_main_frame_id);
        self.drop_rate.update(dropped);
        let frame_drop_ratio = self.drop_rate.ratio() as f32;
        self.ctx.run_count += 1;

        let prepare_only = dropped > 0;
        if prepare_only {
            warn!(frame_id = frames.main.frame_id, dropped, "skipping model eval");
        }

        let inputs = UpstreamInputs::from_state(&self.ctx.upstream);
        let warp_main = self.ctx.calibration.main_flat();
        let warp_wide = self.ctx.calibration.wide_flat();

        let started = Instant::now();
        let raw_output = self
            .orchestrator
            .evaluate(
                &frames.main,
                frames.extra.as_ref(),
                &warp_main,
                &warp_wide,
                &inputs,
                prepare_only,
            )?
            .map(<[f32]>::to_vec);
        let execution_time = started.elapsed().as_secs_f64();

        let executed = raw_output.is_some();
        let mut published = false;
        if let Some(raw_output) = raw_output {
            let record = ModelOutputRecord {
                frame_id: frames.main.frame_id,
                frame_id_extra: frames.extra_frame_id(),
                frame_id_plan: self.ctx.upstream.road_frame_id,
                frame_drop_ratio,
                frames_dropped: dropped,
                timestamp_eof: frames.main.timestamp_eof,
                model_execution_time: execution_time as f32,
                live_calib_seen: self.ctx.calibration.seen,
                raw_output,
            };
            match self.publisher.publish(record) {
                Ok(()) => published = true,
                Err(e) => warn!(error = %e, frame_id = frames.main.frame_id, "publish failed"),
            }
        }

        self.ctx.last_main_frame_id = frames.main.frame_id;

        let report = CycleReport {
            cycle: self.ctx.run_count,
            frame_id: frames.main.frame_id,
            frame_id_extra: frames.extra_frame_id(),
            frames_dropped: dropped,
            frame_drop_ratio,
            executed,
            execution_time,
            skew_ns: frames.skew_ns,
            desynced: frames.desynced,
            published,
        };
        observability::record_cycle_metrics(&report);
        self.aggregator.update(&report);

        Ok(if executed {
            CycleOutcome::Evaluated(report)
        } else {
            CycleOutcome::PrepareOnly(report)
        })
    }

    fn skip(&mut self, reason: &'static str) -> CycleOutcome {
        observability::record_cycle_skipped(reason);
        self.aggregator.record_skip();
        CycleOutcome::NoFrame
    }

    /// Cycle until `stop` is set or `max_cycles` iterations have run
    pub fn run(
        &mut self,
        stop: &AtomicBool,
        max_cycles: Option<u64>,
    ) -> Result<LoopStats, RunnerError> {
        let mut iterations = 0u64;
        while !stop.load(Ordering::Relaxed) {
            if max_cycles.is_some_and(|max| iterations >= max) {
                break;
            }
            self.run_cycle()?;
            iterations += 1;
        }

        info!(iterations, "model loop stopped");
        Ok(LoopStats {
            iterations,
            sync: self.sync.stats(),
            summary: self.aggregator.summary(),
        })
    }

    pub fn context(&self) -> &CycleContext {
        &self.ctx
    }

    pub fn orchestrator(&self) -> &InferenceOrchestrator<E, P> {
        &self.orchestrator
    }

    pub fn drop_rate(&self) -> &DropRateEstimator {
        &self.drop_rate
    }

    pub fn is_single_camera(&self) -> bool {
        self.sync.is_single_camera()
    }
}
