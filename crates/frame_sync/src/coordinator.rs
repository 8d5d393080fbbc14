//! Two-stream frame synchronisation.
//!
//! Each cycle the main stream is pulled until it leads the extra stream by
//! the lead threshold, then the extra stream is pulled until that condition
//! holds from its side. Without an extra stream the extra timestamp tracks
//! the main one, so every cycle pulls exactly one new main frame.

use contracts::{CameraFrame, FrameSource, FrameTransport, StreamsConfig, SyncConfig};
use tracing::{error, instrument, warn};

use crate::streams::{connect_with_retry, wait_for_streams, StreamSelection};
use crate::FrameSyncError;

/// Per-cycle coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Pulling main frames
    WaitingMain,
    /// Main frame in hand
    HaveMain,
    /// Pulling extra frames
    WaitingExtra,
    /// Main frame ready, no extra stream to pair it with
    SingleCamera,
    /// Main and extra frames paired
    Synced,
}

/// Time-aligned frame pair
#[derive(Debug, Clone)]
pub struct SyncedFrames {
    pub main: CameraFrame,
    /// `None` in single-camera mode
    pub extra: Option<CameraFrame>,
    /// Start-of-frame skew between main and extra (ns)
    pub skew_ns: u64,
    /// Skew exceeded the desync threshold
    pub desynced: bool,
}

impl SyncedFrames {
    /// Extra frame, aliased to main in single-camera mode
    pub fn extra_or_main(&self) -> &CameraFrame {
        self.extra.as_ref().unwrap_or(&self.main)
    }

    pub fn extra_frame_id(&self) -> u32 {
        self.extra_or_main().frame_id
    }
}

/// Result of one synchronisation attempt
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Synced(SyncedFrames),
    /// Main stream had nothing; nothing was mutated downstream
    NoMainFrame,
    /// Extra stream ran dry before catching up
    NoExtraFrame,
}

/// Coordinator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub attempts: u64,
    pub synced: u64,
    pub main_misses: u64,
    pub extra_misses: u64,
    pub desync_events: u64,
    pub main_frames_received: u64,
    pub extra_frames_received: u64,
}

/// Frame synchronisation coordinator
pub struct FrameSyncCoordinator {
    config: SyncConfig,
    main: Box<dyn FrameSource>,
    extra: Option<Box<dyn FrameSource>>,
    /// Last main frame received, reused while the extra stream catches up
    main_frame: Option<CameraFrame>,
    main_ts: u64,
    extra_ts: u64,
    state: SyncState,
    stats: SyncStats,
}

impl FrameSyncCoordinator {
    /// Create a coordinator over already-connected sources
    pub fn new(
        config: SyncConfig,
        main: Box<dyn FrameSource>,
        extra: Option<Box<dyn FrameSource>>,
    ) -> Self {
        Self {
            config,
            main,
            extra,
            main_frame: None,
            main_ts: 0,
            extra_ts: 0,
            state: SyncState::WaitingMain,
            stats: SyncStats::default(),
        }
    }

    /// Discover streams, select main/extra and connect them with retry
    pub fn open(
        transport: &mut dyn FrameTransport,
        streams: &StreamsConfig,
        config: SyncConfig,
    ) -> Result<(Self, StreamSelection), FrameSyncError> {
        let available = wait_for_streams(transport, streams)?;
        let selection = StreamSelection::from_available(&available).ok_or_else(|| {
            let mut available: Vec<_> = available.into_iter().collect();
            available.sort();
            FrameSyncError::NoRoadStream { available }
        })?;
        tracing::info!(
            main = %selection.main,
            main_wide_camera = selection.main_wide_camera,
            use_extra = selection.use_extra,
            "vision streams selected"
        );

        let mut main = transport.open(selection.main)?;
        connect_with_retry(main.as_mut(), streams)?;

        let extra = match selection.extra() {
            Some(stream) => {
                let mut extra = transport.open(stream)?;
                connect_with_retry(extra.as_mut(), streams)?;
                Some(extra)
            }
            None => None,
        };

        Ok((Self::new(config, main, extra), selection))
    }

    pub fn is_single_camera(&self) -> bool {
        self.extra.is_none()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Produce the next aligned pair, or report which stream ran dry
    #[instrument(level = "trace", name = "frame_sync_next_pair", skip(self))]
    pub fn next_pair(&mut self) -> SyncOutcome {
        self.stats.attempts += 1;
        let lead = self.config.lead_threshold_ns;

        self.state = SyncState::WaitingMain;
        while self.main_ts < self.extra_ts.saturating_add(lead) {
            match self.main.receive() {
                Some(frame) => {
                    self.main_ts = frame.timestamp_sof;
                    self.stats.main_frames_received += 1;
                    record_camera_frame(&frame);
                    self.main_frame = Some(frame);
                }
                None => {
                    self.main_frame = None;
                    break;
                }
            }
        }

        let Some(main) = self.main_frame.clone() else {
            error!(stream = %self.main.stream(), "main stream no frame");
            self.stats.main_misses += 1;
            record_sync_failure(self.main.stream().as_str());
            return SyncOutcome::NoMainFrame;
        };
        self.state = SyncState::HaveMain;

        let Some(extra_source) = self.extra.as_mut() else {
            self.extra_ts = self.main_ts;
            self.state = SyncState::SingleCamera;
            self.stats.synced += 1;
            return SyncOutcome::Synced(SyncedFrames {
                main,
                extra: None,
                skew_ns: 0,
                desynced: false,
            });
        };

        self.state = SyncState::WaitingExtra;
        let extra = loop {
            match extra_source.receive() {
                Some(frame) => {
                    self.extra_ts = frame.timestamp_sof;
                    self.stats.extra_frames_received += 1;
                    record_camera_frame(&frame);
                    if self.main_ts < self.extra_ts.saturating_add(lead) {
                        break Some(frame);
                    }
                }
                None => break None,
            }
        };

        let Some(extra) = extra else {
            error!(stream = %extra_source.stream(), "extra stream no frame");
            self.stats.extra_misses += 1;
            record_sync_failure(extra_source.stream().as_str());
            return SyncOutcome::NoExtraFrame;
        };

        let skew_ns = self.main_ts.abs_diff(self.extra_ts);
        let desynced = skew_ns > self.config.desync_threshold_ns;
        if desynced {
            self.stats.desync_events += 1;
            warn!(
                main_frame_id = main.frame_id,
                main_ts_s = main.timestamp_sof as f64 / 1e9,
                extra_frame_id = extra.frame_id,
                extra_ts_s = extra.timestamp_sof as f64 / 1e9,
                skew_ns,
                "frames out of sync"
            );
            metrics::counter!("modeld_desync_total").increment(1);
        }

        self.state = SyncState::Synced;
        self.stats.synced += 1;
        SyncOutcome::Synced(SyncedFrames {
            main,
            extra: Some(extra),
            skew_ns,
            desynced,
        })
    }
}

/// Frames lost between the previously evaluated main frame and `current`
pub fn dropped_frames(current: u32, last: u32) -> u32 {
    current.saturating_sub(last).saturating_sub(1)
}

fn record_camera_frame(frame: &CameraFrame) {
    metrics::counter!(
        "modeld_camera_frames_total",
        "stream" => frame.stream.as_str()
    )
    .increment(1);
}

fn record_sync_failure(stream: &'static str) {
    metrics::counter!("modeld_sync_failures_total", "stream" => stream).increment(1);
}
