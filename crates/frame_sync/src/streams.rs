//! Stream discovery, selection and connection retry.

use std::collections::HashSet;
use std::time::Duration;

use contracts::{FrameSource, FrameTransport, StreamType, StreamsConfig};
use tracing::{debug, info};

use crate::FrameSyncError;

/// Which streams to attach to, decided once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSelection {
    /// Stream driving the cadence
    pub main: StreamType,
    /// Whether a separate wide stream feeds the big model input
    pub use_extra: bool,
    /// Whether the main stream is the wide camera
    pub main_wide_camera: bool,
}

impl StreamSelection {
    /// Decide from the published stream set.
    ///
    /// Returns `None` when neither road-facing camera is published.
    pub fn from_available(available: &HashSet<StreamType>) -> Option<Self> {
        let has_road = available.contains(&StreamType::Road);
        let has_wide = available.contains(&StreamType::WideRoad);
        if !has_road && !has_wide {
            return None;
        }

        let main_wide_camera = !has_road;
        Some(Self {
            main: if main_wide_camera {
                StreamType::WideRoad
            } else {
                StreamType::Road
            },
            use_extra: has_road && has_wide,
            main_wide_camera,
        })
    }

    /// Extra stream, if one is used
    pub fn extra(&self) -> Option<StreamType> {
        self.use_extra.then_some(StreamType::WideRoad)
    }
}

fn exhausted(attempts: u32, max_attempts: u32) -> bool {
    max_attempts > 0 && attempts >= max_attempts
}

/// Poll the transport until it publishes at least one stream
pub fn wait_for_streams(
    transport: &dyn FrameTransport,
    config: &StreamsConfig,
) -> Result<HashSet<StreamType>, FrameSyncError> {
    let interval = Duration::from_millis(config.retry_interval_ms);
    let mut attempts = 0u32;
    loop {
        let available = transport.available_streams();
        if !available.is_empty() {
            return Ok(available);
        }
        attempts = attempts.saturating_add(1);
        if exhausted(attempts, config.max_connect_attempts) {
            return Err(FrameSyncError::StreamsUnavailable { attempts });
        }
        debug!(attempts, "waiting for camera streams");
        std::thread::sleep(interval);
    }
}

/// Non-blocking connect, retried at the configured interval
pub fn connect_with_retry(
    source: &mut dyn FrameSource,
    config: &StreamsConfig,
) -> Result<(), FrameSyncError> {
    let interval = Duration::from_millis(config.retry_interval_ms);
    let mut attempts = 0u32;
    while !source.connect(false) {
        attempts = attempts.saturating_add(1);
        if exhausted(attempts, config.max_connect_attempts) {
            return Err(FrameSyncError::ConnectFailed {
                stream: source.stream(),
                attempts,
            });
        }
        std::thread::sleep(interval);
    }

    match source.buffer_info() {
        Some(info) => info!(
            stream = %source.stream(),
            buffer_len = info.len,
            width = info.width,
            height = info.height,
            "connected camera stream"
        ),
        None => info!(stream = %source.stream(), "connected camera stream"),
    }
    Ok(())
}
