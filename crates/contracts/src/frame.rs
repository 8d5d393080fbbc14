//! CameraFrame - frame transport output
//!
//! One buffer delivered by a camera stream.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Camera stream identifiers published by the camera daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    /// Narrow road-facing camera
    Road,
    /// Wide-angle road-facing camera
    WideRoad,
    /// Driver-facing camera
    Driver,
}

impl StreamType {
    /// Stable name used in logs and metric labels
    pub fn as_str(self) -> &'static str {
        match self {
            StreamType::Road => "road",
            StreamType::WideRoad => "wide_road",
            StreamType::Driver => "driver",
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera frame
///
/// `data` is an opaque, reference-counted handle; cloning a frame never
/// copies pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    /// Source stream
    pub stream: StreamType,

    /// Frame id, strictly increasing per stream
    pub frame_id: u32,

    /// Start-of-frame timestamp (nanoseconds, monotonic clock)
    pub timestamp_sof: u64,

    /// End-of-frame timestamp (nanoseconds, monotonic clock)
    pub timestamp_eof: u64,

    /// Buffer geometry
    pub info: BufferInfo,

    /// Raw YUV buffer
    pub data: Bytes,
}

/// Buffer geometry reported by a connected stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row stride in bytes
    pub stride: u32,
    /// Total buffer length in bytes
    pub len: usize,
}

impl BufferInfo {
    /// Geometry of a tightly packed NV12 buffer
    pub fn nv12(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stride: width,
            len: width as usize * height as usize * 3 / 2,
        }
    }
}
