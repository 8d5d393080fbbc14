//! CycleReport - per-cycle summary used for logs and metrics

use serde::{Deserialize, Serialize};

/// What happened in one evaluated or prepare-only cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Cycle index since start
    pub cycle: u64,
    pub frame_id: u32,
    pub frame_id_extra: u32,
    pub frames_dropped: u32,
    pub frame_drop_ratio: f32,
    /// Whether the engine ran (false on prepare-only cycles)
    pub executed: bool,
    /// Evaluation wall time (seconds)
    pub execution_time: f64,
    /// Start-of-frame skew between main and extra (ns)
    pub skew_ns: u64,
    pub desynced: bool,
    pub published: bool,
}
