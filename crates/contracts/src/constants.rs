//! Model contract constants.
//!
//! These sizes are baked into the exported model and must match it exactly.

/// One-hot desire vector length.
pub const DESIRE_LEN: usize = 8;

/// Number of past cycles kept in the history windows.
pub const HISTORY_BUFFER_LEN: usize = 99;

/// Length of the feature vector fed back from the model output.
pub const FEATURE_LEN: usize = 128;

/// Traffic convention one-hot length (`[left-hand drive, right-hand drive]`).
pub const TRAFFIC_CONVENTION_LEN: usize = 2;

/// Navigation feature vector length.
pub const NAV_FEATURE_LEN: usize = 256;

/// Offset of the feedback feature block inside the raw model output.
pub const OUTPUT_SIZE: usize = 5990;

/// Total raw model output length.
pub const MODEL_OUTPUT_SIZE: usize = 6120;

/// Model evaluation cadence (Hz).
pub const MODEL_FREQ: f64 = 20.0;

/// Model input image width (pixels).
pub const MODEL_WIDTH: usize = 512;

/// Model input image height (pixels).
pub const MODEL_HEIGHT: usize = 256;

/// One YUV420 model frame (elements).
pub const MODEL_FRAME_SIZE: usize = MODEL_WIDTH * MODEL_HEIGHT * 3 / 2;

/// Image input tensor length: two stacked model frames.
pub const IMAGE_BUFFER_SIZE: usize = MODEL_FRAME_SIZE * 2;

/// Desire history window length in elements.
pub const DESIRE_HISTORY_SIZE: usize = DESIRE_LEN * (HISTORY_BUFFER_LEN + 1);

/// Feature history window length in elements.
pub const FEATURE_HISTORY_SIZE: usize = FEATURE_LEN * HISTORY_BUFFER_LEN;

/// Main stream must lead the extra stream by this margin (ns).
pub const SYNC_LEAD_THRESHOLD_NS: u64 = 25_000_000;

/// Start-of-frame skew above which streams are reported out of sync (ns).
pub const DESYNC_THRESHOLD_NS: u64 = 10_000_000;

/// Minimum rising-edge delta that turns a desire level into a pulse.
pub const DESIRE_EDGE_THRESHOLD: f32 = 0.99;

/// Dropped frames per cycle are clamped to this before filtering.
pub const MAX_DROPPED_FRAMES: u32 = 10;

/// Drop-rate filter time constant (seconds).
pub const DROP_FILTER_TIME_CONSTANT_S: f64 = 10.0;

/// Cycles after start during which the drop-rate input is forced to zero.
pub const DROP_WARMUP_CYCLES: u32 = 10;
