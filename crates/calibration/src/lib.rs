//! # Calibration
//!
//! Device orientation → model warp matrices.
//!
//! Responsibilities:
//! - Fixed camera / model intrinsics and frame-basis constants
//! - Per-camera warp computation (`CalibrationTransform::compute_warp`)
//! - Latched calibration state updated from live calibration events

mod error;
mod frames;
mod state;
mod transform;

pub use error::CalibrationError;
pub use frames::*;
pub use state::CalibrationState;
pub use transform::{flatten_warp, CalibrationTransform, EulerAngles};
