//! Latched calibration state owned by the main loop.

use nalgebra::Matrix3;
use tracing::info;

use crate::{flatten_warp, CalibrationTransform, EulerAngles};

/// Current orientation and warp matrices
///
/// Starts with zero matrices and `seen == false`; `seen` never goes back to
/// false once a calibration has been applied.
#[derive(Debug, Clone)]
pub struct CalibrationState {
    pub euler: EulerAngles,
    pub warp_main: Matrix3<f64>,
    pub warp_wide: Matrix3<f64>,
    pub seen: bool,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            euler: EulerAngles::default(),
            warp_main: Matrix3::zeros(),
            warp_wide: Matrix3::zeros(),
            seen: false,
        }
    }
}

impl CalibrationState {
    /// Recompute both warps from a live calibration update.
    ///
    /// The main warp uses the wide intrinsics only when the wide camera is
    /// the main stream; the extra warp always pairs the wide camera with the
    /// big model frame.
    pub fn apply(
        &mut self,
        transform: &CalibrationTransform,
        rpy: [f32; 3],
        main_wide_camera: bool,
    ) {
        let first = !self.seen;
        self.euler = EulerAngles::from_rpy(rpy);
        self.warp_main = transform.compute_warp(&self.euler, main_wide_camera, false);
        self.warp_wide = transform.compute_warp(&self.euler, true, true);
        self.seen = true;

        if first {
            info!(
                roll = self.euler.roll,
                pitch = self.euler.pitch,
                yaw = self.euler.yaw,
                "live calibration received"
            );
        }
    }

    /// Flattened main warp
    pub fn main_flat(&self) -> [f32; 9] {
        flatten_warp(&self.warp_main)
    }

    /// Flattened wide warp
    pub fn wide_flat(&self) -> [f32; 9] {
        flatten_warp(&self.warp_wide)
    }
}
