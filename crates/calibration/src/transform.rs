//! Warp matrix computation.
//!
//! `warp = intrinsics × view_from_device × R(roll, pitch, yaw) × calib_from_model`

use nalgebra::{Matrix3, Rotation3};

use crate::{
    ecam_intrinsics, fcam_intrinsics, medmodel_intrinsics, model_frame_from_calib_frame,
    sbigmodel_intrinsics, view_frame_from_device_frame, CalibrationError,
};

/// Device orientation relative to the calibrated frame (radians)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    /// From a `[roll, pitch, yaw]` calibration message
    pub fn from_rpy(rpy: [f32; 3]) -> Self {
        Self {
            roll: f64::from(rpy[0]),
            pitch: f64::from(rpy[1]),
            yaw: f64::from(rpy[2]),
        }
    }

    /// `Rz(yaw) · Ry(pitch) · Rx(roll)`
    pub fn rotation(&self) -> Matrix3<f64> {
        Rotation3::from_euler_angles(self.roll, self.pitch, self.yaw).into_inner()
    }
}

/// Precomputed constant matrices for warp computation
#[derive(Debug, Clone)]
pub struct CalibrationTransform {
    view_from_device: Matrix3<f64>,
    fcam: Matrix3<f64>,
    ecam: Matrix3<f64>,
    calib_from_medmodel: Matrix3<f64>,
    calib_from_sbigmodel: Matrix3<f64>,
}

impl CalibrationTransform {
    /// Precompute the model-frame basis inverses
    pub fn new() -> Result<Self, CalibrationError> {
        Ok(Self {
            view_from_device: view_frame_from_device_frame(),
            fcam: fcam_intrinsics(),
            ecam: ecam_intrinsics(),
            calib_from_medmodel: calib_from_model(&medmodel_intrinsics(), "medmodel")?,
            calib_from_sbigmodel: calib_from_model(&sbigmodel_intrinsics(), "sbigmodel")?,
        })
    }

    /// Warp matrix for one camera / model-frame pairing
    pub fn compute_warp(
        &self,
        euler: &EulerAngles,
        wide_intrinsics: bool,
        big_model_frame: bool,
    ) -> Matrix3<f64> {
        let intrinsics = if wide_intrinsics { &self.ecam } else { &self.fcam };
        let calib_from_model = if big_model_frame {
            &self.calib_from_sbigmodel
        } else {
            &self.calib_from_medmodel
        };
        let camera_from_calib = intrinsics * self.view_from_device * euler.rotation();
        camera_from_calib * calib_from_model
    }
}

fn calib_from_model(
    intrinsics: &Matrix3<f64>,
    frame: &'static str,
) -> Result<Matrix3<f64>, CalibrationError> {
    model_frame_from_calib_frame(intrinsics)
        .fixed_view::<3, 3>(0, 0)
        .into_owned()
        .try_inverse()
        .ok_or(CalibrationError::SingularBasis { frame })
}

/// Row-major `f32` flattening handed to the frame preprocessor
pub fn flatten_warp(warp: &Matrix3<f64>) -> [f32; 9] {
    let mut out = [0.0f32; 9];
    for row in 0..3 {
        for col in 0..3 {
            out[row * 3 + col] = warp[(row, col)] as f32;
        }
    }
    out
}
