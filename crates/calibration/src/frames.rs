//! Fixed camera and model frame constants.
//!
//! Device frame: x forward, y right, z down.
//! View frame: x right, y down, z forward (camera optical axis).

use nalgebra::{Matrix3, Matrix3x4};

/// Narrow road camera intrinsics
pub fn fcam_intrinsics() -> Matrix3<f64> {
    Matrix3::new(
        2648.0, 0.0, 1928.0 / 2.0, //
        0.0, 2648.0, 1208.0 / 2.0, //
        0.0, 0.0, 1.0,
    )
}

/// Wide road camera intrinsics
pub fn ecam_intrinsics() -> Matrix3<f64> {
    Matrix3::new(
        567.0, 0.0, 1928.0 / 2.0, //
        0.0, 567.0, 1208.0 / 2.0, //
        0.0, 0.0, 1.0,
    )
}

/// Axis permutation from device frame to view frame
pub fn view_frame_from_device_frame() -> Matrix3<f64> {
    Matrix3::new(
        0.0, 1.0, 0.0, //
        0.0, 0.0, 1.0, //
        1.0, 0.0, 0.0,
    )
}

/// Intrinsics of the regular model input frame (512x256)
pub fn medmodel_intrinsics() -> Matrix3<f64> {
    Matrix3::new(
        910.0, 0.0, 512.0 / 2.0, //
        0.0, 910.0, 47.6, //
        0.0, 0.0, 1.0,
    )
}

/// Intrinsics of the big (wide) model input frame
pub fn sbigmodel_intrinsics() -> Matrix3<f64> {
    Matrix3::new(
        455.0, 0.0, 512.0 / 2.0, //
        0.0, 455.0, 0.5 * (256.0 + 47.6), //
        0.0, 0.0, 1.0,
    )
}

/// `intrinsics × [view_from_device | 0]` at zero orientation and height
pub fn model_frame_from_calib_frame(intrinsics: &Matrix3<f64>) -> Matrix3x4<f64> {
    let mut view_from_calib = Matrix3x4::zeros();
    view_from_calib
        .fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&view_frame_from_device_frame());
    intrinsics * view_from_calib
}
