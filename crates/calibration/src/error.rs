use thiserror::Error;

/// Calibration setup errors
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// A model-frame basis could not be inverted
    #[error("model frame '{frame}' basis is singular")]
    SingularBasis { frame: &'static str },
}
