/// Errors returned by [`crate::GeometricCalibrator`].
///
/// Variants fall into the usual buckets: input validation
/// (`InvalidParameters`), transient detection misses (`CornersNotFound`),
/// numerical failures (`CalibrationDidNotConverge`, `DegenerateCorrespondence`)
/// and precondition violations (`NoActiveSession`, `NotIntrinsicallyCalibrated`).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("no intrinsic calibration session in progress")]
    NoActiveSession,
    #[error("checkerboard corners not found")]
    CornersNotFound,
    #[error("insufficient observations ({have} of {need})")]
    InsufficientObservations { have: usize, need: usize },
    #[error("calibration did not converge: {0}")]
    CalibrationDidNotConverge(String),
    #[error("degenerate correspondence: {0}")]
    DegenerateCorrespondence(String),
    #[error("extrinsic pose requires a finished intrinsic calibration")]
    NotIntrinsicallyCalibrated,
}

impl CalibrationError {
    /// Transient failures leave the session usable and may simply be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CalibrationError::CornersNotFound)
    }
}
