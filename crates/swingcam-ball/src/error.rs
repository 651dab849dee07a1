/// Ball detection and fitting failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BallError {
    #[error("no ball found")]
    NoBallFound,
    #[error("too few edge points ({got}, need at least {need})")]
    TooFewPoints { got: usize, need: usize },
    #[error("degenerate circle fit: {0}")]
    DegenerateFit(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("inconsistent ball scale samples (std {rel_std:.1}% of mean radius)")]
    InconsistentScale { rel_std: f64 },
}

impl BallError {
    /// Per-frame misses that the next frame may resolve.
    pub fn is_transient(&self) -> bool {
        matches!(self, BallError::NoBallFound)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ZoneError {
    #[error("invalid zone shape: {0}")]
    InvalidZoneShape(String),
}
