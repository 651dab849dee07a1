use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error("no frames to encode")]
    Empty,
    #[error("replay cancelled")]
    Cancelled,
    #[error("frame {index} has size {got:?}, expected {expected:?}")]
    SizeMismatch {
        index: usize,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode error: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("no frame available")]
    NoFrame,
    #[error("recording already active")]
    AlreadyRecording,
    #[error("capture engine stopped")]
    Stopped,
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
}
