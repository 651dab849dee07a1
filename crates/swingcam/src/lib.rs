//! Camera-verified golf impact capture.
//!
//! This is the facade crate: it re-exports the component crates and adds the
//! pieces that span them, namely the device configuration file and the
//! persisted calibration artifact.
//!
//! - [`calib`]: checkerboard intrinsics and ground pose.
//! - [`ball`]: ball detection, edge fitting, live tracking and the hitting zone.
//! - [`capture`]: radar swing tracking, frame ring and impact confirmation.
//!
//! ## Quickstart
//!
//! ```no_run
//! use swingcam::{CalibrationArtifact, SwingcamConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SwingcamConfig::load_json("swingcam.json")?;
//! let mut calibrator = config.build_calibrator();
//! let mut zone = config.build_zone();
//! let mut locator = config.build_locator()?;
//!
//! let artifact = CalibrationArtifact::load_or_default(&config.artifact_path)?;
//! artifact.apply(&mut calibrator, &mut zone, &mut locator)?;
//! print!("{}", artifact.describe());
//! # Ok(())
//! # }
//! ```

mod artifact;
mod config;

pub use swingcam_ball as ball;
pub use swingcam_calib as calib;
pub use swingcam_capture as capture;

pub use artifact::{ArtifactError, CalibrationArtifact, ARTIFACT_VERSION};
pub use config::{ConfigError, SwingcamConfig, ZoneConfig};

pub use swingcam_ball::{BallLocator, BallModel, ZoneMapper};
pub use swingcam_calib::{CalibrationError, CalibrationEvent, GeometricCalibrator};
pub use swingcam_capture::{
    CaptureEvent, CaptureStatus, ImpactCaptureEngine, RadarPoller, RadarSwingTracker, SwingState,
};
pub use swingcam_core::{init_with_level, Frame, FrameSource, GrayImage, LogConfig, RawFrame};

#[cfg(feature = "tracing")]
pub use swingcam_core::init_tracing;

/// Load an image file as a luma frame.
pub fn load_frame(path: impl AsRef<std::path::Path>, sequence: u64) -> Result<Frame, image::ImageError> {
    let img = image::open(path)?.to_luma8();
    Ok(Frame::new(
        GrayImage::from_image(&img),
        std::time::Duration::ZERO,
        sequence,
    ))
}
