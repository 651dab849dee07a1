//! Camera calibration for the swingcam launch monitor.
//!
//! ## Quickstart
//!
//! ```
//! use swingcam_calib::{CalibratorConfig, GeometricCalibrator};
//!
//! let mut calibrator = GeometricCalibrator::new(CalibratorConfig::default());
//! calibrator.begin_intrinsic_calibration(9, 6, 25.0).unwrap();
//! assert_eq!(calibrator.observation_count(), 0);
//! ```
//!
//! Pipeline:
//! 1. Detect ChESS corners in each calibration frame.
//! 2. Assemble them into the expected interior-corner grid.
//! 3. Collect at least `min_observations` boards from varied poses.
//! 4. Closed-form camera matrix from per-view homographies.
//! 5. Joint Levenberg-Marquardt over intrinsics, distortion and view poses.
//! 6. With intrinsics fixed, solve the ground pose from four marked points.

mod board;
mod calibrator;
mod corners;
mod error;
mod grid;
mod intrinsics;
mod lm;
mod pose;
mod zhang;

#[cfg(test)]
mod testutil;

pub use board::{CheckerboardObservation, CheckerboardSpec, CORNER_COUNT_RANGE, SQUARE_SIZE_RANGE_MM};
pub use calibrator::{format_summary, CalibrationEvent, CalibratorConfig, GeometricCalibrator};
pub use corners::{detect_corners, CheckerboardFinder, ChessboardFinder, CornerDetectParams};
pub use error::CalibrationError;
pub use grid::{assemble_board, Corner, GridGraph, GridGraphParams, NeighborDirection, NodeNeighbor};
pub use intrinsics::{Distortion, IntrinsicProfile};
pub use pose::{
    solve_planar_pose, validate_correspondences, ExtrinsicCalibration, ExtrinsicPose, RigidPose,
};
pub use zhang::{calibrate_intrinsics, DistortionModel, IntrinsicSolution, ZhangOptions};
