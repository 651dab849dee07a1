//! Ball localization and placement zone for swingcam.
//!
//! [`BallLocator`] finds the resting ball automatically, fits it from
//! clicked edge points, or tracks it frame to frame. [`ZoneMapper`] holds the
//! image-space hitting zone; [`ReadinessMonitor`] turns live detections into
//! a ball-in-zone readiness state.

mod circle_fit;
mod detect;
mod error;
mod live;
mod locator;
mod model;
mod readiness;
mod scale;
mod zone;

pub use circle_fit::{fit_circle, fit_from_edge_points, CircleFit, MANUAL_FIT_CONFIDENCE, MAX_EDGE_POINTS, MIN_EDGE_POINTS};
pub use detect::{BallCandidate, BallDetectParams, BallDetector, BallPolarity, Roi};
pub use error::{BallError, ZoneError};
pub use live::{ConstantVelocityKalman, LiveDetection, LiveTracker, LiveTrackerParams};
pub use locator::{BallConfig, BallLocator};
pub use model::{BallModel, BallSource, RadiusRange, BALL_DIAMETER_MM};
pub use readiness::{BallZoneState, ReadinessMonitor, ReadinessParams, ReadinessUpdate};
pub use scale::{BallScale, BallScaleEstimator};
pub use zone::{standard_zone_world, ZoneMapper, ZoneQuad, ZoneSource, ZONE_SIDE_MM};
