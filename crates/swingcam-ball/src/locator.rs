use crossbeam_channel::Sender;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use swingcam_calib::{CalibrationEvent, ExtrinsicPose, IntrinsicProfile};
use swingcam_core::Frame;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::circle_fit::fit_from_edge_points;
use crate::detect::{BallDetectParams, BallDetector, Roi};
use crate::live::{LiveDetection, LiveTracker, LiveTrackerParams};
use crate::{BallError, BallModel, RadiusRange, ZoneMapper};

fn default_radius_tolerance() -> f64 {
    0.35
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BallConfig {
    #[serde(default)]
    pub detect: BallDetectParams,
    #[serde(default)]
    pub live: LiveTrackerParams,
    /// Relative tolerance around the calibrated expected radius.
    #[serde(default = "default_radius_tolerance")]
    pub radius_tolerance: f64,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            detect: BallDetectParams::default(),
            live: LiveTrackerParams::default(),
            radius_tolerance: default_radius_tolerance(),
        }
    }
}

/// Automatic detection, manual fitting and live tracking of the ball.
pub struct BallLocator {
    detector: BallDetector,
    tracker: LiveTracker,
    radius_tolerance: f64,
    calibrated: Option<BallModel>,
    events: Option<Sender<CalibrationEvent>>,
}

impl BallLocator {
    pub fn new(config: BallConfig) -> Result<Self, BallError> {
        Ok(Self {
            detector: BallDetector::new(config.detect)?,
            tracker: LiveTracker::new(config.live),
            radius_tolerance: config.radius_tolerance,
            calibrated: None,
            events: None,
        })
    }

    pub fn set_event_sender(&mut self, tx: Sender<CalibrationEvent>) {
        self.events = Some(tx);
    }

    pub fn detector(&self) -> &BallDetector {
        &self.detector
    }

    /// Calibrated ball, if one has been detected or fitted.
    pub fn calibrated_ball(&self) -> Option<&BallModel> {
        self.calibrated.as_ref()
    }

    pub fn restore(&mut self, ball: Option<BallModel>) {
        self.calibrated = ball;
        self.tracker.reset();
    }

    /// Bound the search radius by the expected ball size at the working
    /// distance.
    pub fn apply_calibration(
        &mut self,
        intrinsics: &IntrinsicProfile,
        pose: &ExtrinsicPose,
    ) -> Result<RadiusRange, BallError> {
        let range = RadiusRange::from_calibration(intrinsics, pose, self.radius_tolerance)?;
        log::info!(
            "ball radius range {:.1}..{:.1} px",
            range.min_px,
            range.max_px
        );
        self.detector.set_radius_range(range);
        self.tracker.reset();
        Ok(range)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(seq = frame.sequence))
    )]
    pub fn detect_automatic(&mut self, frame: &Frame, roi: Option<Roi>) -> Result<BallModel, BallError> {
        let ball = self.detector.detect(&frame.view(), roi)?;
        Ok(self.accept(ball))
    }

    pub fn fit_from_edge_points(&mut self, points: &[Point2<f64>]) -> Result<BallModel, BallError> {
        let ball = fit_from_edge_points(points, self.detector.params().max_fit_residual_px)?;
        Ok(self.accept(ball))
    }

    fn accept(&mut self, ball: BallModel) -> BallModel {
        self.calibrated = Some(ball);
        if let Some(tx) = &self.events {
            let event = CalibrationEvent::BallDetected {
                x: ball.center.x,
                y: ball.center.y,
                radius: ball.radius,
                confidence: ball.confidence,
            };
            if tx.try_send(event).is_err() {
                log::warn!("ball event dropped");
            }
        }
        ball
    }

    /// One live tracking tick.
    pub fn detect_live(&mut self, frame: &Frame, zone: &ZoneMapper) -> LiveDetection {
        let expected = self.calibrated.map(|b| b.radius);
        self.tracker.update(&self.detector, frame, zone, expected)
    }

    pub fn reset_tracking(&mut self) {
        self.tracker.reset();
    }
}
