use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use swingcam_calib::{ExtrinsicPose, IntrinsicProfile};

use crate::BallError;

/// Regulation ball diameter.
pub const BALL_DIAMETER_MM: f64 = 42.67;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallSource {
    #[default]
    Automatic,
    Manual,
    Live,
}

/// Circle in image space, sub-pixel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BallModel {
    pub center: Point2<f64>,
    pub radius: f64,
    /// Normalized match quality in `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub source: BallSource,
}

impl BallModel {
    pub fn distance_to(&self, p: Point2<f64>) -> f64 {
        (self.center - p).norm()
    }
}

/// Accepted ball radii in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadiusRange {
    pub min_px: f64,
    pub max_px: f64,
}

impl Default for RadiusRange {
    fn default() -> Self {
        Self {
            min_px: 6.0,
            max_px: 60.0,
        }
    }
}

impl RadiusRange {
    pub fn new(min_px: f64, max_px: f64) -> Result<Self, BallError> {
        if !(min_px.is_finite() && max_px.is_finite()) || min_px < 2.0 || max_px < min_px {
            return Err(BallError::InvalidParameters(format!(
                "radius range [{min_px}, {max_px}] px"
            )));
        }
        Ok(Self { min_px, max_px })
    }

    /// Expected radius at the ball-to-camera distance, widened by
    /// `tolerance` (0.3 means +/-30 %).
    pub fn from_calibration(
        intrinsics: &IntrinsicProfile,
        pose: &ExtrinsicPose,
        tolerance: f64,
    ) -> Result<Self, BallError> {
        // Ball centre sits one radius above the ground origin.
        let center = pose.world_to_camera(&nalgebra::Vector3::new(0.0, 0.0, BALL_DIAMETER_MM / 2.0));
        let distance_mm = center.norm();
        if distance_mm.is_nan() || distance_mm <= BALL_DIAMETER_MM {
            return Err(BallError::InvalidParameters(format!(
                "ball distance {distance_mm:.1} mm"
            )));
        }
        let focal = 0.5 * (intrinsics.fx + intrinsics.fy);
        let expected = focal * (BALL_DIAMETER_MM / 2.0) / distance_mm;
        let tol = tolerance.clamp(0.05, 0.9);
        Self::new((expected * (1.0 - tol)).max(2.0), expected * (1.0 + tol))
    }

    pub fn contains(&self, r: f64) -> bool {
        r >= self.min_px && r <= self.max_px
    }

    pub fn mid(&self) -> f64 {
        0.5 * (self.min_px + self.max_px)
    }

    /// Candidate radii, geometric steps of `ratio`.
    pub(crate) fn candidate_radii(&self, ratio: f64) -> Vec<f64> {
        let ratio = ratio.max(1.05);
        let mut out = Vec::new();
        let mut r = self.min_px;
        while r < self.max_px {
            out.push(r);
            r *= ratio;
        }
        out.push(self.max_px);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};
    use swingcam_calib::Distortion;

    #[test]
    fn candidate_radii_cover_range() {
        let radii = RadiusRange::new(8.0, 40.0).unwrap().candidate_radii(1.25);
        assert_eq!(radii.first().copied(), Some(8.0));
        assert_eq!(radii.last().copied(), Some(40.0));
        assert!(radii.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn invalid_range_is_rejected() {
        assert!(RadiusRange::new(10.0, 5.0).is_err());
        assert!(RadiusRange::new(1.0, 5.0).is_err());
    }

    #[test]
    fn expected_radius_from_calibration() {
        let intrinsics = IntrinsicProfile {
            fx: 1000.0,
            fy: 1000.0,
            cx: 320.0,
            cy: 240.0,
            distortion: Distortion::default(),
            image_width: 640,
            image_height: 480,
            rms_error_px: 0.2,
            observation_count: 20,
        };
        // Ball centre 1 m plus one diameter along the optical axis.
        let pose = ExtrinsicPose {
            rotation: Matrix3::identity(),
            translation: Vector3::new(0.0, 0.0, 1000.0 + BALL_DIAMETER_MM / 2.0),
            reprojection_error_px: 0.0,
        };
        let range = RadiusRange::from_calibration(&intrinsics, &pose, 0.25).unwrap();
        let expected = 1000.0 * 21.335 / (1000.0 + 2.0 * 21.335);
        assert!((range.mid() - expected).abs() < 0.05 * expected);
        assert!(range.contains(expected));
    }
}
