use serde::{Deserialize, Serialize};

use crate::{BallError, BALL_DIAMETER_MM};

/// Image scale derived from the known ball diameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BallScale {
    pub mean_radius_px: f64,
    pub std_radius_px: f64,
    pub pixels_per_mm: f64,
    pub samples: usize,
}

impl BallScale {
    /// Focal length implied by the ball scale at a known camera distance.
    pub fn focal_length_px(&self, distance_mm: f64) -> f64 {
        self.pixels_per_mm * distance_mm
    }
}

/// Collects ball radii until enough consistent samples are available.
#[derive(Clone, Debug)]
pub struct BallScaleEstimator {
    required: usize,
    max_rel_std: f64,
    radii: Vec<f64>,
}

impl Default for BallScaleEstimator {
    fn default() -> Self {
        Self::new(10, 0.10)
    }
}

impl BallScaleEstimator {
    pub fn new(required: usize, max_rel_std: f64) -> Self {
        Self {
            required: required.max(2),
            max_rel_std,
            radii: Vec::with_capacity(required),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.radii.len()
    }

    pub fn reset(&mut self) {
        self.radii.clear();
    }

    /// Add one radius. Returns the scale once the sample set is complete;
    /// an inconsistent set is cleared and reported.
    pub fn add_sample(&mut self, radius_px: f64) -> Result<Option<BallScale>, BallError> {
        if !(radius_px.is_finite() && radius_px > 0.0) {
            return Err(BallError::InvalidParameters(format!("radius {radius_px}")));
        }
        self.radii.push(radius_px);
        if self.radii.len() < self.required {
            return Ok(None);
        }

        let n = self.radii.len() as f64;
        let mean = self.radii.iter().sum::<f64>() / n;
        let var = self.radii.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        self.radii.clear();

        let rel_std = std / mean;
        if rel_std > self.max_rel_std {
            log::warn!("ball scale rejected: std {:.1}% of mean", 100.0 * rel_std);
            return Err(BallError::InconsistentScale {
                rel_std: 100.0 * rel_std,
            });
        }
        let scale = BallScale {
            mean_radius_px: mean,
            std_radius_px: std,
            pixels_per_mm: 2.0 * mean / BALL_DIAMETER_MM,
            samples: n as usize,
        };
        log::info!(
            "ball scale: r={:.2} px, {:.3} px/mm",
            scale.mean_radius_px,
            scale.pixels_per_mm
        );
        Ok(Some(scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistent_samples_give_scale() {
        let mut est = BallScaleEstimator::default();
        for k in 0..9 {
            assert_eq!(est.add_sample(20.0 + 0.1 * (k % 3) as f64).unwrap(), None);
        }
        let scale = est.add_sample(20.1).unwrap().unwrap();
        assert!((scale.mean_radius_px - 20.1).abs() < 0.1);
        assert!((scale.pixels_per_mm - 2.0 * scale.mean_radius_px / 42.67).abs() < 1e-12);
        assert!((scale.focal_length_px(1000.0) - 1000.0 * scale.pixels_per_mm).abs() < 1e-9);
        assert_eq!(est.sample_count(), 0);
    }

    #[test]
    fn scattered_samples_are_rejected() {
        let mut est = BallScaleEstimator::default();
        for k in 0..9 {
            est.add_sample(if k % 2 == 0 { 10.0 } else { 20.0 }).unwrap();
        }
        assert!(matches!(
            est.add_sample(15.0),
            Err(BallError::InconsistentScale { .. })
        ));
        assert_eq!(est.sample_count(), 0);
    }

    #[test]
    fn rejects_non_positive_radius() {
        let mut est = BallScaleEstimator::default();
        assert!(est.add_sample(0.0).is_err());
        assert!(est.add_sample(f64::NAN).is_err());
        assert_eq!(est.sample_count(), 0);
    }
}
