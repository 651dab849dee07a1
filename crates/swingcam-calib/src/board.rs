//! Checkerboard geometry.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::CalibrationError;

pub const CORNER_COUNT_RANGE: std::ops::RangeInclusive<u32> = 3..=20;
pub const SQUARE_SIZE_RANGE_MM: std::ops::RangeInclusive<f64> = 10.0..=100.0;

/// Interior-corner checkerboard layout.
///
/// `corners_wide`/`corners_high` count **inner** corners, not squares.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckerboardSpec {
    pub corners_wide: u32,
    pub corners_high: u32,
    pub square_size_mm: f64,
}

impl CheckerboardSpec {
    /// Validate and build a spec.
    pub fn new(
        corners_wide: u32,
        corners_high: u32,
        square_size_mm: f64,
    ) -> Result<Self, CalibrationError> {
        if !CORNER_COUNT_RANGE.contains(&corners_wide) || !CORNER_COUNT_RANGE.contains(&corners_high)
        {
            return Err(CalibrationError::InvalidParameters(format!(
                "corner counts must be in [3, 20], got {corners_wide}x{corners_high}"
            )));
        }
        if !square_size_mm.is_finite() || !SQUARE_SIZE_RANGE_MM.contains(&square_size_mm) {
            return Err(CalibrationError::InvalidParameters(format!(
                "square size must be in [10, 100] mm, got {square_size_mm}"
            )));
        }
        Ok(Self {
            corners_wide,
            corners_high,
            square_size_mm,
        })
    }

    #[inline]
    pub fn corner_count(&self) -> usize {
        (self.corners_wide * self.corners_high) as usize
    }

    /// Board-plane corner positions in millimetres, row-major.
    pub fn object_points(&self) -> Vec<Point2<f64>> {
        let s = self.square_size_mm;
        (0..self.corners_high)
            .flat_map(|r| (0..self.corners_wide).map(move |c| Point2::new(c as f64 * s, r as f64 * s)))
            .collect()
    }
}

/// One accepted checkerboard view: image corners in the same row-major order
/// as [`CheckerboardSpec::object_points`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckerboardObservation {
    pub spec: CheckerboardSpec,
    pub image_points: Vec<Point2<f64>>,
    pub image_width: usize,
    pub image_height: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_parameters() {
        assert!(CheckerboardSpec::new(2, 6, 25.0).is_err());
        assert!(CheckerboardSpec::new(9, 21, 25.0).is_err());
        assert!(CheckerboardSpec::new(9, 6, 9.9).is_err());
        assert!(CheckerboardSpec::new(9, 6, 100.5).is_err());
        assert!(CheckerboardSpec::new(9, 6, f64::NAN).is_err());
        assert!(CheckerboardSpec::new(3, 20, 10.0).is_ok());
    }

    #[test]
    fn object_points_are_row_major() {
        let spec = CheckerboardSpec::new(4, 3, 20.0).unwrap();
        let pts = spec.object_points();
        assert_eq!(pts.len(), 12);
        assert_eq!(pts[1], Point2::new(20.0, 0.0));
        assert_eq!(pts[4], Point2::new(0.0, 20.0));
        assert_eq!(pts[11], Point2::new(60.0, 40.0));
    }
}
