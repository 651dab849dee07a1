//! Algebraic (Kasa) circle fit.

use nalgebra::{DMatrix, DVector, Point2};

use crate::{BallError, BallModel, BallSource};

pub const MIN_EDGE_POINTS: usize = 3;
/// Most clicked edge points a manual fit takes.
pub const MAX_EDGE_POINTS: usize = 6;

/// Confidence attached to a user-assisted fit.
pub const MANUAL_FIT_CONFIDENCE: f64 = 0.99;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleFit {
    pub center: Point2<f64>,
    pub radius: f64,
    /// RMS of `|p - c| - r` over the input points.
    pub rms_residual_px: f64,
}

/// Least-squares circle through `points`.
///
/// Solves `x^2 + y^2 + D x + E y + F = 0` in centroid-shifted, scaled
/// coordinates. Returns `None` for fewer than three points or when the
/// design matrix is rank deficient (collinear input).
pub fn fit_circle(points: &[Point2<f64>]) -> Option<CircleFit> {
    let n = points.len();
    if n < MIN_EDGE_POINTS {
        return None;
    }
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let mean = Point2::new(sx / n as f64, sy / n as f64);
    let scale = points.iter().map(|p| (p - mean).norm()).sum::<f64>() / n as f64;
    if !scale.is_finite() || scale < 1e-9 {
        return None;
    }

    let mut a = DMatrix::zeros(n, 3);
    let mut b = DVector::zeros(n);
    for (i, p) in points.iter().enumerate() {
        let x = (p.x - mean.x) / scale;
        let y = (p.y - mean.y) / scale;
        a[(i, 0)] = x;
        a[(i, 1)] = y;
        a[(i, 2)] = 1.0;
        b[i] = -(x * x + y * y);
    }

    let svd = a.svd(true, true);
    let s = &svd.singular_values;
    let s_max = s.max();
    if s_max <= 0.0 || s.min() / s_max < 1e-9 {
        return None;
    }
    let sol = svd.solve(&b, 1e-12).ok()?;
    let (d, e, f) = (sol[0], sol[1], sol[2]);
    let cx = -0.5 * d;
    let cy = -0.5 * e;
    let r2 = cx * cx + cy * cy - f;
    if !(r2.is_finite() && r2 > 0.0) {
        return None;
    }

    let center = Point2::new(mean.x + cx * scale, mean.y + cy * scale);
    let radius = r2.sqrt() * scale;
    let rms_residual_px = (points
        .iter()
        .map(|p| {
            let d = (p - center).norm() - radius;
            d * d
        })
        .sum::<f64>()
        / n as f64)
        .sqrt();

    Some(CircleFit {
        center,
        radius,
        rms_residual_px,
    })
}

/// Fit a ball to 3 to 6 user-supplied edge points.
pub fn fit_from_edge_points(
    points: &[Point2<f64>],
    max_fit_residual_px: f64,
) -> Result<BallModel, BallError> {
    if points.len() < MIN_EDGE_POINTS {
        return Err(BallError::TooFewPoints {
            got: points.len(),
            need: MIN_EDGE_POINTS,
        });
    }
    if points.len() > MAX_EDGE_POINTS {
        return Err(BallError::InvalidParameters(format!(
            "{} edge points given, at most {MAX_EDGE_POINTS} accepted",
            points.len()
        )));
    }
    if points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
        return Err(BallError::InvalidParameters("non-finite edge point".into()));
    }
    let fit = fit_circle(points)
        .ok_or_else(|| BallError::DegenerateFit("edge points are collinear".into()))?;
    if fit.rms_residual_px > max_fit_residual_px {
        return Err(BallError::DegenerateFit(format!(
            "fit residual {:.2} px exceeds {:.2} px",
            fit.rms_residual_px, max_fit_residual_px
        )));
    }
    log::info!(
        "manual ball fit: centre ({:.2}, {:.2}) r={:.2} px, residual {:.3} px",
        fit.center.x,
        fit.center.y,
        fit.radius,
        fit.rms_residual_px
    );
    Ok(BallModel {
        center: fit.center,
        radius: fit.radius,
        confidence: MANUAL_FIT_CONFIDENCE,
        source: BallSource::Manual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn on_circle(cx: f64, cy: f64, r: f64, angles_deg: &[f64]) -> Vec<Point2<f64>> {
        angles_deg
            .iter()
            .map(|a| {
                let t = a.to_radians();
                Point2::new(cx + r * t.cos(), cy + r * t.sin())
            })
            .collect()
    }

    #[test]
    fn recovers_exact_circle() {
        for pts in [
            on_circle(312.4, 207.9, 17.25, &[0.0, 120.0, 240.0]),
            on_circle(312.4, 207.9, 17.25, &[10.0, 70.0, 150.0, 200.0, 290.0, 330.0]),
            // Short arc.
            on_circle(312.4, 207.9, 17.25, &[0.0, 25.0, 50.0, 75.0]),
        ] {
            let ball = fit_from_edge_points(&pts, 1.0).unwrap();
            assert_abs_diff_eq!(ball.center.x, 312.4, epsilon = 1e-7);
            assert_abs_diff_eq!(ball.center.y, 207.9, epsilon = 1e-7);
            assert_abs_diff_eq!(ball.radius, 17.25, epsilon = 1e-7);
            assert_eq!(ball.confidence, MANUAL_FIT_CONFIDENCE);
            assert_eq!(ball.source, BallSource::Manual);
        }
    }

    #[test]
    fn too_few_points() {
        let pts = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)];
        assert_eq!(
            fit_from_edge_points(&pts, 1.0),
            Err(BallError::TooFewPoints { got: 2, need: 3 })
        );
        assert!(matches!(
            fit_from_edge_points(&[], 1.0),
            Err(BallError::TooFewPoints { got: 0, .. })
        ));
    }

    #[test]
    fn more_than_six_points_are_rejected() {
        let pts = on_circle(100.0, 100.0, 20.0, &[0.0, 50.0, 100.0, 150.0, 200.0, 250.0, 300.0]);
        assert!(matches!(
            fit_from_edge_points(&pts, 1.0),
            Err(BallError::InvalidParameters(_))
        ));
        assert!(fit_from_edge_points(&pts[..MAX_EDGE_POINTS], 1.0).is_ok());
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let pts: Vec<_> = (0..5).map(|i| Point2::new(i as f64, 2.0 * i as f64 + 1.0)).collect();
        assert!(matches!(
            fit_from_edge_points(&pts, 1.0),
            Err(BallError::DegenerateFit(_))
        ));
    }

    #[test]
    fn scattered_points_exceed_residual() {
        let mut pts = on_circle(100.0, 100.0, 20.0, &[0.0, 60.0, 120.0, 180.0, 240.0, 300.0]);
        pts[1].x += 6.0;
        pts[4].y -= 7.0;
        assert!(matches!(
            fit_from_edge_points(&pts, 0.5),
            Err(BallError::DegenerateFit(_))
        ));
        assert!(fit_from_edge_points(&pts, 10.0).is_ok());
    }
}
