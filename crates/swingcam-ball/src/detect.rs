//! Automatic ball search.
//!
//! Three stages:
//! 1. Centre-versus-surround box contrast on an integral image, on a coarse
//!    grid for each candidate radius, followed by non-maximum suppression.
//! 2. Disk-versus-ring contrast sampled with a unit-circle LUT around each
//!    coarse peak to refine the centre.
//! 3. Radial edge search along fixed rays with sub-pixel peak interpolation,
//!    then a circle fit over the edge points. The fit is repeated once around
//!    the new centre with outliers removed.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use swingcam_core::{sample_bilinear_clamped, GrayImageView, IntegralImage};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::circle_fit::fit_circle;
use crate::{BallError, BallModel, BallSource, RadiusRange};

/// Whether the ball is brighter or darker than its surroundings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BallPolarity {
    #[default]
    Bright,
    Dark,
}

impl BallPolarity {
    #[inline]
    fn sign(self) -> f32 {
        match self {
            BallPolarity::Bright => 1.0,
            BallPolarity::Dark => -1.0,
        }
    }
}

/// Axis-aligned search window in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Roi {
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Square window of half-size `half` around `center`, clipped to the
    /// raster. `None` when nothing remains.
    pub fn around(center: Point2<f64>, half: f64, width: usize, height: usize) -> Option<Self> {
        let x0 = (center.x - half).floor().max(0.0) as usize;
        let y0 = (center.y - half).floor().max(0.0) as usize;
        let x1 = ((center.x + half).ceil().max(0.0) as usize).min(width);
        let y1 = ((center.y + half).ceil().max(0.0) as usize).min(height);
        (x1 > x0 && y1 > y0).then_some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    pub fn clip(&self, width: usize, height: usize) -> Option<Self> {
        let x1 = (self.x + self.width).min(width);
        let y1 = (self.y + self.height).min(height);
        (x1 > self.x && y1 > self.y).then_some(Self {
            x: self.x,
            y: self.y,
            width: x1 - self.x,
            height: y1 - self.y,
        })
    }

    pub fn contains(&self, p: Point2<f64>) -> bool {
        p.x >= self.x as f64
            && p.y >= self.y as f64
            && p.x < (self.x + self.width) as f64
            && p.y < (self.y + self.height) as f64
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BallDetectParams {
    pub radius_range: RadiusRange,
    pub polarity: BallPolarity,
    /// Minimum disk/surround contrast on the 0..255 scale.
    pub min_contrast: f32,
    /// Detections below this confidence are reported as `NoBallFound`.
    pub min_confidence: f64,
    /// Coarse peaks kept for refinement.
    pub max_candidates: usize,
    /// Ratio between consecutive candidate radii.
    pub radius_step_ratio: f64,
    /// Rays for the radial edge search.
    pub rays: usize,
    /// Samples on the disk and ring circles in stage 2.
    pub ring_samples: usize,
    pub max_fit_residual_px: f64,
}

impl Default for BallDetectParams {
    fn default() -> Self {
        Self {
            radius_range: RadiusRange::default(),
            polarity: BallPolarity::Bright,
            min_contrast: 15.0,
            min_confidence: 0.5,
            max_candidates: 6,
            radius_step_ratio: 1.3,
            rays: 32,
            ring_samples: 48,
            max_fit_residual_px: 1.5,
        }
    }
}

/// Refined detection before it is accepted as a [`BallModel`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BallCandidate {
    pub center: Point2<f64>,
    pub radius: f64,
    /// Disk minus ring mean, polarity-corrected.
    pub contrast: f32,
    /// Mean disk intensity.
    pub brightness: f32,
    /// Fraction of rays whose edge agrees with the fitted circle.
    pub ray_agreement: f64,
    pub confidence: f64,
}

impl BallCandidate {
    pub fn to_model(&self, source: BallSource) -> BallModel {
        BallModel {
            center: self.center,
            radius: self.radius,
            confidence: self.confidence,
            source,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct CoarsePeak {
    x: f64,
    y: f64,
    radius: f64,
    score: f32,
}

pub struct BallDetector {
    params: BallDetectParams,
    ring_dirs: Vec<(f32, f32)>,
    ray_dirs: Vec<(f32, f32)>,
}

impl BallDetector {
    pub fn new(params: BallDetectParams) -> Result<Self, BallError> {
        if params.rays < 8 {
            return Err(BallError::InvalidParameters(format!(
                "at least 8 rays required, got {}",
                params.rays
            )));
        }
        let ring_dirs = build_unit_circle_lut(params.ring_samples).ok_or_else(|| {
            BallError::InvalidParameters("ring_samples must be positive".into())
        })?;
        let ray_dirs = build_unit_circle_lut(params.rays)
            .ok_or_else(|| BallError::InvalidParameters("rays must be positive".into()))?;
        Ok(Self {
            params,
            ring_dirs,
            ray_dirs,
        })
    }

    pub fn params(&self) -> &BallDetectParams {
        &self.params
    }

    pub fn set_radius_range(&mut self, range: RadiusRange) {
        self.params.radius_range = range;
    }

    /// Best detection inside `roi` (full frame when `None`).
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, img)))]
    pub fn detect(&self, img: &GrayImageView<'_>, roi: Option<Roi>) -> Result<BallModel, BallError> {
        let best = self
            .candidates(img, roi)
            .into_iter()
            .find(|c| c.confidence >= self.params.min_confidence)
            .ok_or(BallError::NoBallFound)?;
        log::debug!(
            "ball at ({:.2}, {:.2}) r={:.2} conf={:.2}",
            best.center.x,
            best.center.y,
            best.radius,
            best.confidence
        );
        Ok(best.to_model(BallSource::Automatic))
    }

    /// All refined candidates, best confidence first.
    pub fn candidates(&self, img: &GrayImageView<'_>, roi: Option<Roi>) -> Vec<BallCandidate> {
        let roi = match roi.unwrap_or(Roi::full(img.width, img.height)).clip(img.width, img.height) {
            Some(roi) => roi,
            None => return Vec::new(),
        };
        let integral = IntegralImage::new(img);
        let peaks = self.coarse_peaks(&integral, &roi);

        let mut out: Vec<BallCandidate> = Vec::new();
        for peak in peaks {
            let Some(cand) = self.refine(img, &peak) else {
                continue;
            };
            if !roi.contains(cand.center) {
                continue;
            }
            let duplicate = out
                .iter()
                .any(|c| (c.center - cand.center).norm() < 0.5 * c.radius.max(cand.radius));
            if !duplicate {
                out.push(cand);
            }
        }
        out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        out
    }

    fn coarse_peaks(&self, integral: &IntegralImage, roi: &Roi) -> Vec<CoarsePeak> {
        let sign = self.params.polarity.sign();
        let mut peaks = Vec::new();

        for radius in self.params.radius_range.candidate_radii(self.params.radius_step_ratio) {
            let step = (radius * 0.5).max(2.0) as usize;
            let inner = (radius * 0.6).max(1.0) as i64;
            let mid = (radius * 1.15).ceil() as i64;
            let outer = (radius * 1.6).ceil() as i64;

            for cy in (roi.y..roi.y + roi.height).step_by(step) {
                for cx in (roi.x..roi.x + roi.width).step_by(step) {
                    let (x, y) = (cx as i64, cy as i64);
                    let Some(center) = integral.box_mean(x - inner, y - inner, x + inner + 1, y + inner + 1)
                    else {
                        continue;
                    };
                    let (s_out, n_out) =
                        integral.box_sum(x - outer, y - outer, x + outer + 1, y + outer + 1);
                    let (s_mid, n_mid) = integral.box_sum(x - mid, y - mid, x + mid + 1, y + mid + 1);
                    if n_out <= n_mid {
                        continue;
                    }
                    let surround = (s_out - s_mid) as f32 / (n_out - n_mid) as f32;
                    let score = sign * (center - surround);
                    if score >= self.params.min_contrast {
                        peaks.push(CoarsePeak {
                            x: cx as f64,
                            y: cy as f64,
                            radius,
                            score,
                        });
                    }
                }
            }
        }

        peaks.sort_by(|a, b| b.score.total_cmp(&a.score));
        let mut kept: Vec<CoarsePeak> = Vec::new();
        for p in peaks {
            let suppressed = kept.iter().any(|k| {
                let d = ((k.x - p.x).powi(2) + (k.y - p.y).powi(2)).sqrt();
                d < k.radius.max(p.radius)
            });
            if !suppressed {
                kept.push(p);
                if kept.len() >= self.params.max_candidates {
                    break;
                }
            }
        }
        kept
    }

    fn refine(&self, img: &GrayImageView<'_>, peak: &CoarsePeak) -> Option<BallCandidate> {
        let sign = self.params.polarity.sign();
        let r = peak.radius as f32;
        let radii = SampleRadii {
            rad_disk: 0.65 * r,
            r0: 1.3 * r,
            r1: 1.6 * r,
        };

        // Stage 2: disk/ring centre search over the coarse cell.
        let reach = (0.5 * peak.radius).max(2.0);
        let delta = (reach / 4.0).max(1.0);
        let steps = (reach / delta).round() as i32;
        let mut best: Option<(Point2<f32>, f32, f32)> = None;
        for dy in -steps..=steps {
            for dx in -steps..=steps {
                let c = Point2::new(
                    (peak.x + dx as f64 * delta) as f32,
                    (peak.y + dy as f64 * delta) as f32,
                );
                let (disk, ring) = sample_disk_and_ring(img, c, &radii, &self.ring_dirs)?;
                let contrast = sign * (disk - ring);
                if best.map(|b| contrast > b.1).unwrap_or(true) {
                    best = Some((c, contrast, disk));
                }
            }
        }
        let (c0, contrast, brightness) = best?;
        if contrast < self.params.min_contrast {
            return None;
        }

        // Stage 3: radial edges, fit, re-centre, fit again.
        let need = self.ray_dirs.len() / 2;
        let edges = self.radial_edges(img, Point2::new(c0.x as f64, c0.y as f64), peak.radius, contrast);
        if edges.len() < need {
            return None;
        }
        let first = fit_circle(&edges)?;

        let mut edges = self.radial_edges(img, first.center, first.radius, contrast);
        let tol = edge_tolerance(first.radius);
        edges.retain(|p| ((p - first.center).norm() - first.radius).abs() < 3.0 * tol);
        if edges.len() < need {
            return None;
        }
        let second = fit_circle(&edges)?;
        if second.rms_residual_px > self.params.max_fit_residual_px {
            return None;
        }
        let (center, radius) = (second.center, second.radius);

        let range = self.params.radius_range;
        if radius < 0.8 * range.min_px || radius > 1.25 * range.max_px {
            return None;
        }

        let tol = edge_tolerance(radius);
        let agreeing = edges
            .iter()
            .filter(|p| ((*p - center).norm() - radius).abs() <= tol)
            .count();
        let ray_agreement = agreeing as f64 / self.ray_dirs.len() as f64;
        let contrast_term = (contrast as f64 / (4.0 * self.params.min_contrast as f64)).min(1.0);
        let confidence = (0.4 * contrast_term + 0.6 * ray_agreement).clamp(0.0, 1.0);

        Some(BallCandidate {
            center,
            radius,
            contrast,
            brightness,
            ray_agreement,
            confidence,
        })
    }

    /// Strongest polarity-matching edge on each ray between 0.5r and 1.6r.
    fn radial_edges(
        &self,
        img: &GrayImageView<'_>,
        center: Point2<f64>,
        radius: f64,
        contrast: f32,
    ) -> Vec<Point2<f64>> {
        const R_STEP: f32 = 0.5;
        let sign = self.params.polarity.sign();
        let r_start = (0.5 * radius) as f32;
        let r_end = (1.6 * radius) as f32;
        let n = (((r_end - r_start) / R_STEP).ceil() as usize).max(5);
        let min_strength = 0.15 * contrast.max(self.params.min_contrast);

        let (cx, cy) = (center.x as f32, center.y as f32);
        let mut profile = vec![0.0f32; n];
        let mut deriv = vec![0.0f32; n];
        let mut out = Vec::with_capacity(self.ray_dirs.len());

        for &(ux, uy) in &self.ray_dirs {
            for (k, v) in profile.iter_mut().enumerate() {
                let r = r_start + k as f32 * R_STEP;
                *v = sample_bilinear_clamped(img, cx + r * ux, cy + r * uy);
            }
            radial_derivative_into(&profile, R_STEP, &mut deriv);

            // Bright ball: intensity falls moving outwards.
            let (idx, strength) = deriv
                .iter()
                .enumerate()
                .map(|(i, d)| (i, -sign * d))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
            if strength < min_strength || idx == 0 || idx + 1 >= n {
                continue;
            }
            let score = |i: usize| -sign * deriv[i];
            let (a, b, c) = (score(idx - 1), score(idx), score(idx + 1));
            let denom = a - 2.0 * b + c;
            let offset = if denom.abs() > 1e-6 {
                (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
            } else {
                0.0
            };
            let r = r_start + (idx as f32 + offset) * R_STEP;
            out.push(Point2::new((cx + r * ux) as f64, (cy + r * uy) as f64));
        }
        out
    }
}

#[inline]
fn edge_tolerance(radius: f64) -> f64 {
    (0.08 * radius).max(1.0)
}

fn build_unit_circle_lut(samples: usize) -> Option<Vec<(f32, f32)>> {
    if samples == 0 {
        return None;
    }
    let step = std::f32::consts::TAU / samples as f32;
    Some(
        (0..samples)
            .map(|k| {
                let (sin_t, cos_t) = (k as f32 * step).sin_cos();
                (cos_t, sin_t)
            })
            .collect(),
    )
}

#[derive(Clone, Copy)]
struct SampleRadii {
    rad_disk: f32,
    r0: f32,
    r1: f32,
}

/// Disk and ring means from a shared unit-circle LUT.
fn sample_disk_and_ring(
    img: &GrayImageView<'_>,
    center: Point2<f32>,
    radii: &SampleRadii,
    dirs: &[(f32, f32)],
) -> Option<(f32, f32)> {
    if dirs.is_empty() {
        return None;
    }
    let mut sum_disk = 0.0f32;
    let mut sum_ring = 0.0f32;
    for &(ux, uy) in dirs {
        // Half-radius disk samples cover the interior, not just one circle.
        sum_disk += sample_bilinear_clamped(img, center.x + radii.rad_disk * ux, center.y + radii.rad_disk * uy);
        sum_disk += sample_bilinear_clamped(
            img,
            center.x + 0.5 * radii.rad_disk * ux,
            center.y + 0.5 * radii.rad_disk * uy,
        );
        sum_ring += sample_bilinear_clamped(img, center.x + radii.r0 * ux, center.y + radii.r0 * uy);
        sum_ring += sample_bilinear_clamped(img, center.x + radii.r1 * ux, center.y + radii.r1 * uy);
    }
    let n = 2.0 * dirs.len() as f32;
    Some((sum_disk / n, sum_ring / n))
}

/// Central differences, one-sided at the ends.
fn radial_derivative_into(values: &[f32], step: f32, out: &mut [f32]) {
    let n = values.len();
    if n < 2 {
        out.iter_mut().for_each(|d| *d = 0.0);
        return;
    }
    out[0] = (values[1] - values[0]) / step;
    for i in 1..n - 1 {
        out[i] = (values[i + 1] - values[i - 1]) / (2.0 * step);
    }
    out[n - 1] = (values[n - 1] - values[n - 2]) / step;
}
