//! Multi-view planar intrinsic calibration.
//!
//! Closed-form initialization from per-view homographies (Zhang 2000) followed
//! by joint Levenberg-Marquardt refinement of the camera matrix, distortion and
//! every view pose.

use nalgebra::{DMatrix, DVector, Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};
use swingcam_core::{estimate_homography, Homography};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::lm::{levenberg_marquardt, LmOptions};
use crate::pose::RigidPose;
use crate::{CalibrationError, CheckerboardObservation, Distortion, IntrinsicProfile};

/// Which distortion coefficients are estimated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionModel {
    /// Ideal pinhole.
    None,
    /// `k1 k2 p1 p2`.
    RadialTangential,
    /// `k1 k2 p1 p2 k3`.
    #[default]
    Full,
}

impl DistortionModel {
    fn free_count(self) -> usize {
        match self {
            DistortionModel::None => 0,
            DistortionModel::RadialTangential => 4,
            DistortionModel::Full => 5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZhangOptions {
    pub distortion: DistortionModel,
    /// Solutions with a larger RMS reprojection error are rejected.
    pub max_rms_px: f64,
    pub max_iterations: usize,
}

impl Default for ZhangOptions {
    fn default() -> Self {
        Self {
            distortion: DistortionModel::Full,
            max_rms_px: 2.0,
            max_iterations: 100,
        }
    }
}

/// Refined intrinsics plus the pose of every observation.
#[derive(Clone, Debug)]
pub struct IntrinsicSolution {
    pub profile: IntrinsicProfile,
    pub view_poses: Vec<RigidPose>,
    pub per_view_rms_px: Vec<f64>,
}

fn diverged(msg: impl Into<String>) -> CalibrationError {
    CalibrationError::CalibrationDidNotConverge(msg.into())
}

/// Run the full intrinsic solve.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(observations, opts), fields(views = observations.len()))
)]
pub fn calibrate_intrinsics(
    observations: &[CheckerboardObservation],
    opts: &ZhangOptions,
) -> Result<IntrinsicSolution, CalibrationError> {
    let first = observations
        .first()
        .ok_or(CalibrationError::InsufficientObservations { have: 0, need: 3 })?;
    if observations.len() < 3 {
        return Err(CalibrationError::InsufficientObservations {
            have: observations.len(),
            need: 3,
        });
    }
    let (width, height) = (first.image_width, first.image_height);

    let object: Vec<Vec<Point2<f64>>> = observations.iter().map(|o| o.spec.object_points()).collect();

    let homographies = observations
        .iter()
        .zip(&object)
        .enumerate()
        .map(|(k, (obs, obj))| {
            estimate_homography(obj, &obs.image_points)
                .ok_or_else(|| diverged(format!("no homography for view {k}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let k = closed_form_camera_matrix(&homographies, width, height)?;
    log::debug!(
        "closed-form intrinsics fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        k[(0, 0)],
        k[(1, 1)],
        k[(0, 2)],
        k[(1, 2)]
    );

    let k_inv = k
        .try_inverse()
        .ok_or_else(|| diverged("singular camera matrix"))?;
    let initial_poses = homographies
        .iter()
        .map(|h| RigidPose::from_plane_homography(&(k_inv * h.h)))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| diverged("could not decompose view homography"))?;

    let layout = Layout {
        model: opts.distortion,
        views: observations.len(),
    };
    let mut params = layout.pack(&k, &Distortion::default(), &initial_poses);
    let n_points: usize = observations.iter().map(|o| o.image_points.len()).sum();

    let report = levenberg_marquardt(
        &mut params,
        2 * n_points,
        |p, out| layout.residuals(p, observations, &object, out),
        LmOptions {
            max_iterations: opts.max_iterations,
            ..LmOptions::default()
        },
    );

    let rms = (report.cost / n_points.max(1) as f64).sqrt();
    let (fx, fy, cx, cy) = (params[0], params[1], params[2], params[3]);
    log::info!(
        "intrinsic refinement: {} iterations, rms {:.4} px, fx={:.2} fy={:.2}",
        report.iterations,
        rms,
        fx,
        fy
    );

    if ![fx, fy, cx, cy, rms].iter().all(|v| v.is_finite()) || fx <= 0.0 || fy <= 0.0 {
        return Err(diverged("refinement produced an invalid camera matrix"));
    }
    if rms > opts.max_rms_px {
        return Err(diverged(format!(
            "reprojection error {rms:.3} px exceeds {:.3} px",
            opts.max_rms_px
        )));
    }

    let distortion = layout.distortion(&params);
    let view_poses: Vec<RigidPose> = (0..layout.views).map(|v| layout.pose(&params, v)).collect();

    let mut residual = DVector::zeros(2 * n_points);
    layout.residuals(&params, observations, &object, &mut residual);
    let mut offset = 0;
    let per_view_rms_px = observations
        .iter()
        .map(|o| {
            let n = o.image_points.len();
            let ss = residual.rows(offset, 2 * n).norm_squared();
            offset += 2 * n;
            (ss / n.max(1) as f64).sqrt()
        })
        .collect();

    Ok(IntrinsicSolution {
        profile: IntrinsicProfile {
            fx,
            fy,
            cx,
            cy,
            distortion,
            image_width: width,
            image_height: height,
            rms_error_px: rms,
            observation_count: observations.len(),
        },
        view_poses,
        per_view_rms_px,
    })
}

fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> [f64; 6] {
    let hi = h.column(i);
    let hj = h.column(j);
    [
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ]
}

/// Closed-form camera matrix with zero skew.
///
/// Homographies are pre-multiplied by a pixel normalization so the linear
/// system is well conditioned.
fn closed_form_camera_matrix(
    homographies: &[Homography],
    width: usize,
    height: usize,
) -> Result<Matrix3<f64>, CalibrationError> {
    let s = 2.0 / (width + height).max(1) as f64;
    let (c0x, c0y) = (0.5 * width as f64, 0.5 * height as f64);
    let norm = Matrix3::new(s, 0.0, -s * c0x, 0.0, s, -s * c0y, 0.0, 0.0, 1.0);

    let rows = 2 * homographies.len() + 1;
    let mut v = DMatrix::<f64>::zeros(rows, 6);
    for (k, h) in homographies.iter().enumerate() {
        let hn = norm * h.h;
        let hn = hn / hn.norm();
        let v12 = v_ij(&hn, 0, 1);
        let v11 = v_ij(&hn, 0, 0);
        let v22 = v_ij(&hn, 1, 1);
        for c in 0..6 {
            v[(2 * k, c)] = v12[c];
            v[(2 * k + 1, c)] = v11[c] - v22[c];
        }
    }
    // Zero skew: B12 = 0.
    v[(rows - 1, 1)] = 1.0;

    let svd = v.svd(false, true);
    let vt = svd.v_t.ok_or_else(|| diverged("SVD failed"))?;
    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[a].total_cmp(&svd.singular_values[b]));
    let smax = svd.singular_values[order[order.len() - 1]];
    let second = svd.singular_values[order[1]];
    if smax <= 0.0 || second / smax < 1e-7 {
        return Err(diverged(
            "observations do not constrain the camera (poses too similar)",
        ));
    }

    let b = vt.row(order[0]);
    let mut b: [f64; 6] = [b[0], b[1], b[2], b[3], b[4], b[5]];
    if b[0] < 0.0 {
        b.iter_mut().for_each(|x| *x = -*x);
    }
    let [b11, b12, b22, b13, b23, b33] = b;

    let den = b11 * b22 - b12 * b12;
    if den.abs() < 1e-15 || b11.abs() < 1e-15 {
        return Err(diverged("degenerate absolute conic"));
    }
    let v0 = (b12 * b13 - b11 * b23) / den;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    let alpha2 = lambda / b11;
    let beta2 = lambda * b11 / den;
    if alpha2 <= 0.0 || beta2 <= 0.0 {
        return Err(diverged("absolute conic is not positive definite"));
    }
    let alpha = alpha2.sqrt();
    let beta = beta2.sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    Ok(Matrix3::new(
        alpha / s,
        0.0,
        u0 / s + c0x,
        0.0,
        beta / s,
        v0 / s + c0y,
        0.0,
        0.0,
        1.0,
    ))
}

/// Parameter vector layout: `fx fy cx cy [distortion] (rx ry rz tx ty tz)*`.
struct Layout {
    model: DistortionModel,
    views: usize,
}

impl Layout {
    fn intrinsic_len(&self) -> usize {
        4 + self.model.free_count()
    }

    fn pack(&self, k: &Matrix3<f64>, d: &Distortion, poses: &[RigidPose]) -> DVector<f64> {
        let mut p = Vec::with_capacity(self.intrinsic_len() + 6 * self.views);
        p.extend([k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)]]);
        p.extend_from_slice(&d.to_array()[..self.model.free_count()]);
        for pose in poses {
            p.extend(pose.to_params());
        }
        DVector::from_vec(p)
    }

    fn distortion(&self, p: &DVector<f64>) -> Distortion {
        let mut a = [0.0; 5];
        for (i, slot) in a.iter_mut().take(self.model.free_count()).enumerate() {
            *slot = p[4 + i];
        }
        Distortion::from_array(a)
    }

    fn pose(&self, p: &DVector<f64>, view: usize) -> RigidPose {
        let o = self.intrinsic_len() + 6 * view;
        RigidPose::from_params(&[p[o], p[o + 1], p[o + 2], p[o + 3], p[o + 4], p[o + 5]])
    }

    fn residuals(
        &self,
        p: &DVector<f64>,
        observations: &[CheckerboardObservation],
        object: &[Vec<Point2<f64>>],
        out: &mut DVector<f64>,
    ) {
        let (fx, fy, cx, cy) = (p[0], p[1], p[2], p[3]);
        let d = self.distortion(p);
        let mut row = 0;
        for (v, (obs, obj)) in observations.iter().zip(object).enumerate() {
            let pose = self.pose(p, v);
            for (x, uv) in obj.iter().zip(&obs.image_points) {
                let pc = pose.transform(&Vector3::new(x.x, x.y, 0.0));
                let (ru, rv) = if pc.z > 1e-9 {
                    let (xd, yd) = d.distort(pc.x / pc.z, pc.y / pc.z);
                    (fx * xd + cx - uv.x, fy * yd + cy - uv.y)
                } else {
                    (1e6, 1e6)
                };
                out[row] = ru;
                out[row + 1] = rv;
                row += 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{camera as truth, synthetic_observations};

    #[test]
    fn recovers_pinhole_camera() {
        let gt = truth(Distortion::default());
        let obs = synthetic_observations(15, &gt);
        let sol = calibrate_intrinsics(&obs, &ZhangOptions::default()).expect("solve");
        let p = &sol.profile;
        assert!((p.fx - gt.fx).abs() < 0.5, "fx {}", p.fx);
        assert!((p.fy - gt.fy).abs() < 0.5, "fy {}", p.fy);
        assert!((p.cx - gt.cx).abs() < 0.5, "cx {}", p.cx);
        assert!((p.cy - gt.cy).abs() < 0.5, "cy {}", p.cy);
        assert!(p.rms_error_px < 1e-3, "rms {}", p.rms_error_px);
        assert_eq!(sol.view_poses.len(), 15);
    }

    #[test]
    fn recovers_radial_distortion() {
        let gt = truth(Distortion {
            k1: -0.12,
            k2: 0.03,
            ..Default::default()
        });
        let obs = synthetic_observations(18, &gt);
        let opts = ZhangOptions {
            distortion: DistortionModel::RadialTangential,
            ..ZhangOptions::default()
        };
        let sol = calibrate_intrinsics(&obs, &opts).expect("solve");
        assert!(sol.profile.rms_error_px < 0.01, "rms {}", sol.profile.rms_error_px);
        assert!((sol.profile.distortion.k1 + 0.12).abs() < 0.02);
        assert!((sol.profile.fx - gt.fx).abs() < 2.0);
    }

    #[test]
    fn repeated_single_pose_is_degenerate() {
        let gt = truth(Distortion::default());
        let one = synthetic_observations(1, &gt).remove(0);
        let obs = vec![one; 15];
        let err = calibrate_intrinsics(&obs, &ZhangOptions::default()).unwrap_err();
        assert!(matches!(err, CalibrationError::CalibrationDidNotConverge(_)));
    }

    #[test]
    fn closed_form_matches_truth_without_noise() {
        let gt = truth(Distortion::default());
        let obs = synthetic_observations(6, &gt);
        let hs: Vec<Homography> = obs
            .iter()
            .map(|o| estimate_homography(&o.spec.object_points(), &o.image_points).unwrap())
            .collect();
        let k = closed_form_camera_matrix(&hs, 640, 480).unwrap();
        assert!((k[(0, 0)] - gt.fx).abs() < 1.0);
        assert!((k[(1, 2)] - gt.cy).abs() < 1.0);
    }
}
