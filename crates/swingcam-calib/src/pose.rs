//! Ground-plane pose from four coplanar correspondences.

use nalgebra::{DVector, Matrix3, Point2, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use swingcam_core::{has_collinear_triple, has_near_duplicates, homography_from_4pt, Homography};

use crate::lm::{levenberg_marquardt, LmOptions};
use crate::{CalibrationError, IntrinsicProfile};

/// Rigid transform world -> camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidPose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl RigidPose {
    #[inline]
    pub fn transform(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Rodrigues vector followed by translation.
    pub fn to_params(&self) -> [f64; 6] {
        let r = self.rotation.scaled_axis();
        let t = self.translation;
        [r.x, r.y, r.z, t.x, t.y, t.z]
    }

    pub fn from_params(p: &[f64; 6]) -> Self {
        Self {
            rotation: Rotation3::from_scaled_axis(Vector3::new(p[0], p[1], p[2])),
            translation: Vector3::new(p[3], p[4], p[5]),
        }
    }

    /// Decompose `[r1 r2 t] ~ M` where `M = K^-1 H` maps the plane `z = 0`
    /// into normalized camera coordinates. The plane is placed in front of the
    /// camera and the rotation re-orthonormalized.
    pub fn from_plane_homography(m: &Matrix3<f64>) -> Option<Self> {
        let h1 = m.column(0).into_owned();
        let h2 = m.column(1).into_owned();
        let h3 = m.column(2).into_owned();

        let n1 = h1.norm();
        let n2 = h2.norm();
        if n1 < 1e-12 || n2 < 1e-12 {
            return None;
        }
        let mut lambda = 2.0 / (n1 + n2);
        if (h3 * lambda).z < 0.0 {
            lambda = -lambda;
        }

        let r1 = h1 * lambda;
        let r2 = h2 * lambda;
        let r3 = r1.cross(&r2);
        let t = h3 * lambda;

        let approx = Matrix3::from_columns(&[r1, r2, r3]);
        let svd = approx.svd(true, true);
        let u = svd.u?;
        let v_t = svd.v_t?;
        let mut r = u * v_t;
        if r.determinant() < 0.0 {
            let mut u_fixed = u;
            u_fixed.column_mut(2).neg_mut();
            r = u_fixed * v_t;
        }
        if !r.iter().chain(t.iter()).all(|v| v.is_finite()) {
            return None;
        }

        Some(Self {
            rotation: Rotation3::from_matrix_unchecked(r),
            translation: t,
        })
    }
}

/// Camera pose relative to the ground plane (world millimetres, ball at the
/// origin, `z = 0` on the ground).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicPose {
    /// World -> camera rotation.
    pub rotation: Matrix3<f64>,
    /// World origin in camera coordinates, millimetres.
    pub translation: Vector3<f64>,
    pub reprojection_error_px: f64,
}

impl ExtrinsicPose {
    pub fn rigid(&self) -> RigidPose {
        RigidPose {
            rotation: Rotation3::from_matrix_unchecked(self.rotation),
            translation: self.translation,
        }
    }

    pub fn world_to_camera(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Vertical offset of the camera from the ball, metres.
    pub fn camera_height_m(&self) -> f64 {
        self.translation.y.abs() / 1000.0
    }

    /// Forward distance from the camera to the ball, metres.
    pub fn camera_distance_m(&self) -> f64 {
        self.translation.z.abs() / 1000.0
    }

    /// Tilt from `atan2(R20, R22)`, folded so a flipped solution reads as a
    /// small angle.
    pub fn camera_tilt_deg(&self) -> f64 {
        let tilt = self.rotation[(2, 0)].atan2(self.rotation[(2, 2)]).to_degrees();
        if tilt > 90.0 {
            tilt - 180.0
        } else {
            tilt
        }
    }

    /// Camera centre in world coordinates.
    pub fn camera_center_world(&self) -> Vector3<f64> {
        -(self.rotation.transpose() * self.translation)
    }

    /// Homography mapping ground-plane millimetres to normalized camera coordinates.
    pub fn ground_homography(&self) -> Homography {
        let r = &self.rotation;
        Homography::new(Matrix3::from_columns(&[
            r.column(0).into_owned(),
            r.column(1).into_owned(),
            self.translation,
        ]))
    }

    /// Project a ground-plane point (mm) to pixels.
    pub fn world_to_pixel(&self, intrinsics: &IntrinsicProfile, world: Point2<f64>) -> Option<Point2<f64>> {
        intrinsics.project(&self.world_to_camera(&Vector3::new(world.x, world.y, 0.0)))
    }

    /// Intersect the pixel's viewing ray with the ground plane (mm).
    pub fn pixel_to_world(&self, intrinsics: &IntrinsicProfile, pixel: Point2<f64>) -> Option<Point2<f64>> {
        let n = intrinsics.normalized_from_pixel(pixel);
        self.ground_homography().inverse()?.apply(n)
    }
}

/// Pose plus the correspondences it was solved from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicCalibration {
    pub pose: ExtrinsicPose,
    pub image_points: [Point2<f64>; 4],
    pub world_points: [Point2<f64>; 4],
}

const MIN_PIXEL_SEPARATION: f64 = 1.0;
const MIN_WORLD_SEPARATION_MM: f64 = 1.0;
const COLLINEAR_REL_TOL: f64 = 1e-3;

/// Reject duplicated or collinear correspondences.
pub fn validate_correspondences(
    image_points: &[Point2<f64>; 4],
    world_points: &[Point2<f64>; 4],
) -> Result<(), CalibrationError> {
    let finite = image_points
        .iter()
        .chain(world_points)
        .all(|p| p.x.is_finite() && p.y.is_finite());
    if !finite {
        return Err(CalibrationError::DegenerateCorrespondence(
            "non-finite coordinates".into(),
        ));
    }
    if has_near_duplicates(image_points, MIN_PIXEL_SEPARATION) {
        return Err(CalibrationError::DegenerateCorrespondence(
            "duplicated image points".into(),
        ));
    }
    if has_near_duplicates(world_points, MIN_WORLD_SEPARATION_MM) {
        return Err(CalibrationError::DegenerateCorrespondence(
            "duplicated world points".into(),
        ));
    }
    if has_collinear_triple(image_points, COLLINEAR_REL_TOL) {
        return Err(CalibrationError::DegenerateCorrespondence(
            "collinear image points".into(),
        ));
    }
    if has_collinear_triple(world_points, COLLINEAR_REL_TOL) {
        return Err(CalibrationError::DegenerateCorrespondence(
            "collinear world points".into(),
        ));
    }
    Ok(())
}

/// Planar PnP: homography initialization then reprojection refinement.
pub fn solve_planar_pose(
    intrinsics: &IntrinsicProfile,
    image_points: &[Point2<f64>; 4],
    world_points: &[Point2<f64>; 4],
) -> Result<ExtrinsicPose, CalibrationError> {
    validate_correspondences(image_points, world_points)?;

    let normalized = image_points.map(|p| intrinsics.normalized_from_pixel(p));
    let h = homography_from_4pt(world_points, &normalized).ok_or_else(|| {
        CalibrationError::DegenerateCorrespondence("no plane homography".into())
    })?;
    let initial = RigidPose::from_plane_homography(&h.h).ok_or_else(|| {
        CalibrationError::DegenerateCorrespondence("homography does not decompose".into())
    })?;

    let mut params = DVector::from_row_slice(&initial.to_params());
    let residuals = |p: &DVector<f64>, out: &mut DVector<f64>| {
        let pose = RigidPose::from_params(&[p[0], p[1], p[2], p[3], p[4], p[5]]);
        for (k, (w, uv)) in world_points.iter().zip(image_points).enumerate() {
            let pc = pose.transform(&Vector3::new(w.x, w.y, 0.0));
            let (ru, rv) = match intrinsics.project(&pc) {
                Some(q) => (q.x - uv.x, q.y - uv.y),
                None => (1e6, 1e6),
            };
            out[2 * k] = ru;
            out[2 * k + 1] = rv;
        }
    };
    let report = levenberg_marquardt(&mut params, 8, residuals, LmOptions::default());
    let rms = (report.cost / 4.0).sqrt();

    let pose = RigidPose::from_params(&[
        params[0], params[1], params[2], params[3], params[4], params[5],
    ]);
    if !rms.is_finite() || pose.translation.z <= 0.0 {
        return Err(CalibrationError::DegenerateCorrespondence(
            "pose refinement diverged".into(),
        ));
    }
    log::info!(
        "extrinsic pose t=({:.1}, {:.1}, {:.1}) mm, rms {:.3} px",
        pose.translation.x,
        pose.translation.y,
        pose.translation.z,
        rms
    );

    Ok(ExtrinsicPose {
        rotation: *pose.rotation.matrix(),
        translation: pose.translation,
        reprojection_error_px: rms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::camera;
    use crate::Distortion;
    use approx::assert_relative_eq;

    fn zone_world() -> [Point2<f64>; 4] {
        [
            Point2::new(-152.4, -152.4),
            Point2::new(152.4, -152.4),
            Point2::new(152.4, 152.4),
            Point2::new(-152.4, 152.4),
        ]
    }

    fn ground_truth_pose() -> RigidPose {
        // Camera ~1.2 m away, looking down at about 30 degrees.
        let rotation = Rotation3::from_euler_angles(2.09, 0.05, 0.02);
        let camera_center = Vector3::new(40.0, -1050.0, 600.0);
        RigidPose {
            rotation,
            translation: -(rotation * camera_center),
        }
    }

    #[test]
    fn recovers_known_pose() {
        let k = camera(Distortion {
            k1: -0.05,
            ..Default::default()
        });
        let truth = ground_truth_pose();
        let world = zone_world();
        let image = world.map(|w| k.project(&truth.transform(&Vector3::new(w.x, w.y, 0.0))).unwrap());

        let pose = solve_planar_pose(&k, &image, &world).expect("pose");
        assert!(pose.reprojection_error_px < 1e-6);
        assert_relative_eq!(pose.translation, truth.translation, epsilon = 1e-3);
        assert_relative_eq!(pose.rotation, *truth.rotation.matrix(), epsilon = 1e-6);

        let back = pose.pixel_to_world(&k, image[2]).unwrap();
        assert_relative_eq!(back.x, world[2].x, epsilon = 1e-4);
        assert_relative_eq!(back.y, world[2].y, epsilon = 1e-4);
        let px = pose.world_to_pixel(&k, Point2::new(0.0, 0.0)).unwrap();
        let origin = k.project(&truth.translation).unwrap();
        assert_relative_eq!(px.x, origin.x, epsilon = 1e-6);
    }

    #[test]
    fn collinear_image_points_are_degenerate() {
        let k = camera(Distortion::default());
        let image = [
            Point2::new(10.0, 10.0),
            Point2::new(20.0, 20.0),
            Point2::new(30.0, 30.0),
            Point2::new(40.0, 40.0),
        ];
        let err = solve_planar_pose(&k, &image, &zone_world()).unwrap_err();
        assert!(matches!(err, CalibrationError::DegenerateCorrespondence(_)));
    }

    #[test]
    fn duplicated_points_are_degenerate() {
        let k = camera(Distortion::default());
        let image = [
            Point2::new(100.0, 100.0),
            Point2::new(300.0, 100.0),
            Point2::new(100.0, 100.4),
            Point2::new(100.0, 300.0),
        ];
        assert!(matches!(
            solve_planar_pose(&k, &image, &zone_world()),
            Err(CalibrationError::DegenerateCorrespondence(_))
        ));
    }

    #[test]
    fn derived_camera_values() {
        let pose = ExtrinsicPose {
            rotation: Matrix3::identity(),
            translation: Vector3::new(0.0, -1200.0, 2500.0),
            reprojection_error_px: 0.0,
        };
        assert_relative_eq!(pose.camera_height_m(), 1.2);
        assert_relative_eq!(pose.camera_distance_m(), 2.5);
        assert_relative_eq!(pose.camera_tilt_deg(), 0.0);
    }

    #[test]
    fn plane_homography_round_trips_params() {
        let truth = ground_truth_pose();
        let p = truth.to_params();
        let back = RigidPose::from_params(&p);
        assert_relative_eq!(back.translation, truth.translation, epsilon = 1e-9);
        assert_relative_eq!(*back.rotation.matrix(), *truth.rotation.matrix(), epsilon = 1e-9);
    }
}
