use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Brown-Conrady coefficients in OpenCV order `k1 k2 p1 p2 k3`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn from_array(a: [f64; 5]) -> Self {
        Self {
            k1: a[0],
            k2: a[1],
            p1: a[2],
            p2: a[3],
            k3: a[4],
        }
    }

    /// Apply distortion to normalized image coordinates.
    #[inline]
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (xd, yd)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, xd: f64, yd: f64) -> (f64, f64) {
        let (mut x, mut y) = (xd, yd);
        for _ in 0..20 {
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
            if radial.abs() < 1e-12 {
                break;
            }
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            let nx = (xd - dx) / radial;
            let ny = (yd - dy) / radial;
            let step = (nx - x).abs() + (ny - y).abs();
            x = nx;
            y = ny;
            if step < 1e-12 {
                break;
            }
        }
        (x, y)
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|&c| c == 0.0)
    }
}

/// Pinhole camera model recovered by intrinsic calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicProfile {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub distortion: Distortion,
    pub image_width: usize,
    pub image_height: usize,
    /// RMS reprojection error over all observations, in pixels.
    pub rms_error_px: f64,
    pub observation_count: usize,
}

impl IntrinsicProfile {
    pub fn camera_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Pixel position of a normalized (undistorted) image coordinate.
    #[inline]
    pub fn pixel_from_normalized(&self, x: f64, y: f64) -> Point2<f64> {
        let (xd, yd) = self.distortion.distort(x, y);
        Point2::new(self.fx * xd + self.cx, self.fy * yd + self.cy)
    }

    /// Normalized (undistorted) image coordinate of a pixel.
    pub fn normalized_from_pixel(&self, p: Point2<f64>) -> Point2<f64> {
        let xd = (p.x - self.cx) / self.fx;
        let yd = (p.y - self.cy) / self.fy;
        let (x, y) = self.distortion.undistort(xd, yd);
        Point2::new(x, y)
    }

    /// Project a camera-frame point; `None` behind the camera.
    pub fn project(&self, p_cam: &Vector3<f64>) -> Option<Point2<f64>> {
        if p_cam.z <= 1e-9 {
            return None;
        }
        Some(self.pixel_from_normalized(p_cam.x / p_cam.z, p_cam.y / p_cam.z))
    }

    /// Undistort a pixel into an ideal pinhole pixel with the same camera matrix.
    pub fn undistort_pixel(&self, p: Point2<f64>) -> Point2<f64> {
        let n = self.normalized_from_pixel(p);
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn profile(distortion: Distortion) -> IntrinsicProfile {
        IntrinsicProfile {
            fx: 800.0,
            fy: 790.0,
            cx: 320.0,
            cy: 240.0,
            distortion,
            image_width: 640,
            image_height: 480,
            rms_error_px: 0.0,
            observation_count: 15,
        }
    }

    #[test]
    fn undistort_inverts_distort() {
        let d = Distortion {
            k1: -0.21,
            k2: 0.05,
            p1: 0.001,
            p2: -0.0007,
            k3: 0.0,
        };
        for (x, y) in [(0.0, 0.0), (0.2, -0.1), (-0.35, 0.25)] {
            let (xd, yd) = d.distort(x, y);
            let (ux, uy) = d.undistort(xd, yd);
            assert_relative_eq!(ux, x, epsilon = 1e-9);
            assert_relative_eq!(uy, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn pixel_normalized_round_trip() {
        let k = profile(Distortion {
            k1: -0.1,
            ..Default::default()
        });
        let p = Point2::new(500.0, 120.0);
        let n = k.normalized_from_pixel(p);
        let back = k.pixel_from_normalized(n.x, n.y);
        assert_relative_eq!(back.x, p.x, epsilon = 1e-6);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-6);
    }

    #[test]
    fn projection_rejects_points_behind_camera() {
        let k = profile(Distortion::default());
        assert!(k.project(&Vector3::new(0.0, 0.0, -1.0)).is_none());
        let p = k.project(&Vector3::new(0.0, 0.0, 5.0)).unwrap();
        assert_relative_eq!(p.x, 320.0);
        assert_relative_eq!(p.y, 240.0);
    }
}
