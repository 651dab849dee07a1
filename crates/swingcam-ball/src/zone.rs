//! Image-space ball placement zone.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use swingcam_calib::ExtrinsicCalibration;
use swingcam_core::{centroid, homography_from_4pt, is_simple_quad, point_in_polygon, polygon_area, Homography};

use crate::ZoneError;

/// Side of the standard hitting square (12 inches).
pub const ZONE_SIDE_MM: f64 = 304.8;

/// World corners of the standard square, FL, FR, BR, BL. Ball at the origin,
/// x to the right, y down-range.
pub fn standard_zone_world() -> [Point2<f64>; 4] {
    let h = ZONE_SIDE_MM / 2.0;
    [
        Point2::new(-h, -h),
        Point2::new(h, -h),
        Point2::new(h, h),
        Point2::new(-h, h),
    ]
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSource {
    Markers,
    #[default]
    Manual,
}

/// Accepted zone. Corners are FL, FR, BR, BL in pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneQuad {
    pub corners: [Point2<f64>; 4],
    pub world: [Point2<f64>; 4],
    pub source: ZoneSource,
    /// Pixels to ground millimetres.
    pub image_to_world: Homography,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneMapper {
    pub min_area_px2: f64,
    quad: Option<ZoneQuad>,
}

impl Default for ZoneMapper {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl ZoneMapper {
    pub fn new(min_area_px2: f64) -> Self {
        Self {
            min_area_px2,
            quad: None,
        }
    }

    pub fn quad(&self) -> Option<&ZoneQuad> {
        self.quad.as_ref()
    }

    pub fn is_defined(&self) -> bool {
        self.quad.is_some()
    }

    pub fn clear(&mut self) {
        self.quad = None;
    }

    /// Zone from the extrinsic marker points and their world positions.
    pub fn from_markers(
        &mut self,
        corners: [Point2<f64>; 4],
        world: [Point2<f64>; 4],
    ) -> Result<&ZoneQuad, ZoneError> {
        self.accept(corners, world, ZoneSource::Markers)
    }

    /// Zone from the four correspondences used for the extrinsic pose.
    pub fn from_extrinsic(&mut self, extrinsic: &ExtrinsicCalibration) -> Result<&ZoneQuad, ZoneError> {
        self.from_markers(extrinsic.image_points, extrinsic.world_points)
    }

    /// Zone from four clicked corners, mapped onto the standard square.
    pub fn from_manual_corners(&mut self, corners: [Point2<f64>; 4]) -> Result<&ZoneQuad, ZoneError> {
        self.accept(corners, standard_zone_world(), ZoneSource::Manual)
    }

    /// Reinstate a persisted zone after re-validating it.
    pub fn restore(&mut self, quad: ZoneQuad) -> Result<&ZoneQuad, ZoneError> {
        self.accept(quad.corners, quad.world, quad.source)
    }

    fn accept(
        &mut self,
        corners: [Point2<f64>; 4],
        world: [Point2<f64>; 4],
        source: ZoneSource,
    ) -> Result<&ZoneQuad, ZoneError> {
        if corners.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(ZoneError::InvalidZoneShape("non-finite corner".into()));
        }
        if !is_simple_quad(&corners) {
            return Err(ZoneError::InvalidZoneShape(
                "quadrilateral is self-intersecting".into(),
            ));
        }
        let area = polygon_area(&corners).abs();
        if area < self.min_area_px2 {
            return Err(ZoneError::InvalidZoneShape(format!(
                "area {area:.1} px^2 below {:.1}",
                self.min_area_px2
            )));
        }
        let image_to_world = homography_from_4pt(&corners, &world).ok_or_else(|| {
            ZoneError::InvalidZoneShape("no homography to world coordinates".into())
        })?;
        log::info!("zone set from {source:?}, area {area:.0} px^2");
        Ok(self.quad.insert(ZoneQuad {
            corners,
            world,
            source,
            image_to_world,
        }))
    }

    /// Point-in-polygon by ray casting. `false` without a zone.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.quad
            .as_ref()
            .is_some_and(|q| point_in_polygon(Point2::new(x, y), &q.corners))
    }

    /// Centroid of the corners.
    pub fn center(&self) -> Option<Point2<f64>> {
        centroid(&self.quad.as_ref()?.corners)
    }

    pub fn image_to_world(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        self.quad.as_ref()?.image_to_world.apply(p)
    }

    pub fn world_to_image(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        self.quad.as_ref()?.image_to_world.inverse()?.apply(p)
    }
}
