//! ChESS corner detection and checkerboard finding.

use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use swingcam_core::GrayImageView;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::grid::{assemble_board, Corner, GridGraphParams};
use crate::CheckerboardSpec;

/// Tunables forwarded to the `chess-corners` detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerDetectParams {
    pub threshold_rel: f32,
    pub nms_radius: u32,
}

impl Default for CornerDetectParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
        }
    }
}

impl CornerDetectParams {
    pub fn chess_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.params.threshold_rel = self.threshold_rel;
        cfg.params.nms_radius = self.nms_radius;
        cfg
    }
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner {
        position: Point2::new(c.x, c.y),
        orientation: c.orientation,
        strength: c.response,
    }
}

/// Detect raw ChESS corners on a luma view.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, params), fields(width = img.width, height = img.height))
)]
pub fn detect_corners(img: &GrayImageView<'_>, params: &CornerDetectParams) -> Vec<Corner> {
    let Some(buffer) =
        ::image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.to_vec())
    else {
        return Vec::new();
    };
    find_chess_corners_image(&buffer, &params.chess_config())
        .iter()
        .map(adapt_chess_corner)
        .collect()
}

/// Locates a checkerboard in a frame.
///
/// Returned points follow the row-major order of
/// [`CheckerboardSpec::object_points`].
pub trait CheckerboardFinder: Send {
    fn find(&self, img: &GrayImageView<'_>, spec: &CheckerboardSpec) -> Option<Vec<Point2<f64>>>;
}

/// ChESS corners followed by grid assembly.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChessboardFinder {
    #[serde(default)]
    pub corners: CornerDetectParams,
    #[serde(default)]
    pub graph: GridGraphParams,
}

impl CheckerboardFinder for ChessboardFinder {
    fn find(&self, img: &GrayImageView<'_>, spec: &CheckerboardSpec) -> Option<Vec<Point2<f64>>> {
        let corners = detect_corners(img, &self.corners);
        log::debug!(
            "{} ChESS corners, need {}x{}",
            corners.len(),
            spec.corners_wide,
            spec.corners_high
        );
        assemble_board(&corners, spec, &self.graph)
    }
}
