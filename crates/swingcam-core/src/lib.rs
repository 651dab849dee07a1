//! Core types for the swingcam launch-monitor stack.
//!
//! This crate is small and purely geometric: luma rasters, timestamped
//! frames, homographies and planar predicates. It knows nothing about
//! checkerboards, balls or radar.

mod frame;
mod geometry;
mod homography;
mod image;
mod logger;

pub use frame::{luma_from_raw, Frame, FrameError, FrameSource, PixelFormat, RawFrame, VecFrameSource};
pub use geometry::{
    centroid, cross, has_collinear_triple, has_near_duplicates, is_simple_quad, point_in_polygon,
    polygon_area, segments_intersect,
};
pub use homography::{estimate_homography, homography_from_4pt, normalize_points, Homography};
pub use image::{sample_bilinear, sample_bilinear_clamped, GrayImage, GrayImageView, IntegralImage};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init, init_with_level, LogConfig};
