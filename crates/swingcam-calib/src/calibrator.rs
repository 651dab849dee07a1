//! Calibration session state and commands.

use std::fmt::Write as _;

use crossbeam_channel::Sender;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use swingcam_core::Frame;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::corners::{CheckerboardFinder, ChessboardFinder};
use crate::pose::{solve_planar_pose, validate_correspondences, ExtrinsicCalibration, ExtrinsicPose};
use crate::zhang::{calibrate_intrinsics, ZhangOptions};
use crate::{CalibrationError, CheckerboardObservation, CheckerboardSpec, IntrinsicProfile};

/// Notifications for the UI/CLI layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CalibrationEvent {
    FrameCaptured { count: usize, needed: usize },
    CalibrationComplete { summary: String },
    CalibrationFailed { reason: String },
    BallDetected { x: f64, y: f64, radius: f64, confidence: f64 },
}

fn default_min_observations() -> usize {
    15
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibratorConfig {
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
    #[serde(default)]
    pub zhang: ZhangOptions,
    #[serde(default)]
    pub finder: ChessboardFinder,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            min_observations: default_min_observations(),
            zhang: ZhangOptions::default(),
            finder: ChessboardFinder::default(),
        }
    }
}

struct IntrinsicSession {
    spec: CheckerboardSpec,
    observations: Vec<CheckerboardObservation>,
}

/// Owns the intrinsic profile and ground pose.
///
/// Both are replaced only by a successful re-run of the corresponding
/// calibration; failures leave the last good values untouched.
pub struct GeometricCalibrator {
    config: CalibratorConfig,
    finder: Box<dyn CheckerboardFinder>,
    session: Option<IntrinsicSession>,
    intrinsics: Option<IntrinsicProfile>,
    extrinsic: Option<ExtrinsicCalibration>,
    summary: String,
    events: Option<Sender<CalibrationEvent>>,
}

impl GeometricCalibrator {
    pub fn new(config: CalibratorConfig) -> Self {
        let finder = Box::new(config.finder.clone());
        Self::with_finder(config, finder)
    }

    /// Use a custom checkerboard finder instead of the ChESS pipeline.
    pub fn with_finder(config: CalibratorConfig, finder: Box<dyn CheckerboardFinder>) -> Self {
        Self {
            config,
            finder,
            session: None,
            intrinsics: None,
            extrinsic: None,
            summary: String::new(),
            events: None,
        }
    }

    pub fn set_event_sender(&mut self, tx: Sender<CalibrationEvent>) {
        self.events = Some(tx);
    }

    fn emit(&self, event: CalibrationEvent) {
        if let Some(tx) = &self.events {
            if tx.try_send(event).is_err() {
                log::warn!("calibration event dropped (receiver full or gone)");
            }
        }
    }

    fn fail(&self, err: CalibrationError) -> CalibrationError {
        log::warn!("calibration failed: {err}");
        self.emit(CalibrationEvent::CalibrationFailed {
            reason: err.to_string(),
        });
        err
    }

    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    pub fn intrinsics(&self) -> Option<&IntrinsicProfile> {
        self.intrinsics.as_ref()
    }

    pub fn extrinsic(&self) -> Option<&ExtrinsicCalibration> {
        self.extrinsic.as_ref()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn is_session_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn observation_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.observations.len())
    }

    /// Reinstate persisted calibration results.
    pub fn restore(
        &mut self,
        intrinsics: Option<IntrinsicProfile>,
        extrinsic: Option<ExtrinsicCalibration>,
    ) {
        self.extrinsic = if intrinsics.is_some() { extrinsic } else { None };
        self.intrinsics = intrinsics;
        self.refresh_summary();
    }

    /// Start a fresh observation set.
    pub fn begin_intrinsic_calibration(
        &mut self,
        corners_wide: u32,
        corners_high: u32,
        square_size_mm: f64,
    ) -> Result<(), CalibrationError> {
        let spec = CheckerboardSpec::new(corners_wide, corners_high, square_size_mm)
            .map_err(|e| self.fail(e))?;
        log::info!(
            "intrinsic calibration started: {}x{} corners, {} mm squares",
            corners_wide,
            corners_high,
            square_size_mm
        );
        self.session = Some(IntrinsicSession {
            spec,
            observations: Vec::new(),
        });
        Ok(())
    }

    pub fn cancel_intrinsic_calibration(&mut self) {
        if self.session.take().is_some() {
            log::info!("intrinsic calibration cancelled");
        }
    }

    /// Detect the board in `frame` and keep it on success.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(seq = frame.sequence))
    )]
    pub fn capture_observation(&mut self, frame: &Frame) -> Result<usize, CalibrationError> {
        let spec = self
            .session
            .as_ref()
            .ok_or(CalibrationError::NoActiveSession)?
            .spec;
        let Some(points) = self.finder.find(&frame.view(), &spec) else {
            log::debug!("no checkerboard in frame {}", frame.sequence);
            return Err(CalibrationError::CornersNotFound);
        };
        self.add_observation(points, frame.width(), frame.height())
    }

    /// Append externally detected corners (row-major, board order).
    pub fn add_observation(
        &mut self,
        image_points: Vec<Point2<f64>>,
        image_width: usize,
        image_height: usize,
    ) -> Result<usize, CalibrationError> {
        let needed = self.config.min_observations;
        let session = self
            .session
            .as_mut()
            .ok_or(CalibrationError::NoActiveSession)?;

        if image_points.len() != session.spec.corner_count() {
            return Err(CalibrationError::InvalidParameters(format!(
                "expected {} corners, got {}",
                session.spec.corner_count(),
                image_points.len()
            )));
        }
        if let Some(first) = session.observations.first() {
            if (first.image_width, first.image_height) != (image_width, image_height) {
                return Err(CalibrationError::InvalidParameters(format!(
                    "frame size {image_width}x{image_height} differs from {}x{}",
                    first.image_width, first.image_height
                )));
            }
        }

        session.observations.push(CheckerboardObservation {
            spec: session.spec,
            image_points,
            image_width,
            image_height,
        });
        let count = session.observations.len();
        log::info!("checkerboard observation {count}/{needed} captured");
        self.emit(CalibrationEvent::FrameCaptured { count, needed });
        Ok(count)
    }

    /// Solve intrinsics from the collected observations.
    pub fn finish_intrinsic_calibration(&mut self) -> Result<&IntrinsicProfile, CalibrationError> {
        let need = self.config.min_observations.max(3);
        let have = self.observation_count();
        if self.session.is_none() {
            return Err(self.fail(CalibrationError::NoActiveSession));
        }
        if have < need {
            return Err(self.fail(CalibrationError::InsufficientObservations { have, need }));
        }

        let observations = self
            .session
            .as_ref()
            .map(|s| s.observations.as_slice())
            .unwrap_or_default();
        let solution = match calibrate_intrinsics(observations, &self.config.zhang) {
            Ok(solution) => solution,
            Err(e) => return Err(self.fail(e)),
        };

        self.session = None;
        if self.extrinsic.take().is_some() {
            log::info!("previous extrinsic pose invalidated by new intrinsics");
        }
        self.refresh_summary_with(&solution.profile);
        self.emit(CalibrationEvent::CalibrationComplete {
            summary: self.summary.clone(),
        });
        Ok(self.intrinsics.insert(solution.profile))
    }

    /// Solve the ground pose from four image/world correspondences.
    pub fn compute_extrinsic_pose(
        &mut self,
        image_points: [Point2<f64>; 4],
        world_points: [Point2<f64>; 4],
    ) -> Result<&ExtrinsicPose, CalibrationError> {
        validate_correspondences(&image_points, &world_points).map_err(|e| self.fail(e))?;
        let intrinsics = self
            .intrinsics
            .as_ref()
            .ok_or(CalibrationError::NotIntrinsicallyCalibrated)
            .map_err(|e| self.fail(e))?;

        let pose = solve_planar_pose(intrinsics, &image_points, &world_points)
            .map_err(|e| self.fail(e))?;
        log::info!(
            "camera height {:.2} m, tilt {:.1} deg, distance {:.2} m",
            pose.camera_height_m(),
            pose.camera_tilt_deg(),
            pose.camera_distance_m()
        );

        self.extrinsic = Some(ExtrinsicCalibration {
            pose,
            image_points,
            world_points,
        });
        self.refresh_summary();
        self.emit(CalibrationEvent::CalibrationComplete {
            summary: self.summary.clone(),
        });
        let calibration = self
            .extrinsic
            .as_ref()
            .ok_or(CalibrationError::NotIntrinsicallyCalibrated)?;
        Ok(&calibration.pose)
    }

    /// Ground-plane millimetres under a pixel.
    pub fn pixel_to_world(&self, pixel: Point2<f64>) -> Option<Point2<f64>> {
        let intrinsics = self.intrinsics.as_ref()?;
        self.extrinsic.as_ref()?.pose.pixel_to_world(intrinsics, pixel)
    }

    /// Pixel position of a ground-plane point in millimetres.
    pub fn world_to_pixel(&self, world: Point2<f64>) -> Option<Point2<f64>> {
        let intrinsics = self.intrinsics.as_ref()?;
        self.extrinsic.as_ref()?.pose.world_to_pixel(intrinsics, world)
    }

    fn refresh_summary(&mut self) {
        self.summary = format_summary(self.intrinsics.as_ref(), self.extrinsic.as_ref().map(|e| &e.pose));
    }

    fn refresh_summary_with(&mut self, intrinsics: &IntrinsicProfile) {
        self.summary = format_summary(Some(intrinsics), None);
    }
}

/// Human-readable calibration summary.
pub fn format_summary(intrinsics: Option<&IntrinsicProfile>, pose: Option<&ExtrinsicPose>) -> String {
    let mut s = String::new();
    let Some(k) = intrinsics else {
        return "Not calibrated\n".to_string();
    };
    let _ = writeln!(s, "Focal Length: fx={:.1} fy={:.1} pixels", k.fx, k.fy);
    let _ = writeln!(s, "Principal Point: ({:.1}, {:.1})", k.cx, k.cy);
    let _ = writeln!(
        s,
        "Distortion: k1={:.4} k2={:.4} k3={:.4}",
        k.distortion.k1, k.distortion.k2, k.distortion.k3
    );
    let _ = writeln!(
        s,
        "Reprojection RMS: {:.3} px ({} views)",
        k.rms_error_px, k.observation_count
    );
    if let Some(p) = pose {
        let _ = writeln!(s);
        let _ = writeln!(s, "Camera Height: {:.2} m", p.camera_height_m());
        let _ = writeln!(s, "Camera Tilt: {:.1}°", p.camera_tilt_deg());
        let _ = writeln!(s, "Camera Distance: {:.2} m", p.camera_distance_m());
    }
    s
}
