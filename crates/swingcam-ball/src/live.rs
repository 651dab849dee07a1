//! Per-frame ball tracking around the last known position.

use std::time::Duration;

use nalgebra::{Point2, SMatrix, SVector};
use serde::{Deserialize, Serialize};
use swingcam_core::Frame;

use crate::detect::{BallCandidate, BallDetector, Roi};
use crate::ZoneMapper;

type State = SVector<f64, 4>;
type Matrix4 = SMatrix<f64, 4, 4>;
type Matrix2x4 = SMatrix<f64, 2, 4>;
type Matrix2 = SMatrix<f64, 2, 2>;

/// Constant-velocity filter over `[x, y, vx, vy]` in pixels and pixels/s.
#[derive(Clone, Debug)]
pub struct ConstantVelocityKalman {
    state: State,
    covariance: Matrix4,
    /// Acceleration noise spectral density.
    accel_noise: f64,
    measurement_noise: Matrix2,
}

impl ConstantVelocityKalman {
    pub fn new(position: Point2<f64>, accel_noise: f64, measurement_sigma_px: f64) -> Self {
        let mut covariance = Matrix4::identity() * measurement_sigma_px.powi(2);
        covariance[(2, 2)] = 100.0 * 100.0;
        covariance[(3, 3)] = 100.0 * 100.0;
        Self {
            state: State::new(position.x, position.y, 0.0, 0.0),
            covariance,
            accel_noise,
            measurement_noise: Matrix2::identity() * measurement_sigma_px.powi(2),
        }
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.state[0], self.state[1])
    }

    pub fn velocity(&self) -> (f64, f64) {
        (self.state[2], self.state[3])
    }

    pub fn predict(&mut self, dt: f64) {
        let dt = dt.max(0.0);
        #[rustfmt::skip]
        let f = Matrix4::new(
            1.0, 0.0, dt,  0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let (dt2, dt3, dt4) = (dt * dt, dt * dt * dt / 2.0, dt * dt * dt * dt / 4.0);
        let q = self.accel_noise;
        #[rustfmt::skip]
        let process = Matrix4::new(
            dt4 * q, 0.0,     dt3 * q, 0.0,
            0.0,     dt4 * q, 0.0,     dt3 * q,
            dt3 * q, 0.0,     dt2 * q, 0.0,
            0.0,     dt3 * q, 0.0,     dt2 * q,
        );
        self.state = f * self.state;
        self.covariance = f * self.covariance * f.transpose() + process;
    }

    pub fn update(&mut self, z: Point2<f64>) {
        #[rustfmt::skip]
        let h = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );
        let innovation = z.coords - h * self.state;
        let s = h * self.covariance * h.transpose() + self.measurement_noise;
        let Some(s_inv) = s.try_inverse() else {
            return;
        };
        let k = self.covariance * h.transpose() * s_inv;
        self.state += k * innovation;
        self.covariance = (Matrix4::identity() - k * h) * self.covariance;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveTrackerParams {
    /// Search half-window (px) once the track has this many net hits.
    pub window_locked_px: f64,
    pub window_tracking_px: f64,
    pub window_acquiring_px: f64,
    pub locked_hits: u32,
    pub tracking_hits: u32,
    /// Candidates scoring below this are treated as a miss.
    pub min_score: f64,
    /// Predict through misses only when the hit counter exceeds this.
    pub predict_min_hits: u32,
    pub max_predicted_misses: u32,
    /// Drop the track after this many consecutive misses.
    pub reset_after_misses: u32,
    pub accel_noise: f64,
    pub measurement_sigma_px: f64,
}

impl Default for LiveTrackerParams {
    fn default() -> Self {
        Self {
            window_locked_px: 30.0,
            window_tracking_px: 50.0,
            window_acquiring_px: 100.0,
            locked_hits: 8,
            tracking_hits: 5,
            min_score: 0.2,
            predict_min_hits: 3,
            max_predicted_misses: 10,
            reset_after_misses: 15,
            accel_noise: 5.0e4,
            measurement_sigma_px: 1.0,
        }
    }
}

/// Result of one live tracking tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveDetection {
    pub detected: bool,
    pub center: Point2<f64>,
    pub radius: f64,
    pub confidence: f64,
    pub in_zone: bool,
    /// Position comes from the motion model, not a measurement.
    pub predicted: bool,
    pub timestamp: Duration,
}

impl LiveDetection {
    pub fn missed(timestamp: Duration) -> Self {
        Self {
            detected: false,
            center: Point2::origin(),
            radius: 0.0,
            confidence: 0.0,
            in_zone: false,
            predicted: false,
            timestamp,
        }
    }
}

#[derive(Clone, Debug)]
struct Track {
    filter: ConstantVelocityKalman,
    radius: f64,
    last_timestamp: Duration,
}

/// Tracks the resting ball frame to frame.
#[derive(Clone, Debug, Default)]
pub struct LiveTracker {
    params: LiveTrackerParams,
    track: Option<Track>,
    hits: u32,
    misses: u32,
}

impl LiveTracker {
    pub fn new(params: LiveTrackerParams) -> Self {
        Self {
            params,
            track: None,
            hits: 0,
            misses: 0,
        }
    }

    pub fn reset(&mut self) {
        self.track = None;
        self.hits = 0;
        self.misses = 0;
    }

    /// Net hit counter used to size the search window.
    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn is_tracking(&self) -> bool {
        self.track.is_some()
    }

    fn window_half(&self) -> f64 {
        if self.hits >= self.params.locked_hits {
            self.params.window_locked_px
        } else if self.hits >= self.params.tracking_hits {
            self.params.window_tracking_px
        } else {
            self.params.window_acquiring_px
        }
    }

    /// One tracking tick. `expected_radius` is the calibrated ball radius
    /// when one exists.
    pub fn update(
        &mut self,
        detector: &BallDetector,
        frame: &Frame,
        zone: &ZoneMapper,
        expected_radius: Option<f64>,
    ) -> LiveDetection {
        let (w, h) = (frame.width(), frame.height());
        let now = frame.timestamp;

        if let Some(track) = &mut self.track {
            let dt = now.saturating_sub(track.last_timestamp).as_secs_f64();
            track.filter.predict(dt);
            track.last_timestamp = now;
        }

        let anchor = match &self.track {
            Some(track) => Some(track.filter.position()),
            None => zone.center(),
        };
        let half = self.window_half();
        let roi = anchor.and_then(|c| Roi::around(c, half, w, h));
        let candidates = detector.candidates(&frame.view(), roi.or(Some(Roi::full(w, h))));

        let reference_radius = self
            .track
            .as_ref()
            .map(|t| t.radius)
            .or(expected_radius)
            .unwrap_or_else(|| detector.params().radius_range.mid());
        let tracking = self.track.is_some();

        let best = candidates
            .iter()
            .map(|c| (self.score(c, anchor, half, reference_radius, tracking), c))
            .max_by(|a, b| a.0.total_cmp(&b.0));

        match best {
            Some((score, cand)) if score >= self.params.min_score => {
                self.on_hit(cand, now);
                let center = self
                    .track
                    .as_ref()
                    .map(|t| t.filter.position())
                    .unwrap_or(cand.center);
                LiveDetection {
                    detected: true,
                    center,
                    radius: cand.radius,
                    confidence: cand.confidence,
                    in_zone: zone.contains_point(center.x, center.y),
                    predicted: false,
                    timestamp: now,
                }
            }
            _ => self.on_miss(zone, now),
        }
    }

    fn score(
        &self,
        cand: &BallCandidate,
        anchor: Option<Point2<f64>>,
        half: f64,
        reference_radius: f64,
        tracking: bool,
    ) -> f64 {
        let proximity = match anchor {
            Some(a) => (1.0 - (cand.center - a).norm() / (half * std::f64::consts::SQRT_2)).max(0.0),
            None => 0.5,
        };
        let radius = (1.0 - (cand.radius - reference_radius).abs() / reference_radius.max(1.0)).max(0.0);
        let brightness = (cand.brightness as f64 / 255.0).clamp(0.0, 1.0);
        let (wp, wr, wb) = if tracking {
            (0.7, 0.15, 0.15)
        } else {
            (0.5, 0.2, 0.3)
        };
        (wp * proximity + wr * radius + wb * brightness) * cand.confidence.max(0.0).sqrt()
    }

    fn on_hit(&mut self, cand: &BallCandidate, now: Duration) {
        self.misses = 0;
        self.hits = (self.hits + 1).min(self.params.locked_hits + 2);
        match &mut self.track {
            Some(track) => {
                track.filter.update(cand.center);
                track.radius = 0.8 * track.radius + 0.2 * cand.radius;
            }
            None => {
                log::debug!(
                    "live track acquired at ({:.1}, {:.1})",
                    cand.center.x,
                    cand.center.y
                );
                self.track = Some(Track {
                    filter: ConstantVelocityKalman::new(
                        cand.center,
                        self.params.accel_noise,
                        self.params.measurement_sigma_px,
                    ),
                    radius: cand.radius,
                    last_timestamp: now,
                });
            }
        }
    }

    fn on_miss(&mut self, zone: &ZoneMapper, now: Duration) -> LiveDetection {
        let can_predict = self.hits > self.params.predict_min_hits;
        self.misses += 1;
        self.hits = self.hits.saturating_sub(1);

        if self.misses > self.params.reset_after_misses {
            if self.track.is_some() {
                log::debug!("live track lost after {} misses", self.misses);
            }
            self.reset();
            return LiveDetection::missed(now);
        }

        match &self.track {
            Some(track) if can_predict && self.misses <= self.params.max_predicted_misses => {
                let center = track.filter.position();
                LiveDetection {
                    detected: true,
                    center,
                    radius: track.radius,
                    confidence: 0.0,
                    in_zone: zone.contains_point(center.x, center.y),
                    predicted: true,
                    timestamp: now,
                }
            }
            _ => LiveDetection::missed(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testutil::render_ball;
    use crate::{BallDetectParams, RadiusRange};
    use swingcam_core::GrayImage;

    fn detector() -> BallDetector {
        BallDetector::new(BallDetectParams {
            radius_range: RadiusRange::new(6.0, 20.0).unwrap(),
            ..BallDetectParams::default()
        })
        .unwrap()
    }

    fn frame_with_ball(cx: f64, cy: f64, t_ms: u64, seq: u64) -> Frame {
        Frame::new(
            render_ball(240, 180, cx, cy, 10.0, 230, 60),
            Duration::from_millis(t_ms),
            seq,
        )
    }

    fn empty_frame(t_ms: u64, seq: u64) -> Frame {
        let mut img = GrayImage::new(240, 180);
        img.data.iter_mut().for_each(|v| *v = 60);
        Frame::new(img, Duration::from_millis(t_ms), seq)
    }

    #[test]
    fn kalman_follows_constant_velocity() {
        let mut kf = ConstantVelocityKalman::new(Point2::new(0.0, 0.0), 10.0, 0.5);
        for k in 1..=40 {
            kf.predict(0.01);
            kf.update(Point2::new(2.0 * k as f64, -1.0 * k as f64));
        }
        let (vx, vy) = kf.velocity();
        assert!((vx - 200.0).abs() < 10.0, "vx {vx}");
        assert!((vy + 100.0).abs() < 10.0, "vy {vy}");
        kf.predict(0.05);
        assert!((kf.position().x - 90.0).abs() < 2.0);
    }

    #[test]
    fn window_shrinks_as_hits_accumulate() {
        let det = detector();
        let zone = ZoneMapper::default();
        let mut tracker = LiveTracker::default();
        assert_eq!(tracker.window_half(), 100.0);
        for k in 0..10 {
            let d = tracker.update(&det, &frame_with_ball(120.0, 90.0, 5 * k, k), &zone, None);
            assert!(d.detected && !d.predicted);
            assert!((d.center - Point2::new(120.0, 90.0)).norm() < 0.5);
        }
        assert_eq!(tracker.window_half(), 30.0);
    }

    #[test]
    fn predicts_through_short_gaps_then_resets() {
        let det = detector();
        let zone = ZoneMapper::default();
        let mut tracker = LiveTracker::default();
        for k in 0..10 {
            tracker.update(&det, &frame_with_ball(100.0, 80.0, 5 * k, k), &zone, None);
        }

        let gap = tracker.update(&det, &empty_frame(50, 10), &zone, None);
        assert!(gap.detected && gap.predicted);
        assert!((gap.center - Point2::new(100.0, 80.0)).norm() < 1.0);

        for k in 11..=26 {
            tracker.update(&det, &empty_frame(5 * k, k), &zone, None);
        }
        assert!(!tracker.is_tracking());
        let lost = tracker.update(&det, &empty_frame(200, 27), &zone, None);
        assert!(!lost.detected);
    }

    #[test]
    fn reports_zone_membership() {
        let det = detector();
        let mut zone = ZoneMapper::default();
        zone.from_manual_corners([
            Point2::new(80.0, 60.0),
            Point2::new(160.0, 60.0),
            Point2::new(160.0, 120.0),
            Point2::new(80.0, 120.0),
        ])
        .unwrap();
        let mut tracker = LiveTracker::default();

        let inside = tracker.update(&det, &frame_with_ball(120.0, 90.0, 0, 0), &zone, None);
        assert!(inside.in_zone);

        tracker.reset();
        let outside = tracker.update(&det, &frame_with_ball(200.0, 40.0, 5, 1), &zone, None);
        assert!(outside.detected);
        assert!(!outside.in_zone);
    }
}
