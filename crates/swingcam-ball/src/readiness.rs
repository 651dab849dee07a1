use std::collections::VecDeque;
use std::time::Duration;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::LiveDetection;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallZoneState {
    #[default]
    NoBall,
    OutOfZone,
    InZoneMoving,
    InZoneStable,
    Ready,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessParams {
    pub history: usize,
    pub stable_spread_px: f64,
    pub ready_after: Duration,
}

impl Default for ReadinessParams {
    fn default() -> Self {
        Self {
            history: 15,
            stable_spread_px: 2.0,
            ready_after: Duration::from_millis(1000),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadinessUpdate {
    pub state: BallZoneState,
    pub changed: bool,
    /// A ready ball left the zone or vanished.
    pub departed: bool,
}

/// Ball-in-zone readiness from live detections.
#[derive(Clone, Debug, Default)]
pub struct ReadinessMonitor {
    params: ReadinessParams,
    state: BallZoneState,
    history: VecDeque<Point2<f64>>,
    stable_since: Option<Duration>,
}

impl ReadinessMonitor {
    pub fn new(params: ReadinessParams) -> Self {
        Self {
            params,
            state: BallZoneState::NoBall,
            history: VecDeque::with_capacity(params.history),
            stable_since: None,
        }
    }

    pub fn state(&self) -> BallZoneState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = BallZoneState::NoBall;
        self.history.clear();
        self.stable_since = None;
    }

    /// Max distance of any history sample from the history mean.
    fn spread(&self) -> Option<f64> {
        if self.history.len() < self.params.history.max(2) {
            return None;
        }
        let n = self.history.len() as f64;
        let (sx, sy) = self
            .history
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        let mean = Point2::new(sx / n, sy / n);
        self.history
            .iter()
            .map(|p| (p - mean).norm())
            .reduce(f64::max)
    }

    pub fn update(&mut self, detection: &LiveDetection) -> ReadinessUpdate {
        let prev = self.state;
        let now = detection.timestamp;

        let next = if !detection.detected || detection.predicted {
            self.history.clear();
            self.stable_since = None;
            BallZoneState::NoBall
        } else if !detection.in_zone {
            self.history.clear();
            self.stable_since = None;
            BallZoneState::OutOfZone
        } else {
            if self.history.len() == self.params.history.max(2) {
                self.history.pop_front();
            }
            self.history.push_back(detection.center);
            match self.spread() {
                Some(s) if s <= self.params.stable_spread_px => {
                    let since = *self.stable_since.get_or_insert(now);
                    if now.saturating_sub(since) >= self.params.ready_after {
                        BallZoneState::Ready
                    } else {
                        BallZoneState::InZoneStable
                    }
                }
                _ => {
                    self.stable_since = None;
                    BallZoneState::InZoneMoving
                }
            }
        };

        self.state = next;
        let departed = prev == BallZoneState::Ready
            && matches!(next, BallZoneState::NoBall | BallZoneState::OutOfZone);
        if departed {
            log::info!("ball departed zone ({next:?})");
        }
        ReadinessUpdate {
            state: next,
            changed: next != prev,
            departed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f64, y: f64, in_zone: bool, t_ms: u64) -> LiveDetection {
        LiveDetection {
            detected: true,
            center: Point2::new(x, y),
            radius: 10.0,
            confidence: 0.9,
            in_zone,
            predicted: false,
            timestamp: Duration::from_millis(t_ms),
        }
    }

    #[test]
    fn becomes_ready_after_stable_second() {
        let mut m = ReadinessMonitor::default();
        let mut t = 0;
        for _ in 0..14 {
            assert_eq!(m.update(&det(100.0, 100.0, true, t)).state, BallZoneState::InZoneMoving);
            t += 10;
        }
        assert_eq!(m.update(&det(100.5, 99.5, true, t)).state, BallZoneState::InZoneStable);
        while t + 10 < 1140 {
            t += 10;
            assert_eq!(m.update(&det(100.0, 100.0, true, t)).state, BallZoneState::InZoneStable);
        }
        t += 10;
        let up = m.update(&det(100.0, 100.0, true, t));
        assert_eq!(up.state, BallZoneState::Ready);
        assert!(up.changed);
    }

    #[test]
    fn wobble_resets_stability() {
        let mut m = ReadinessMonitor::default();
        for k in 0..30 {
            let x = if k % 2 == 0 { 100.0 } else { 106.0 };
            let up = m.update(&det(x, 100.0, true, k * 10));
            assert_ne!(up.state, BallZoneState::Ready);
        }
        assert_eq!(m.state(), BallZoneState::InZoneMoving);
    }

    #[test]
    fn ready_ball_departing_is_flagged() {
        let mut m = ReadinessMonitor::default();
        for k in 0..130 {
            m.update(&det(50.0, 50.0, true, k * 10));
        }
        assert_eq!(m.state(), BallZoneState::Ready);
        let up = m.update(&LiveDetection::missed(Duration::from_millis(1300)));
        assert_eq!(up.state, BallZoneState::NoBall);
        assert!(up.departed);

        let again = m.update(&det(50.0, 50.0, false, 1310));
        assert_eq!(again.state, BallZoneState::OutOfZone);
        assert!(!again.departed);
    }
}
