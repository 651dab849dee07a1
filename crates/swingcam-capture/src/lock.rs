//! Reference ball for displacement checks.
//!
//! The first measured ball is locked. Later detections count as the same
//! ball only within `same_ball_px` of the lock; anything farther is another
//! object and never moves the reference. Sub-pixel jitter under `refine_px`
//! refines the locked centre so a settled ball stays accurate.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallLockParams {
    pub same_ball_px: f64,
    pub refine_px: f64,
    /// Drop the lock after this many frames without the locked ball.
    pub release_after_misses: u32,
}

impl Default for BallLockParams {
    fn default() -> Self {
        Self {
            same_ball_px: 50.0,
            refine_px: 2.0,
            release_after_misses: 200,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LockObservation {
    /// No lock existed; this detection is now the reference.
    Acquired(Point2<f64>),
    /// The locked ball, `offset` px from the reference.
    Same { offset: f64 },
    /// A detection too far from the lock to be the same ball.
    Foreign { distance: f64 },
    Missing,
    /// The locked ball stayed missing too long.
    Released,
}

#[derive(Clone, Debug, Default)]
pub struct BallLock {
    params: BallLockParams,
    reference: Option<Point2<f64>>,
    misses: u32,
}

impl BallLock {
    pub fn new(params: BallLockParams) -> Self {
        Self {
            params,
            reference: None,
            misses: 0,
        }
    }

    pub fn params(&self) -> &BallLockParams {
        &self.params
    }

    pub fn reference(&self) -> Option<Point2<f64>> {
        self.reference
    }

    pub fn release(&mut self) {
        self.reference = None;
        self.misses = 0;
    }

    /// Feed one frame's measured ball centre (`None` when nothing was
    /// measured, including predicted positions).
    pub fn observe(&mut self, center: Option<Point2<f64>>) -> LockObservation {
        let Some(reference) = self.reference else {
            return match center {
                Some(c) => {
                    self.reference = Some(c);
                    self.misses = 0;
                    LockObservation::Acquired(c)
                }
                None => LockObservation::Missing,
            };
        };
        let observation = match center {
            Some(c) => {
                let offset = (c - reference).norm();
                if offset < self.params.same_ball_px {
                    if offset <= self.params.refine_px {
                        self.reference = Some(c);
                    }
                    self.misses = 0;
                    return LockObservation::Same { offset };
                }
                LockObservation::Foreign { distance: offset }
            }
            None => LockObservation::Missing,
        };
        self.misses += 1;
        if self.misses >= self.params.release_after_misses {
            self.release();
            return LockObservation::Released;
        }
        observation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Option<Point2<f64>> {
        Some(Point2::new(x, y))
    }

    #[test]
    fn second_ball_does_not_replace_reference() {
        let mut lock = BallLock::default();
        assert_eq!(lock.observe(p(100.0, 80.0)), LockObservation::Acquired(Point2::new(100.0, 80.0)));
        match lock.observe(p(180.0, 80.0)) {
            LockObservation::Foreign { distance } => assert!((distance - 80.0).abs() < 1e-9),
            other => panic!("expected foreign detection, got {other:?}"),
        }
        assert_eq!(lock.reference(), Some(Point2::new(100.0, 80.0)));
        assert!(matches!(lock.observe(p(100.0, 80.0)), LockObservation::Same { .. }));
    }

    #[test]
    fn jitter_refines_but_motion_does_not() {
        let mut lock = BallLock::default();
        lock.observe(p(100.0, 80.0));
        assert!(matches!(lock.observe(p(101.0, 80.5)), LockObservation::Same { .. }));
        assert_eq!(lock.reference(), Some(Point2::new(101.0, 80.5)));

        match lock.observe(p(121.0, 80.5)) {
            LockObservation::Same { offset } => assert!((offset - 20.0).abs() < 1e-9),
            other => panic!("expected same ball, got {other:?}"),
        }
        assert_eq!(lock.reference(), Some(Point2::new(101.0, 80.5)));

        // Exactly at the limit is a different object.
        assert!(matches!(lock.observe(p(151.0, 80.5)), LockObservation::Foreign { .. }));
    }

    #[test]
    fn lock_is_released_after_misses() {
        let mut lock = BallLock::new(BallLockParams {
            release_after_misses: 3,
            ..BallLockParams::default()
        });
        assert_eq!(lock.observe(None), LockObservation::Missing);
        lock.observe(p(50.0, 50.0));
        assert_eq!(lock.observe(None), LockObservation::Missing);
        assert!(matches!(lock.observe(p(200.0, 50.0)), LockObservation::Foreign { .. }));
        assert_eq!(lock.observe(None), LockObservation::Released);
        assert_eq!(lock.reference(), None);
        assert!(matches!(lock.observe(p(200.0, 50.0)), LockObservation::Acquired(_)));
    }
}
