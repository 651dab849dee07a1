//! Radar and vision fusion for a single impact.
//!
//! The arbiter is deterministic: it only sees the frames, detections and
//! clock readings handed to it. An impact opens a pending window. The window
//! closes with a verdict once enough post-impact frames have arrived, or with
//! an acquisition timeout when the camera stops delivering.

use std::time::{Duration, Instant};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use crate::buffer::SharedFrame;

/// Direction along which ball displacement is measured.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "axis", rename_all = "snake_case")]
pub enum ImpactAxis {
    /// Euclidean distance from the pre-impact position.
    Radial,
    /// Signed image-x motion; `sign` is +1 for launches toward larger x.
    X { sign: f64 },
    Y { sign: f64 },
}

impl Default for ImpactAxis {
    fn default() -> Self {
        ImpactAxis::Radial
    }
}

impl ImpactAxis {
    pub fn displacement(&self, from: Point2<f64>, to: Point2<f64>) -> f64 {
        match *self {
            ImpactAxis::Radial => (to - from).norm(),
            ImpactAxis::X { sign } => sign.signum() * (to.x - from.x),
            ImpactAxis::Y { sign } => sign.signum() * (to.y - from.y),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterParams {
    pub post_impact_frames: usize,
    pub displacement_threshold_px: f64,
    pub axis: ImpactAxis,
    /// Give up when no post-impact frame arrives for this long.
    #[serde(with = "crate::serde_ms")]
    pub acquisition_timeout: Duration,
    /// Treat a ball missing from every post-impact frame as launched.
    pub vanished_ball_counts_as_launched: bool,
}

impl Default for ArbiterParams {
    fn default() -> Self {
        Self {
            post_impact_frames: 20,
            displacement_threshold_px: 10.0,
            axis: ImpactAxis::Radial,
            acquisition_timeout: Duration::from_millis(500),
            vanished_ball_counts_as_launched: true,
        }
    }
}

/// An impact, stamped with the vision state at the moment it happened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImpactEvent {
    pub at: Instant,
    /// Locked ball centre before the impact.
    pub pre_impact: Option<Point2<f64>>,
    /// Newest frame counted as pre-impact; `None` when every buffered
    /// frame arrived after the impact.
    pub snapshot_sequence: Option<u64>,
    /// Radar club speed peak; `None` for camera-triggered impacts.
    pub peak_mph: Option<f64>,
}

/// A confirmed shot: pre-impact frames followed by post-impact frames.
#[derive(Clone, Debug)]
pub struct ShotCapture {
    /// 1-based shot counter.
    pub sequence_number: u32,
    pub impact: ImpactEvent,
    pub frames: Vec<SharedFrame>,
    pub pre_impact_frames: usize,
    /// `None` when the ball was not seen after impact.
    pub displacement_px: Option<f64>,
}

impl ShotCapture {
    pub fn post_impact_frames(&self) -> usize {
        self.frames.len() - self.pre_impact_frames
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DiscardReason {
    PracticeSwing { displacement_px: f64 },
    AcquisitionTimeout { post_frames: usize },
    /// No ball position was known when the impact arrived.
    NoReference,
}

#[derive(Clone, Debug)]
pub enum Verdict {
    Confirmed(ShotCapture),
    Discarded {
        impact: ImpactEvent,
        reason: DiscardReason,
    },
}

#[derive(Debug)]
struct PendingShot {
    impact: ImpactEvent,
    reference: Point2<f64>,
    frames: Vec<SharedFrame>,
    pre_count: usize,
    detections: usize,
    farthest: f64,
    deadline: Instant,
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Armed,
    Pending(Box<PendingShot>),
}

#[derive(Debug, Default)]
pub struct ImpactArbiter {
    params: ArbiterParams,
    phase: Phase,
    shots: u32,
}

impl ImpactArbiter {
    pub fn new(params: ArbiterParams) -> Self {
        Self {
            params,
            phase: Phase::Armed,
            shots: 0,
        }
    }

    pub fn params(&self) -> &ArbiterParams {
        &self.params
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending(_))
    }

    /// Confirmed shots so far.
    pub fn shot_count(&self) -> u32 {
        self.shots
    }

    /// Continue numbering after `count` existing shots.
    pub fn set_shot_count(&mut self, count: u32) {
        self.shots = count;
    }

    /// Drop any pending impact.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.is_pending();
        self.phase = Phase::Armed;
        was_pending
    }

    /// Open a pending window. A second impact while one is pending is ignored.
    pub fn on_impact(&mut self, impact: ImpactEvent, pre_frames: Vec<SharedFrame>) -> Option<Verdict> {
        if self.is_pending() {
            log::debug!("impact ignored: evaluation already pending");
            return None;
        }
        let Some(reference) = impact.pre_impact else {
            log::warn!("impact discarded: no ball reference");
            return Some(Verdict::Discarded {
                impact,
                reason: DiscardReason::NoReference,
            });
        };
        let pre_count = pre_frames.len();
        let mut frames = pre_frames;
        frames.reserve(self.params.post_impact_frames);
        self.phase = Phase::Pending(Box::new(PendingShot {
            impact,
            reference,
            frames,
            pre_count,
            detections: 0,
            farthest: f64::NEG_INFINITY,
            deadline: impact.at + self.params.acquisition_timeout,
        }));
        if self.params.post_impact_frames == 0 {
            return self.evaluate();
        }
        None
    }

    /// Feed one post-impact frame and the ball centre measured in it.
    pub fn on_post_frame(
        &mut self,
        frame: SharedFrame,
        ball: Option<Point2<f64>>,
        now: Instant,
    ) -> Option<Verdict> {
        let Phase::Pending(pending) = &mut self.phase else {
            return None;
        };
        if let Some(center) = ball {
            let d = self.params.axis.displacement(pending.reference, center);
            pending.farthest = pending.farthest.max(d);
            pending.detections += 1;
        }
        pending.frames.push(frame);
        pending.deadline = now + self.params.acquisition_timeout;
        if pending.frames.len() - pending.pre_count >= self.params.post_impact_frames {
            return self.evaluate();
        }
        None
    }

    pub fn check_timeout(&mut self, now: Instant) -> Option<Verdict> {
        let Phase::Pending(pending) = &self.phase else {
            return None;
        };
        if now < pending.deadline {
            return None;
        }
        let post_frames = pending.frames.len() - pending.pre_count;
        let impact = pending.impact;
        self.phase = Phase::Armed;
        log::warn!("impact discarded: acquisition timeout after {post_frames} post-impact frames");
        Some(Verdict::Discarded {
            impact,
            reason: DiscardReason::AcquisitionTimeout { post_frames },
        })
    }

    fn evaluate(&mut self) -> Option<Verdict> {
        let Phase::Pending(pending) = std::mem::take(&mut self.phase) else {
            return None;
        };
        let PendingShot {
            impact,
            frames,
            pre_count,
            detections,
            farthest,
            ..
        } = *pending;

        let (launched, displacement) = if detections == 0 {
            (self.params.vanished_ball_counts_as_launched, None)
        } else {
            (farthest >= self.params.displacement_threshold_px, Some(farthest))
        };

        if !launched {
            let displacement_px = displacement.unwrap_or(0.0);
            log::info!("practice swing: ball moved {displacement_px:.1} px");
            return Some(Verdict::Discarded {
                impact,
                reason: DiscardReason::PracticeSwing { displacement_px },
            });
        }

        self.shots += 1;
        match displacement {
            Some(d) => log::info!("shot {} confirmed: ball moved {d:.1} px", self.shots),
            None => log::info!("shot {} confirmed: ball left the frame", self.shots),
        }
        Some(Verdict::Confirmed(ShotCapture {
            sequence_number: self.shots,
            impact,
            frames,
            pre_impact_frames: pre_count,
            displacement_px: displacement,
        }))
    }
}
