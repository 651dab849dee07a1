//! Radar swing state machine.
//!
//! The tracker consumes one speed sample per poll. Transitions are a pure
//! function of `(state, speed, thresholds)` so the hysteresis policy can be
//! exercised without a radar or camera.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SwingState {
    Idle,
    InSwing { peak: f64, last: f64 },
    Impact { peak: f64 },
}

impl Default for SwingState {
    fn default() -> Self {
        SwingState::Idle
    }
}

impl SwingState {
    pub fn name(&self) -> &'static str {
        match self {
            SwingState::Idle => "idle",
            SwingState::InSwing { .. } => "in_swing",
            SwingState::Impact { .. } => "impact",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingThresholds {
    /// Speed (mph) above which a club is considered approaching.
    pub approach_mph: f64,
    /// Drop (mph) between consecutive samples that signals impact.
    pub hysteresis_mph: f64,
    #[serde(with = "crate::serde_ms")]
    pub poll_interval: Duration,
}

impl Default for SwingThresholds {
    fn default() -> Self {
        Self {
            approach_mph: 15.0,
            hysteresis_mph: 20.0,
            poll_interval: Duration::from_millis(50),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwingEvent {
    SpeedUpdated { speed: f64 },
    ClubApproaching { speed: f64 },
    ImpactDetected { peak: f64, speed: f64 },
}

/// Outcome of one transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub next: SwingState,
    /// Phase event, if the sample changed phase.
    pub event: Option<SwingEvent>,
}

/// The swing transition table.
pub fn transition(state: SwingState, speed: f64, t: &SwingThresholds) -> Transition {
    match state {
        SwingState::Idle if speed > t.approach_mph => Transition {
            next: SwingState::InSwing {
                peak: speed,
                last: speed,
            },
            event: Some(SwingEvent::ClubApproaching { speed }),
        },
        SwingState::Idle => Transition {
            next: SwingState::Idle,
            event: None,
        },
        SwingState::InSwing { peak, last } if last - speed > t.hysteresis_mph => Transition {
            next: SwingState::Impact { peak },
            event: Some(SwingEvent::ImpactDetected { peak, speed }),
        },
        // Club slowed below the approach threshold without a sharp drop.
        SwingState::InSwing { .. } if speed <= t.approach_mph => Transition {
            next: SwingState::Idle,
            event: None,
        },
        SwingState::InSwing { peak, .. } => Transition {
            next: SwingState::InSwing {
                peak: peak.max(speed),
                last: speed,
            },
            event: None,
        },
        // Single shot: the follow-through sample is consumed.
        SwingState::Impact { .. } => Transition {
            next: SwingState::Idle,
            event: None,
        },
    }
}

#[derive(Clone, Debug, Default)]
pub struct RadarSwingTracker {
    thresholds: SwingThresholds,
    state: SwingState,
}

impl RadarSwingTracker {
    pub fn new(thresholds: SwingThresholds) -> Self {
        Self {
            thresholds,
            state: SwingState::Idle,
        }
    }

    pub fn state(&self) -> SwingState {
        self.state
    }

    pub fn thresholds(&self) -> &SwingThresholds {
        &self.thresholds
    }

    pub fn reset(&mut self) {
        if self.state != SwingState::Idle {
            log::debug!("swing tracker reset from {}", self.state.name());
        }
        self.state = SwingState::Idle;
    }

    /// Feed one sample; `SpeedUpdated` comes first, then any phase event.
    pub fn on_sample(&mut self, speed: f64) -> Vec<SwingEvent> {
        let mut events = vec![SwingEvent::SpeedUpdated { speed }];
        if !speed.is_finite() {
            log::warn!("ignoring non-finite radar sample");
            return events;
        }
        let t = transition(self.state, speed, &self.thresholds);
        if let Some(ev) = t.event {
            match ev {
                SwingEvent::ClubApproaching { speed } => log::debug!("club approaching at {speed:.1} mph"),
                SwingEvent::ImpactDetected { peak, speed } => {
                    log::info!("impact: peak {peak:.1} mph dropped to {speed:.1} mph")
                }
                SwingEvent::SpeedUpdated { .. } => {}
            }
            events.push(ev);
        }
        self.state = t.next;
        events
    }
}

/// Periodic scalar speed samples from the radar link.
pub trait SpeedSource: Send {
    /// Latest speed in mph; `Ok(None)` when no reading is available this poll.
    fn poll_speed(&mut self) -> std::io::Result<Option<f64>>;
}

/// Replays a fixed list of samples, then reports no reading.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSpeedSource {
    samples: Vec<f64>,
    next: usize,
}

impl ScriptedSpeedSource {
    pub fn new(samples: impl Into<Vec<f64>>) -> Self {
        Self {
            samples: samples.into(),
            next: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.samples.len()
    }
}

impl SpeedSource for ScriptedSpeedSource {
    fn poll_speed(&mut self) -> std::io::Result<Option<f64>> {
        let s = self.samples.get(self.next).copied();
        if s.is_some() {
            self.next += 1;
        }
        Ok(s)
    }
}

/// Radar event with the wall-clock time it was produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedSwingEvent {
    pub event: SwingEvent,
    pub at: Instant,
}

/// Consecutive poll errors before the link is given up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 20;

/// Runs a shared tracker against a speed source on its own thread.
///
/// The thread exits after [`MAX_CONSECUTIVE_FAILURES`] poll errors in a row,
/// dropping its sender so the consumer sees the radar disconnect.
pub struct RadarPoller {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RadarPoller {
    pub fn spawn<S: SpeedSource + 'static>(
        mut source: S,
        tracker: Arc<Mutex<RadarSwingTracker>>,
        events: Sender<TimedSwingEvent>,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let interval = tracker.lock().thresholds().poll_interval;

        let handle = thread::Builder::new()
            .name("swingcam-radar".into())
            .spawn(move || {
                let mut next_tick = Instant::now();
                let mut failures = 0u32;
                while !stop_flag.load(Ordering::Acquire) {
                    match source.poll_speed() {
                        Ok(Some(speed)) => {
                            failures = 0;
                            let produced = tracker.lock().on_sample(speed);
                            let at = Instant::now();
                            for event in produced {
                                if events.send(TimedSwingEvent { event, at }).is_err() {
                                    return;
                                }
                            }
                        }
                        Ok(None) => failures = 0,
                        Err(e) => {
                            failures += 1;
                            if failures >= MAX_CONSECUTIVE_FAILURES {
                                log::error!("radar link lost after {failures} failed polls: {e}");
                                return;
                            }
                            log::warn!("radar poll failed: {e}");
                        }
                    }
                    next_tick += interval;
                    let now = Instant::now();
                    if next_tick > now {
                        thread::sleep(next_tick - now);
                    } else {
                        next_tick = now;
                    }
                }
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("radar poller thread panicked");
            }
        }
    }
}

impl Drop for RadarPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
