//! Threaded capture orchestration.
//!
//! Three cadences meet here. Camera frames enter through
//! [`ImpactCaptureEngine::on_frame`], which pushes into the ring under a
//! short lock and posts a non-blocking notice. Radar events arrive from a
//! [`RadarPoller`](crate::RadarPoller) channel. Readers poll
//! [`ImpactCaptureEngine::status`] for an immutable snapshot.
//!
//! The evaluation worker owns live tracking, the [`BallLock`] and the
//! [`ImpactArbiter`]; the replay worker encodes confirmed shots. Neither ever
//! blocks ingestion: both read the ring through [`SharedFrame`] handles.
//!
//! Impacts come from the radar in [`TriggerMode::Hybrid`]. When the radar
//! channel disconnects, or in [`TriggerMode::CameraOnly`], the worker opens
//! the window itself once the locked ball moves past the displacement
//! threshold.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, never, select, Receiver, Sender, TrySendError};
use nalgebra::Point2;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use swingcam_ball::{BallLocator, ReadinessMonitor, ReadinessParams, Roi, ZoneMapper};
use swingcam_core::Frame;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::arbiter::{ArbiterParams, DiscardReason, ImpactArbiter, ImpactEvent, ShotCapture, Verdict};
use crate::buffer::{FrameBuffer, SharedFrame, DEFAULT_CAPACITY};
use crate::lock::{BallLock, BallLockParams, LockObservation};
use crate::radar::{RadarSwingTracker, SwingEvent, TimedSwingEvent};
use crate::recorder::{save_png, Recorder, RecordingSummary};
use crate::replay::{write_replay, ReplayConfig};
use crate::status::{CaptureEvent, CaptureStatus, StatusSnapshot};
use crate::{CaptureError, ReplayError};

/// Which sensor opens an impact window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Radar impact, confirmed by ball displacement.
    #[default]
    Hybrid,
    /// Ball displacement alone.
    CameraOnly,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Starting trigger; `Hybrid` falls back to `CameraOnly` when the radar
    /// channel disconnects.
    pub trigger: TriggerMode,
    pub buffer_capacity: usize,
    pub arbiter: ArbiterParams,
    pub ball_lock: BallLockParams,
    /// Half-size of the window searched around the pre-impact ball in
    /// post-impact frames.
    pub post_search_half_px: f64,
    pub replay: ReplayConfig,
    pub readiness: ReadinessParams,
    pub notice_queue: usize,
    pub replay_queue: usize,
    pub recording_queue: usize,
    /// Worker wake-up period for timeout checks.
    #[serde(with = "crate::serde_ms")]
    pub tick: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerMode::Hybrid,
            buffer_capacity: DEFAULT_CAPACITY,
            arbiter: ArbiterParams::default(),
            ball_lock: BallLockParams::default(),
            post_search_half_px: 150.0,
            replay: ReplayConfig::default(),
            readiness: ReadinessParams::default(),
            notice_queue: 8,
            replay_queue: 4,
            recording_queue: 256,
            tick: Duration::from_millis(20),
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        let bad = |msg: &str| Err(CaptureError::InvalidParameters(msg.to_string()));
        if self.buffer_capacity == 0 {
            return bad("buffer_capacity must be positive");
        }
        if self.arbiter.post_impact_frames == 0 {
            return bad("post_impact_frames must be positive");
        }
        if !(self.arbiter.displacement_threshold_px > 0.0) {
            return bad("displacement_threshold_px must be positive");
        }
        if !(self.ball_lock.same_ball_px > self.arbiter.displacement_threshold_px) {
            return bad("ball_lock.same_ball_px must exceed displacement_threshold_px");
        }
        if self.ball_lock.release_after_misses == 0 {
            return bad("ball_lock.release_after_misses must be positive");
        }
        if !(self.post_search_half_px > 0.0) {
            return bad("post_search_half_px must be positive");
        }
        if !(self.replay.capture_fps > 0.0 && self.replay.speed_multiplier > 0.0) {
            return bad("replay rate must be positive");
        }
        if self.notice_queue == 0 || self.replay_queue == 0 {
            return bad("queue sizes must be positive");
        }
        Ok(())
    }
}

enum Command {
    Arm,
    Disarm,
    Reset,
    SetZone(Box<ZoneMapper>),
    Shutdown,
}

struct ReplayJob {
    shot: ShotCapture,
    generation: u64,
}

struct Shared {
    buffer: Mutex<FrameBuffer>,
    status: RwLock<Arc<StatusSnapshot>>,
    tracker: Arc<Mutex<RadarSwingTracker>>,
    recorder: Mutex<Option<Recorder>>,
    /// Bumped by every explicit reset; in-flight work from an older
    /// generation is abandoned.
    generation: AtomicU64,
}

impl Shared {
    fn publish(&self, update: impl FnOnce(&mut StatusSnapshot)) -> Arc<StatusSnapshot> {
        let mut guard = self.status.write();
        let mut next = StatusSnapshot::clone(&guard);
        update(&mut next);
        let next = Arc::new(next);
        *guard = next.clone();
        next
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

fn emit(events: &Sender<CaptureEvent>, event: CaptureEvent) {
    if let Err(TrySendError::Full(ev)) = events.try_send(event) {
        log::warn!("capture event dropped: {ev:?}");
    }
}

/// Frame buffering plus radar and vision impact confirmation.
pub struct ImpactCaptureEngine {
    shared: Arc<Shared>,
    notices: Sender<u64>,
    commands: Sender<Command>,
    recording_queue: usize,
    worker: Option<JoinHandle<()>>,
    replay_worker: Option<JoinHandle<()>>,
}

impl ImpactCaptureEngine {
    /// Start the evaluation and replay workers.
    ///
    /// Without a radar, pass the receiver of a dropped sender: the worker
    /// sees the disconnect and runs camera-only.
    pub fn spawn(
        config: CaptureConfig,
        locator: BallLocator,
        zone: ZoneMapper,
        tracker: Arc<Mutex<RadarSwingTracker>>,
        radar: Receiver<TimedSwingEvent>,
        events: Sender<CaptureEvent>,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        let shared = Arc::new(Shared {
            buffer: Mutex::new(FrameBuffer::new(config.buffer_capacity)),
            status: RwLock::new(Arc::new(StatusSnapshot {
                message: "Capture idle".into(),
                trigger: config.trigger,
                ..StatusSnapshot::default()
            })),
            tracker,
            recorder: Mutex::new(None),
            generation: AtomicU64::new(0),
        });

        let (notice_tx, notice_rx) = bounded::<u64>(config.notice_queue);
        let (command_tx, command_rx) = bounded::<Command>(16);
        let (replay_tx, replay_rx) = bounded::<ReplayJob>(config.replay_queue);

        let replay_worker = {
            let shared = shared.clone();
            let events = events.clone();
            let replay = config.replay.clone();
            thread::Builder::new()
                .name("swingcam-replay".into())
                .spawn(move || replay_loop(replay_rx, &shared, &replay, &events))
                .map_err(|source| CaptureError::Io {
                    path: config.replay.output_dir.clone(),
                    source,
                })?
        };

        let recording_queue = config.recording_queue;
        let mut worker = Worker {
            arbiter: ImpactArbiter::new(config.arbiter.clone()),
            readiness: ReadinessMonitor::new(config.readiness),
            lock: BallLock::new(config.ball_lock),
            trigger: config.trigger,
            config,
            shared: shared.clone(),
            locator,
            zone,
            events,
            replay: replay_tx,
            armed: false,
            last_seen: None,
            impact_generation: 0,
        };
        let worker = thread::Builder::new()
            .name("swingcam-capture".into())
            .spawn(move || worker.run(notice_rx, command_rx, radar))
            .map_err(|source| CaptureError::Io {
                path: PathBuf::new(),
                source,
            })?;

        Ok(Self {
            shared,
            notices: notice_tx,
            commands: command_tx,
            recording_queue,
            worker: Some(worker),
            replay_worker: Some(replay_worker),
        })
    }

    /// Ingest one frame. Bounded work: one ring push under a short lock and
    /// a non-blocking notice to the evaluation worker.
    pub fn on_frame(&self, frame: &Frame) -> Result<(), CaptureError> {
        self.shared.buffer.lock().push(frame);
        if let Some(recorder) = self.shared.recorder.lock().as_mut() {
            recorder.push(frame);
        }
        match self.notices.try_send(frame.sequence) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Disconnected(_)) => Err(CaptureError::Stopped),
        }
    }

    pub fn status(&self) -> Arc<StatusSnapshot> {
        self.shared.status.read().clone()
    }

    pub fn tracker(&self) -> Arc<Mutex<RadarSwingTracker>> {
        self.shared.tracker.clone()
    }

    pub fn arm(&self) -> Result<(), CaptureError> {
        self.send(Command::Arm)
    }

    pub fn disarm(&self) -> Result<(), CaptureError> {
        self.send(Command::Disarm)
    }

    /// Drop any pending impact, return the swing tracker to idle and abandon
    /// in-flight replay encoding.
    pub fn reset(&self) -> Result<(), CaptureError> {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        self.shared.tracker.lock().reset();
        self.send(Command::Reset)
    }

    pub fn set_zone(&self, zone: ZoneMapper) -> Result<(), CaptureError> {
        self.send(Command::SetZone(Box::new(zone)))
    }

    /// Save the newest buffered frame as a PNG.
    pub fn screenshot(&self, path: &Path) -> Result<u64, CaptureError> {
        let frame = self.shared.buffer.lock().latest_handle();
        let frame = frame.ok_or(CaptureError::NoFrame)?;
        save_png(&frame, path)?;
        log::info!("screenshot of frame {} saved to {}", frame.sequence, path.display());
        Ok(frame.sequence)
    }

    pub fn start_recording(&self, dir: impl Into<PathBuf>) -> Result<(), CaptureError> {
        let mut slot = self.shared.recorder.lock();
        if slot.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        *slot = Some(Recorder::start(dir, self.recording_queue)?);
        drop(slot);
        self.shared.publish(|s| s.recording = true);
        Ok(())
    }

    /// Stop the raw recording; `None` when none was active.
    pub fn stop_recording(&self) -> Option<RecordingSummary> {
        let recorder = self.shared.recorder.lock().take()?;
        let summary = recorder.finish();
        self.shared.publish(|s| s.recording = false);
        Some(summary)
    }

    fn send(&self, cmd: Command) -> Result<(), CaptureError> {
        self.commands.send(cmd).map_err(|_| CaptureError::Stopped)
    }

    pub fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        for handle in [self.worker.take(), self.replay_worker.take()].into_iter().flatten() {
            if handle.join().is_err() {
                log::error!("capture worker panicked");
            }
        }
        if let Some(recorder) = self.shared.recorder.lock().take() {
            recorder.finish();
        }
    }
}

impl Drop for ImpactCaptureEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    config: CaptureConfig,
    shared: Arc<Shared>,
    locator: BallLocator,
    zone: ZoneMapper,
    arbiter: ImpactArbiter,
    readiness: ReadinessMonitor,
    lock: BallLock,
    trigger: TriggerMode,
    events: Sender<CaptureEvent>,
    replay: Sender<ReplayJob>,
    armed: bool,
    /// Newest frame already handled; later frames are fresh.
    last_seen: Option<u64>,
    impact_generation: u64,
}

impl Worker {
    fn run(&mut self, notices: Receiver<u64>, commands: Receiver<Command>, radar: Receiver<TimedSwingEvent>) {
        let mut radar = radar;
        loop {
            let mut radar_closed = false;
            select! {
                recv(commands) -> cmd => match cmd {
                    Ok(Command::Shutdown) | Err(_) => break,
                    Ok(cmd) => self.on_command(cmd),
                },
                recv(radar) -> ev => match ev {
                    Ok(ev) => self.on_swing(ev),
                    Err(_) => radar_closed = true,
                },
                recv(notices) -> n => match n {
                    Ok(_) => self.drain_frames(),
                    Err(_) => break,
                },
                default(self.config.tick) => {}
            }
            if radar_closed {
                radar = never();
                self.radar_lost();
            }
            if let Some(verdict) = self.arbiter.check_timeout(Instant::now()) {
                self.on_verdict(verdict);
            }
        }
        log::debug!("capture worker stopped");
    }

    fn set_status(&self, status: CaptureStatus, message: &str) {
        let shots = self.arbiter.shot_count();
        self.shared.publish(|s| {
            s.status = status;
            s.message = message.to_string();
            s.shots_captured = shots;
        });
        emit(&self.events, CaptureEvent::status(status, message));
    }

    fn radar_lost(&mut self) {
        if self.trigger == TriggerMode::CameraOnly {
            log::debug!("radar channel closed");
            return;
        }
        log::warn!("radar link lost - using camera-only detection");
        self.trigger = TriggerMode::CameraOnly;
        let trigger = self.trigger;
        let status = self.shared.publish(|s| s.trigger = trigger).status;
        self.set_status(status, "Radar unavailable - using camera-only detection");
    }

    fn idle_status(&self) -> (CaptureStatus, &'static str) {
        if self.armed {
            (CaptureStatus::Armed, "Ready for next shot")
        } else {
            (CaptureStatus::Idle, "Capture idle")
        }
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Arm => {
                self.armed = true;
                log::info!("capture armed");
                self.set_status(CaptureStatus::Armed, "Capture armed - waiting for ball");
            }
            Command::Disarm => {
                self.armed = false;
                self.arbiter.cancel();
                log::info!("capture disarmed");
                self.set_status(CaptureStatus::Idle, "Capture stopped");
            }
            Command::Reset => {
                if self.arbiter.cancel() {
                    log::info!("pending impact cleared by reset");
                }
                self.rearm();
            }
            Command::SetZone(zone) => {
                self.zone = *zone;
                self.readiness.reset();
                self.locator.reset_tracking();
                self.lock.release();
            }
            Command::Shutdown => {}
        }
    }

    fn on_swing(&mut self, ev: TimedSwingEvent) {
        let swing = self.shared.tracker.lock().state();
        match ev.event {
            SwingEvent::SpeedUpdated { speed } => {
                self.shared.publish(|s| {
                    s.speed_mph = speed;
                    s.swing = swing;
                });
            }
            SwingEvent::ClubApproaching { speed } => {
                log::debug!("club approaching at {speed:.1} mph");
                self.shared.publish(|s| s.swing = swing);
            }
            SwingEvent::ImpactDetected { peak, .. } => match self.trigger {
                TriggerMode::Hybrid => self.on_radar_impact(ev.at, peak),
                TriggerMode::CameraOnly => log::debug!("radar impact ignored in camera-only mode"),
            },
        }
    }

    fn on_radar_impact(&mut self, at: Instant, peak: f64) {
        if !self.armed {
            log::debug!("impact ignored: capture not armed");
            return;
        }
        if self.arbiter.is_pending() {
            log::debug!("impact ignored: evaluation already pending");
            return;
        }
        // Frames that arrived after the radar fired are post-impact even if
        // the worker has not looked at them yet.
        let cut = self.shared.buffer.lock().last_received_by(at);
        if self.open_window(at, Some(peak), cut) {
            self.drain_frames();
        }
    }

    /// Start evaluating an impact whose last pre-impact frame is `cut`.
    /// Returns `true` while the window stays open.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, at)))]
    fn open_window(&mut self, at: Instant, peak: Option<f64>, cut: Option<u64>) -> bool {
        let pre_frames = match cut {
            Some(seq) => self.shared.buffer.lock().snapshot_until(seq),
            None => Vec::new(),
        };
        let impact = ImpactEvent {
            at,
            pre_impact: self.arbiter_reference(),
            snapshot_sequence: cut,
            peak_mph: peak,
        };
        self.last_seen = cut;
        self.impact_generation = self.shared.generation();
        match peak {
            Some(peak) => log::info!("radar impact at {peak:.1} mph, {} pre-impact frames", pre_frames.len()),
            None => log::info!("camera impact, {} pre-impact frames", pre_frames.len()),
        }
        match self.arbiter.on_impact(impact, pre_frames) {
            Some(verdict) => {
                self.on_verdict(verdict);
                false
            }
            None => {
                self.set_status(CaptureStatus::Pending, "Impact detected - confirming");
                true
            }
        }
    }

    /// Process frames newer than the last one seen.
    fn drain_frames(&mut self) {
        loop {
            let fresh: Vec<SharedFrame> = {
                let buffer = self.shared.buffer.lock();
                match self.last_seen {
                    Some(seen) => buffer.frames_after(seen),
                    None if self.arbiter.is_pending() => buffer.snapshot(),
                    None => buffer.latest_handle().into_iter().collect(),
                }
            };
            let Some(newest) = fresh.last().cloned() else {
                return;
            };
            self.last_seen = Some(newest.sequence);

            if self.arbiter.is_pending() {
                for frame in fresh {
                    let ball = self.measure_post_impact(&frame);
                    if let Some(verdict) = self.arbiter.on_post_frame(frame, ball, Instant::now()) {
                        self.on_verdict(verdict);
                        break;
                    }
                }
                return;
            }
            // A camera trigger rewinds `last_seen`; go round again so the
            // triggering frame is read as post-impact.
            if !self.track(&newest) {
                return;
            }
        }
    }

    fn measure_post_impact(&self, frame: &Frame) -> Option<Point2<f64>> {
        let reference = self.arbiter_reference()?;
        let roi = Roi::around(reference, self.config.post_search_half_px, frame.width(), frame.height());
        self.locator
            .detector()
            .detect(&frame.view(), roi)
            .ok()
            .map(|ball| ball.center)
    }

    /// Ball position displacement is measured from.
    fn arbiter_reference(&self) -> Option<Point2<f64>> {
        self.lock
            .reference()
            .or_else(|| self.locator.calibrated_ball().map(|b| b.center))
    }

    /// Live tracking on the newest frame. Returns `true` when the frame
    /// opened a camera-triggered impact window.
    fn track(&mut self, frame: &Frame) -> bool {
        let detection = self.locator.detect_live(frame, &self.zone);
        let measured = (detection.detected && !detection.predicted).then_some(detection.center);
        let observation = self.lock.observe(measured);
        match observation {
            LockObservation::Acquired(c) => log::info!("ball locked at ({:.1}, {:.1})", c.x, c.y),
            LockObservation::Foreign { distance } => {
                log::debug!("detection {distance:.0} px from the locked ball ignored")
            }
            LockObservation::Released => log::info!("ball lock released"),
            LockObservation::Same { .. } | LockObservation::Missing => {}
        }
        let readiness = self.readiness.update(&detection);
        if readiness.changed {
            log::debug!("ball state {:?}", readiness.state);
        }
        let frames_buffered = self.shared.buffer.lock().len();
        self.shared.publish(|s| {
            s.ball = detection.detected.then_some(detection);
            s.ball_in_zone = detection.detected && detection.in_zone;
            s.readiness = readiness.state;
            s.frames_buffered = frames_buffered;
        });
        match observation {
            LockObservation::Same { .. } => self.camera_trigger(frame, measured),
            LockObservation::Foreign { .. } | LockObservation::Missing => self.camera_trigger(frame, None),
            LockObservation::Acquired(_) | LockObservation::Released => false,
        }
    }

    /// Camera-only impact: the locked ball moved past the threshold or is
    /// gone from its spot. `center` is the live measurement when it matched
    /// the lock; otherwise the spot is searched directly.
    fn camera_trigger(&mut self, frame: &Frame, center: Option<Point2<f64>>) -> bool {
        if self.trigger != TriggerMode::CameraOnly || !self.armed || self.arbiter.is_pending() {
            return false;
        }
        let Some(reference) = self.lock.reference() else {
            return false;
        };
        let center = center.or_else(|| self.locate_near(frame, reference));
        match center {
            Some(center) => {
                let moved = self.config.arbiter.axis.displacement(reference, center);
                if moved <= self.config.arbiter.displacement_threshold_px {
                    return false;
                }
                log::info!("camera detected impact: locked ball moved {moved:.1} px");
            }
            None => log::info!("camera detected impact: locked ball left its spot"),
        }
        self.open_window(Instant::now(), None, frame.sequence.checked_sub(1))
    }

    /// Ball within `same_ball_px` of `reference`, if any.
    fn locate_near(&self, frame: &Frame, reference: Point2<f64>) -> Option<Point2<f64>> {
        let half = self.lock.params().same_ball_px;
        let roi = Roi::around(reference, half, frame.width(), frame.height());
        let ball = self.locator.detector().detect(&frame.view(), roi).ok()?;
        ((ball.center - reference).norm() < half).then_some(ball.center)
    }

    fn on_verdict(&mut self, verdict: Verdict) {
        if self.shared.generation() != self.impact_generation {
            log::info!("verdict dropped: reset since impact");
            self.rearm();
            return;
        }
        match verdict {
            Verdict::Confirmed(shot) => {
                let sequence_number = shot.sequence_number;
                self.set_status(CaptureStatus::Confirmed, "Capturing impact");
                emit(&self.events, CaptureEvent::ShotCaptured { sequence_number });
                let job = ReplayJob {
                    shot,
                    generation: self.impact_generation,
                };
                if let Err(e) = self.replay.try_send(job) {
                    let message = match e {
                        TrySendError::Full(_) => format!("replay queue full, shot {sequence_number} not saved"),
                        TrySendError::Disconnected(_) => "replay worker stopped".to_string(),
                    };
                    log::error!("{message}");
                    emit(&self.events, CaptureEvent::Error { message });
                }
            }
            Verdict::Discarded { reason, .. } => match reason {
                DiscardReason::PracticeSwing { displacement_px } => {
                    emit(&self.events, CaptureEvent::PracticeSwing { displacement_px });
                }
                DiscardReason::AcquisitionTimeout { post_frames } => emit(
                    &self.events,
                    CaptureEvent::Error {
                        message: format!("acquisition timeout after {post_frames} post-impact frames"),
                    },
                ),
                DiscardReason::NoReference => emit(
                    &self.events,
                    CaptureEvent::Error {
                        message: "impact ignored: no ball position known".into(),
                    },
                ),
            },
        }
        self.rearm();
    }

    /// Back to waiting for the next shot with a fresh buffer and tracker.
    fn rearm(&mut self) {
        self.shared.buffer.lock().clear();
        self.shared.tracker.lock().reset();
        self.locator.reset_tracking();
        self.readiness.reset();
        self.lock.release();
        let swing = self.shared.tracker.lock().state();
        self.shared.publish(|s| {
            s.ball = None;
            s.ball_in_zone = false;
            s.readiness = Default::default();
            s.swing = swing;
            s.frames_buffered = 0;
        });
        let (status, message) = self.idle_status();
        self.set_status(status, message);
    }
}

fn replay_loop(jobs: Receiver<ReplayJob>, shared: &Shared, config: &ReplayConfig, events: &Sender<CaptureEvent>) {
    for job in jobs.iter() {
        let sequence_number = job.shot.sequence_number;
        let cancelled = || shared.generation() != job.generation;
        match write_replay(&job.shot.frames, config, sequence_number, cancelled) {
            Ok(path) => emit(events, CaptureEvent::ReplayReady { sequence_number, path }),
            Err(ReplayError::Cancelled) => log::info!("replay for shot {sequence_number} abandoned"),
            Err(e) => {
                log::error!("replay for shot {sequence_number} failed: {e}");
                emit(
                    events,
                    CaptureEvent::Error {
                        message: format!("replay for shot {sequence_number} failed: {e}"),
                    },
                );
            }
        }
    }
}
