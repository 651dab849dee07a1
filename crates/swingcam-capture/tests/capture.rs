use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use parking_lot::Mutex;
use swingcam_ball::{BallConfig, BallDetectParams, BallLocator, RadiusRange, ZoneMapper};
use swingcam_capture::{
    CaptureConfig, CaptureEvent, CaptureStatus, ImpactCaptureEngine, RadarSwingTracker, ReplayConfig,
    SwingEvent, SwingState, TimedSwingEvent, TriggerMode,
};
use swingcam_core::{Frame, GrayImage};

const W: usize = 200;
const H: usize = 160;

fn render_ball(cx: f64, cy: f64, r: f64) -> GrayImage {
    let mut img = GrayImage::new(W, H);
    for y in 0..H {
        for x in 0..W {
            let mut inside = 0;
            for sy in 0..4 {
                for sx in 0..4 {
                    let px = x as f64 + (sx as f64 + 0.5) / 4.0 - cx;
                    let py = y as f64 + (sy as f64 + 0.5) / 4.0 - cy;
                    if px * px + py * py <= r * r {
                        inside += 1;
                    }
                }
            }
            let t = inside as f64 / 16.0;
            img.put(x, y, (40.0 + t * (235.0 - 40.0)).round() as u8);
        }
    }
    img
}

struct Rig {
    engine: ImpactCaptureEngine,
    radar: Option<Sender<TimedSwingEvent>>,
    events: Receiver<CaptureEvent>,
    next_seq: u64,
    _dir: tempfile::TempDir,
}

impl Rig {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = CaptureConfig {
            replay: ReplayConfig {
                output_dir: dir.path().to_path_buf(),
                gif_speed: 30,
                ..ReplayConfig::default()
            },
            ..CaptureConfig::default()
        };
        let locator = BallLocator::new(BallConfig {
            detect: BallDetectParams {
                radius_range: RadiusRange::new(6.0, 24.0).unwrap(),
                ..BallDetectParams::default()
            },
            ..BallConfig::default()
        })
        .unwrap();
        let tracker = Arc::new(Mutex::new(RadarSwingTracker::default()));
        let (radar_tx, radar_rx) = unbounded();
        let (events_tx, events_rx) = unbounded();
        let engine =
            ImpactCaptureEngine::spawn(config, locator, ZoneMapper::default(), tracker, radar_rx, events_tx)
                .unwrap();
        Self {
            engine,
            radar: Some(radar_tx),
            events: events_rx,
            next_seq: 0,
            _dir: dir,
        }
    }

    fn out_dir(&self) -> &Path {
        self._dir.path()
    }

    fn push_frames(&mut self, n: usize, cx: f64, cy: f64) {
        let image = render_ball(cx, cy, 10.0);
        for _ in 0..n {
            let seq = self.next_seq;
            self.next_seq += 1;
            let frame = Frame::new(image.clone(), Duration::from_millis(5 * seq), seq);
            self.engine.on_frame(&frame).unwrap();
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn impact(&self) {
        self.impact_at(Instant::now());
    }

    fn impact_at(&self, at: Instant) {
        self.radar
            .as_ref()
            .expect("radar link dropped")
            .send(TimedSwingEvent {
                event: SwingEvent::ImpactDetected {
                    peak: 90.0,
                    speed: 30.0,
                },
                at,
            })
            .unwrap();
    }

    /// Simulate the radar thread exiting.
    fn drop_radar(&mut self) {
        self.radar = None;
    }

    fn wait_status(&self, want: CaptureStatus) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.engine.status().status != want {
            assert!(Instant::now() < deadline, "status never became {want:?}");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn wait_trigger(&self, want: TriggerMode) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.engine.status().trigger != want {
            assert!(Instant::now() < deadline, "trigger never became {want:?}");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn wait_ball(&self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.engine.status().ball.is_none() {
            assert!(Instant::now() < deadline, "ball never acquired");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn wait_event(&self, pred: impl Fn(&CaptureEvent) -> bool) -> CaptureEvent {
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(left) {
                Ok(ev) if pred(&ev) => return ev,
                Ok(_) => {}
                Err(_) => panic!("expected event did not arrive"),
            }
        }
    }

    /// Arm, settle a ball at (100, 80), then report an impact.
    fn prime(&mut self) {
        self.engine.arm().unwrap();
        self.wait_status(CaptureStatus::Armed);
        self.push_frames(10, 100.0, 80.0);
        self.wait_ball();
        self.impact();
        self.wait_status(CaptureStatus::Pending);
    }
}

#[test]
fn launched_ball_is_confirmed_and_replayed() {
    let mut rig = Rig::new();
    rig.prime();
    rig.push_frames(20, 150.0, 80.0);

    let shot = rig.wait_event(|e| matches!(e, CaptureEvent::ShotCaptured { .. }));
    assert_eq!(shot, CaptureEvent::ShotCaptured { sequence_number: 1 });

    let path = match rig.wait_event(|e| matches!(e, CaptureEvent::ReplayReady { .. })) {
        CaptureEvent::ReplayReady { sequence_number, path } => {
            assert_eq!(sequence_number, 1);
            path
        }
        _ => unreachable!(),
    };
    assert_eq!(path, rig.out_dir().join("shot_001_replay.gif"));

    let decoder = GifDecoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 30);

    rig.wait_status(CaptureStatus::Armed);
    let status = rig.engine.status();
    assert_eq!(status.shots_captured, 1);
    assert_eq!(status.swing, SwingState::Idle);
}

#[test]
fn practice_swing_is_discarded_without_artifact() {
    let mut rig = Rig::new();
    rig.prime();
    rig.push_frames(20, 102.0, 80.0);

    match rig.wait_event(|e| matches!(e, CaptureEvent::PracticeSwing { .. })) {
        CaptureEvent::PracticeSwing { displacement_px } => assert!(displacement_px < 10.0),
        _ => unreachable!(),
    }
    rig.wait_event(|e| matches!(e, CaptureEvent::Status { status: CaptureStatus::Armed, .. }));

    let status = rig.engine.status();
    assert_eq!(status.shots_captured, 0);
    assert_eq!(status.frames_buffered, 0);
    assert_eq!(std::fs::read_dir(rig.out_dir()).unwrap().count(), 0);
}

#[test]
fn stalled_camera_times_out_and_rearms() {
    let mut rig = Rig::new();
    rig.prime();

    match rig.wait_event(|e| matches!(e, CaptureEvent::Error { .. })) {
        CaptureEvent::Error { message } => assert!(message.contains("acquisition timeout")),
        _ => unreachable!(),
    }
    rig.wait_status(CaptureStatus::Armed);
}

#[test]
fn reset_clears_pending_impact() {
    let mut rig = Rig::new();
    rig.prime();
    rig.engine.reset().unwrap();
    rig.wait_status(CaptureStatus::Armed);
    assert_eq!(rig.engine.tracker().lock().state(), SwingState::Idle);

    rig.push_frames(20, 150.0, 80.0);
    thread::sleep(Duration::from_millis(100));
    let captured = rig
        .events
        .try_iter()
        .any(|e| matches!(e, CaptureEvent::ShotCaptured { .. }));
    assert!(!captured);
}

#[test]
fn impacts_are_ignored_until_armed() {
    let mut rig = Rig::new();
    rig.push_frames(5, 100.0, 80.0);
    rig.impact();
    rig.push_frames(5, 150.0, 80.0);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(rig.engine.status().status, CaptureStatus::Idle);
}

#[test]
fn screenshot_and_manual_recording() {
    let mut rig = Rig::new();
    let shot_path = rig.out_dir().join("screen.png");
    assert!(rig.engine.screenshot(&shot_path).is_err());

    let raw = rig.out_dir().join("raw");
    rig.engine.start_recording(&raw).unwrap();
    assert!(rig.engine.start_recording(&raw).is_err());
    assert!(rig.engine.status().recording);
    rig.push_frames(6, 100.0, 80.0);
    let summary = rig.engine.stop_recording().unwrap();
    assert_eq!(summary.written + summary.dropped, 6);
    assert!(!rig.engine.status().recording);
    assert!(rig.engine.stop_recording().is_none());

    assert_eq!(rig.engine.screenshot(&shot_path).unwrap(), 5);
    assert!(shot_path.exists());
}

#[test]
fn camera_only_fallback_confirms_launch_after_radar_loss() {
    let mut rig = Rig::new();
    assert_eq!(rig.engine.status().trigger, TriggerMode::Hybrid);
    rig.engine.arm().unwrap();
    rig.wait_status(CaptureStatus::Armed);
    rig.push_frames(10, 100.0, 80.0);
    rig.wait_ball();

    rig.drop_radar();
    rig.wait_trigger(TriggerMode::CameraOnly);
    let ev = rig.wait_event(|e| matches!(e, CaptureEvent::Status { message, .. } if message.contains("camera-only")));
    assert!(matches!(ev, CaptureEvent::Status { status: CaptureStatus::Armed, .. }));

    // 20 px: inside the live tracking window, over the launch threshold.
    rig.push_frames(40, 120.0, 80.0);
    let shot = rig.wait_event(|e| matches!(e, CaptureEvent::ShotCaptured { .. }));
    assert_eq!(shot, CaptureEvent::ShotCaptured { sequence_number: 1 });
    rig.wait_event(|e| matches!(e, CaptureEvent::ReplayReady { .. }));
    rig.wait_status(CaptureStatus::Armed);
    assert_eq!(rig.engine.status().trigger, TriggerMode::CameraOnly);
}

#[test]
fn late_radar_report_cuts_at_impact_time() {
    let mut rig = Rig::new();
    rig.engine.arm().unwrap();
    rig.wait_status(CaptureStatus::Armed);
    rig.push_frames(10, 100.0, 80.0);
    rig.wait_ball();
    let at = Instant::now();
    thread::sleep(Duration::from_millis(5));

    // The ball is already gone by the time the radar report is handled.
    rig.push_frames(20, 160.0, 80.0);
    thread::sleep(Duration::from_millis(50));
    rig.impact_at(at);

    // Frames pushed after `at` are post-impact; no further frames are needed.
    let shot = rig.wait_event(|e| matches!(e, CaptureEvent::ShotCaptured { .. }));
    assert_eq!(shot, CaptureEvent::ShotCaptured { sequence_number: 1 });
    let path = match rig.wait_event(|e| matches!(e, CaptureEvent::ReplayReady { .. })) {
        CaptureEvent::ReplayReady { path, .. } => path,
        _ => unreachable!(),
    };
    let decoder = GifDecoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_eq!(decoder.into_frames().collect_frames().unwrap().len(), 30);
}

#[test]
fn camera_only_confirms_ball_that_jumps_out_of_the_lock() {
    let mut rig = Rig::new();
    rig.drop_radar();
    rig.wait_trigger(TriggerMode::CameraOnly);
    rig.engine.arm().unwrap();
    rig.wait_status(CaptureStatus::Armed);
    rig.push_frames(10, 100.0, 80.0);
    rig.wait_ball();

    // 50 px in one frame: outside the tracking window and the same-ball radius.
    rig.push_frames(30, 150.0, 80.0);
    let shot = rig.wait_event(|e| matches!(e, CaptureEvent::ShotCaptured { .. }));
    assert_eq!(shot, CaptureEvent::ShotCaptured { sequence_number: 1 });
}

#[test]
fn camera_only_ignores_a_resting_ball() {
    let mut rig = Rig::new();
    rig.drop_radar();
    rig.wait_trigger(TriggerMode::CameraOnly);
    rig.engine.arm().unwrap();
    rig.wait_status(CaptureStatus::Armed);
    rig.push_frames(40, 100.0, 80.0);
    rig.push_frames(20, 102.0, 80.0);
    thread::sleep(Duration::from_millis(100));
    assert!(!rig.events.try_iter().any(|e| matches!(e, CaptureEvent::ShotCaptured { .. })));
    assert_eq!(rig.engine.status().status, CaptureStatus::Armed);
}
