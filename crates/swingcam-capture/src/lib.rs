//! Impact capture for swingcam.
//!
//! - [`RadarSwingTracker`]: hysteresis state machine over radar speed samples.
//! - [`FrameBuffer`]: fixed pool of shared frame slots indexed by a ring.
//! - [`BallLock`]: the resting ball displacement is measured from.
//! - [`ImpactArbiter`]: decides whether a radar impact actually launched the
//!   ball, using displacement measured in post-impact frames.
//! - [`ImpactCaptureEngine`]: threads the above together and writes replays.
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use crossbeam_channel::unbounded;
//! use parking_lot::Mutex;
//! use swingcam_ball::{BallConfig, BallLocator, ZoneMapper};
//! use swingcam_capture::{
//!     CaptureConfig, ImpactCaptureEngine, RadarPoller, RadarSwingTracker, ScriptedSpeedSource,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tracker = Arc::new(Mutex::new(RadarSwingTracker::default()));
//! let (radar_tx, radar_rx) = unbounded();
//! let (events_tx, events_rx) = unbounded();
//! let _poller = RadarPoller::spawn(ScriptedSpeedSource::new(vec![5.0, 60.0, 20.0]), tracker.clone(), radar_tx)?;
//! let engine = ImpactCaptureEngine::spawn(
//!     CaptureConfig::default(),
//!     BallLocator::new(BallConfig::default())?,
//!     ZoneMapper::default(),
//!     tracker,
//!     radar_rx,
//!     events_tx,
//! )?;
//! engine.arm()?;
//! for event in events_rx.try_iter() {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod arbiter;
mod buffer;
mod engine;
mod error;
mod lock;
mod radar;
mod recorder;
mod replay;
mod status;

pub use arbiter::{
    ArbiterParams, DiscardReason, ImpactArbiter, ImpactAxis, ImpactEvent, ShotCapture, Verdict,
};
pub use buffer::{FrameBuffer, SharedFrame, DEFAULT_CAPACITY};
pub use engine::{CaptureConfig, ImpactCaptureEngine, TriggerMode};
pub use error::{CaptureError, ReplayError};
pub use lock::{BallLock, BallLockParams, LockObservation};
pub use radar::{
    transition, RadarPoller, RadarSwingTracker, ScriptedSpeedSource, SpeedSource, SwingEvent,
    SwingState, SwingThresholds, TimedSwingEvent, Transition,
};
pub use recorder::{save_png, Recorder, RecordingSummary};
pub use replay::{replay_file_name, write_replay, ReplayConfig, ReplayFormat};
pub use status::{CaptureEvent, CaptureStatus, StatusSnapshot};

/// Durations stored as integer milliseconds in config files.
pub(crate) mod serde_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
