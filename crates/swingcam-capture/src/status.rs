use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use swingcam_ball::{BallZoneState, LiveDetection};

use crate::engine::TriggerMode;
use crate::radar::SwingState;

/// Capture phase shown to the operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    /// Not armed; frames are buffered but impacts are ignored.
    #[default]
    Idle,
    Armed,
    /// Impact received, waiting for post-impact frames.
    Pending,
    Confirmed,
}

impl CaptureStatus {
    pub fn color(self) -> &'static str {
        match self {
            CaptureStatus::Idle => "gray",
            CaptureStatus::Armed => "green",
            CaptureStatus::Pending => "orange",
            CaptureStatus::Confirmed => "red",
        }
    }
}

/// Latest published engine state. Readers get a cheap `Arc` clone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: CaptureStatus,
    pub message: String,
    pub ball: Option<LiveDetection>,
    pub ball_in_zone: bool,
    pub readiness: BallZoneState,
    pub swing: SwingState,
    /// Trigger currently in effect; falls back to camera-only when the
    /// radar link is lost.
    pub trigger: TriggerMode,
    pub speed_mph: f64,
    pub shots_captured: u32,
    pub frames_buffered: usize,
    pub recording: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaptureEvent {
    Status {
        status: CaptureStatus,
        color: String,
        message: String,
    },
    ShotCaptured {
        sequence_number: u32,
    },
    PracticeSwing {
        displacement_px: f64,
    },
    ReplayReady {
        sequence_number: u32,
        path: PathBuf,
    },
    Error {
        message: String,
    },
}

impl CaptureEvent {
    pub fn status(status: CaptureStatus, message: impl Into<String>) -> Self {
        CaptureEvent::Status {
            status,
            color: status.color().to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_colors() {
        assert_eq!(CaptureStatus::Idle.color(), "gray");
        assert_eq!(CaptureStatus::Armed.color(), "green");
        assert_eq!(CaptureStatus::Pending.color(), "orange");
        assert_eq!(CaptureStatus::Confirmed.color(), "red");
    }

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_string(&CaptureEvent::status(CaptureStatus::Armed, "ready")).unwrap();
        assert!(json.contains(r#""event":"status""#));
        assert!(json.contains(r#""color":"green""#));
        let back: CaptureEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CaptureEvent::status(CaptureStatus::Armed, "ready"));
    }
}
