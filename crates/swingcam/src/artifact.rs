//! Persisted calibration state.
//!
//! Everything needed to resume without recalibrating: intrinsics, ground
//! pose with its marker correspondences, zone quad and calibrated ball.
//! Every section is optional so a partial calibration round-trips.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use swingcam_ball::{BallLocator, BallModel, BallSource, ZoneError, ZoneMapper, ZoneQuad, ZoneSource};
use swingcam_calib::{format_summary, ExtrinsicCalibration, GeometricCalibrator, IntrinsicProfile};

pub const ARTIFACT_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum ArtifactError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("artifact version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("stored zone rejected: {0}")]
    Zone(#[from] ZoneError),
}

fn current_version() -> u32 {
    ARTIFACT_VERSION
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationArtifact {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub intrinsics: Option<IntrinsicProfile>,
    /// Ground pose plus the four marker correspondences it was solved from.
    #[serde(default)]
    pub extrinsic: Option<ExtrinsicCalibration>,
    #[serde(default)]
    pub zone: Option<ZoneQuad>,
    #[serde(default)]
    pub ball: Option<BallModel>,
    /// Text summary at the time of saving; informational only.
    #[serde(default)]
    pub summary: String,
}

impl Default for CalibrationArtifact {
    fn default() -> Self {
        Self {
            version: ARTIFACT_VERSION,
            intrinsics: None,
            extrinsic: None,
            zone: None,
            ball: None,
            summary: String::new(),
        }
    }
}

impl CalibrationArtifact {
    /// Snapshot the current calibration state.
    pub fn capture(calibrator: &GeometricCalibrator, zone: &ZoneMapper, locator: &BallLocator) -> Self {
        let mut artifact = Self {
            version: ARTIFACT_VERSION,
            intrinsics: calibrator.intrinsics().cloned(),
            extrinsic: calibrator.extrinsic().cloned(),
            zone: zone.quad().cloned(),
            ball: locator.calibrated_ball().copied(),
            summary: String::new(),
        };
        artifact.summary = artifact.describe();
        artifact
    }

    /// Push the stored state into live components.
    pub fn apply(
        &self,
        calibrator: &mut GeometricCalibrator,
        zone: &mut ZoneMapper,
        locator: &mut BallLocator,
    ) -> Result<(), ArtifactError> {
        calibrator.restore(self.intrinsics.clone(), self.extrinsic.clone());
        match &self.zone {
            Some(quad) => {
                zone.restore(quad.clone())?;
            }
            None => zone.clear(),
        }
        locator.restore(self.ball);
        if let (Some(intrinsics), Some(extrinsic)) = (&self.intrinsics, &self.extrinsic) {
            if let Err(e) = locator.apply_calibration(intrinsics, &extrinsic.pose) {
                log::warn!("stored pose gives no usable ball radius range: {e}");
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.intrinsics.is_none() && self.extrinsic.is_none() && self.zone.is_none() && self.ball.is_none()
    }

    /// Calibration summary with ball and zone lines.
    pub fn describe(&self) -> String {
        let mut s = format_summary(self.intrinsics.as_ref(), self.extrinsic.as_ref().map(|e| &e.pose));
        match &self.ball {
            Some(b) => {
                let source = match b.source {
                    BallSource::Automatic => "automatic",
                    BallSource::Manual => "manual",
                    BallSource::Live => "live",
                };
                let _ = writeln!(
                    s,
                    "Ball: ({:.1}, {:.1}) radius {:.1} px, confidence {:.2} ({source})",
                    b.center.x, b.center.y, b.radius, b.confidence
                );
            }
            None => s.push_str("Ball: not set\n"),
        }
        match &self.zone {
            Some(q) => {
                let source = match q.source {
                    ZoneSource::Markers => "markers",
                    ZoneSource::Manual => "manual",
                };
                let _ = writeln!(s, "Zone: defined from {source}");
            }
            None => s.push_str("Zone: not set\n"),
        }
        s
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: Self = serde_json::from_str(&raw)?;
        if artifact.version > ARTIFACT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: artifact.version,
                supported: ARTIFACT_VERSION,
            });
        }
        Ok(artifact)
    }

    /// Load `path`, or an empty artifact when it does not exist yet.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_json(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write pretty JSON through a temporary file renamed into place.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let io = |p: &Path| {
            let p = p.to_path_buf();
            move |source| ArtifactError::Io { path: p, source }
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io(parent))?;
        }
        fs::write(&tmp, json).map_err(io(&tmp))?;
        fs::rename(&tmp, path).map_err(io(path))?;
        log::info!("calibration saved to {}", path.display());
        Ok(())
    }
}
