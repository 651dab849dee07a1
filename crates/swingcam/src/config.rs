//! Device configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use swingcam_ball::{BallConfig, BallLocator, ZoneMapper};
use swingcam_calib::{CalibratorConfig, GeometricCalibrator};
use swingcam_capture::{CaptureConfig, SwingThresholds};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_min_area_px2() -> f64 {
    100.0
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Smallest accepted zone area.
    #[serde(default = "default_min_area_px2")]
    pub min_area_px2: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            min_area_px2: default_min_area_px2(),
        }
    }
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("swingcam_calibration.json")
}

/// Every section is optional; missing fields take their defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwingcamConfig {
    #[serde(default)]
    pub calibration: CalibratorConfig,
    #[serde(default)]
    pub ball: BallConfig,
    #[serde(default)]
    pub zone: ZoneConfig,
    #[serde(default)]
    pub radar: SwingThresholds,
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Where the calibration artifact is stored.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
}

impl Default for SwingcamConfig {
    fn default() -> Self {
        Self {
            calibration: CalibratorConfig::default(),
            ball: BallConfig::default(),
            zone: ZoneConfig::default(),
            radar: SwingThresholds::default(),
            capture: CaptureConfig::default(),
            artifact_path: default_artifact_path(),
        }
    }
}

impl SwingcamConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.calibration.min_observations < 3 {
            return Err(ConfigError::Invalid(
                "calibration.min_observations must be at least 3".into(),
            ));
        }
        if !(self.radar.approach_mph >= 0.0 && self.radar.hysteresis_mph > 0.0) {
            return Err(ConfigError::Invalid(
                "radar thresholds must be non-negative with a positive hysteresis".into(),
            ));
        }
        if self.radar.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("radar.poll_interval must be positive".into()));
        }
        if !(self.zone.min_area_px2 >= 0.0) {
            return Err(ConfigError::Invalid("zone.min_area_px2 must be non-negative".into()));
        }
        self.capture
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        BallLocator::new(self.ball.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    pub fn build_calibrator(&self) -> GeometricCalibrator {
        GeometricCalibrator::new(self.calibration.clone())
    }

    pub fn build_locator(&self) -> Result<BallLocator, ConfigError> {
        BallLocator::new(self.ball.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn build_zone(&self) -> ZoneMapper {
        ZoneMapper::new(self.zone.min_area_px2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg: SwingcamConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.calibration.min_observations, 15);
        assert_eq!(cfg.radar.approach_mph, 15.0);
        assert_eq!(cfg.capture.buffer_capacity, 40);
        assert_eq!(cfg.capture.replay.speed_multiplier, 0.025);
        assert_eq!(cfg.artifact_path, PathBuf::from("swingcam_calibration.json"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swingcam.json");
        let mut cfg = SwingcamConfig::default();
        cfg.radar.hysteresis_mph = 25.0;
        cfg.capture.arbiter.displacement_threshold_px = 12.0;
        cfg.write_json(&path).unwrap();

        let back = SwingcamConfig::load_json(&path).unwrap();
        assert_eq!(back.radar, cfg.radar);
        assert_eq!(back.capture.arbiter, cfg.capture.arbiter);
    }

    #[test]
    fn rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"radar": {"hysteresis_mph": 0.0}}"#).unwrap();
        assert!(matches!(
            SwingcamConfig::load_json(&path),
            Err(ConfigError::Invalid(_))
        ));
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(SwingcamConfig::load_json(&path), Err(ConfigError::Json(_))));
    }
}
