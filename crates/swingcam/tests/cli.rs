use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use swingcam::{CalibrationArtifact, SwingcamConfig};

fn swingcam(artifact: &Path) -> Command {
    let mut cmd = Command::cargo_bin("swingcam").unwrap();
    cmd.arg("--artifact").arg(artifact);
    cmd
}

fn write_ball_png(path: &Path, cx: f64, cy: f64, r: f64) {
    let img = image::GrayImage::from_fn(160, 120, |x, y| {
        let dx = x as f64 + 0.5 - cx;
        let dy = y as f64 + 0.5 - cy;
        let d = (dx * dx + dy * dy).sqrt();
        let t = (r + 0.5 - d).clamp(0.0, 1.0);
        image::Luma([(45.0 + t * 190.0).round() as u8])
    });
    img.save(path).unwrap();
}

#[test]
fn init_config_writes_loadable_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("swingcam.json");
    Command::cargo_bin("swingcam")
        .unwrap()
        .args(["init-config"])
        .arg(&out)
        .assert()
        .success();
    let cfg = SwingcamConfig::load_json(&out).unwrap();
    assert_eq!(cfg.capture.arbiter.post_impact_frames, 20);

    Command::cargo_bin("swingcam")
        .unwrap()
        .args(["init-config"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn show_without_artifact_reports_not_calibrated() {
    let dir = tempfile::tempdir().unwrap();
    swingcam(&dir.path().join("missing.json"))
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not calibrated").and(predicate::str::contains("Zone: not set")));
}

#[test]
fn radar_sim_reports_single_impact() {
    let dir = tempfile::tempdir().unwrap();
    swingcam(&dir.path().join("a.json"))
        .args(["radar-sim", "--samples", "5,5,40,65,90,30,5"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""event":"impact_detected""#)
                .and(predicate::str::contains("impacts: 1")),
        );
}

#[test]
fn zone_and_ball_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("cal.json");

    swingcam(&artifact)
        .args([
            "zone", "--corner", "30,100", "130,100", "120,40", "40,40",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Zone: defined from manual"));

    let image = dir.path().join("ball.png");
    write_ball_png(&image, 80.0, 70.0, 9.0);
    swingcam(&artifact)
        .arg("ball")
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::contains("ball at"));

    let stored = CalibrationArtifact::load_json(&artifact).unwrap();
    assert!(stored.zone.is_some());
    let ball = stored.ball.unwrap();
    assert!((ball.center.x - 80.0).abs() < 1.0);
    assert!((ball.center.y - 70.0).abs() < 1.0);
    assert!((ball.radius - 9.0).abs() < 1.0);

    swingcam(&artifact)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ball: (").and(predicate::str::contains("Zone: defined")));
}

#[test]
fn manual_edge_fit_needs_three_points() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("cal.json");
    let image = dir.path().join("unused.png");
    swingcam(&artifact)
        .arg("ball")
        .arg(&image)
        .args(["--edge", "10,0", "0,10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("too few edge points"));
    assert!(!artifact.exists());
}

#[test]
fn extrinsic_requires_intrinsics() {
    let dir = tempfile::tempdir().unwrap();
    swingcam(&dir.path().join("cal.json"))
        .args([
            "extrinsic", "--px", "100,300", "500,300", "450,150", "150,150",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires a finished intrinsic calibration"));
}

#[test]
fn extrinsic_rejects_collinear_points() {
    let dir = tempfile::tempdir().unwrap();
    swingcam(&dir.path().join("cal.json"))
        .args(["extrinsic", "--px", "0,0", "10,10", "20,20", "30,30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("degenerate correspondence"));
}
