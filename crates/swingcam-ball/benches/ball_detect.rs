use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Point2;
use swingcam_ball::{BallConfig, BallDetectParams, BallDetector, BallLocator, RadiusRange, Roi, ZoneMapper};
use swingcam_core::{Frame, GrayImage};

fn scene(width: usize, height: usize, cx: f64, cy: f64, r: f64) -> GrayImage {
    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            // Mild grass texture.
            let base = 70.0 + 8.0 * ((x as f64 * 0.37).sin() * (y as f64 * 0.23).cos());
            let d = ((x as f64 - cx).powi(2) + (y as f64 - cy).powi(2)).sqrt();
            let cover = (r + 0.5 - d).clamp(0.0, 1.0);
            img.put(x, y, (base * (1.0 - cover) + 235.0 * cover) as u8);
        }
    }
    img
}

fn bench_detection(c: &mut Criterion) {
    let img = scene(640, 480, 318.4, 262.7, 14.5);
    let detector = BallDetector::new(BallDetectParams {
        radius_range: RadiusRange::new(8.0, 28.0).unwrap(),
        ..BallDetectParams::default()
    })
    .unwrap();

    c.bench_function("detect_full_frame_640x480", |b| {
        b.iter(|| detector.detect(black_box(&img.view()), None))
    });

    let roi = Roi::around(Point2::new(320.0, 260.0), 50.0, 640, 480);
    c.bench_function("detect_roi_100px", |b| {
        b.iter(|| detector.detect(black_box(&img.view()), roi))
    });

    let mut zone = ZoneMapper::default();
    zone.from_manual_corners([
        Point2::new(220.0, 200.0),
        Point2::new(420.0, 200.0),
        Point2::new(440.0, 330.0),
        Point2::new(200.0, 330.0),
    ])
    .unwrap();
    let mut locator = BallLocator::new(BallConfig {
        detect: BallDetectParams {
            radius_range: RadiusRange::new(8.0, 28.0).unwrap(),
            ..BallDetectParams::default()
        },
        ..BallConfig::default()
    })
    .unwrap();
    let mut seq = 0u64;
    c.bench_function("live_tick_locked", |b| {
        b.iter(|| {
            seq += 1;
            let frame = Frame::new(img.clone(), Duration::from_millis(5 * seq), seq);
            black_box(locator.detect_live(&frame, &zone))
        })
    });
}

criterion_group!(benches, bench_detection);
criterion_main!(benches);
