use nalgebra::{Rotation3, Vector3};

use crate::pose::RigidPose;
use crate::{CheckerboardObservation, CheckerboardSpec, Distortion, IntrinsicProfile};

pub(crate) fn camera(distortion: Distortion) -> IntrinsicProfile {
    IntrinsicProfile {
        fx: 810.0,
        fy: 805.0,
        cx: 322.0,
        cy: 238.0,
        distortion,
        image_width: 640,
        image_height: 480,
        rms_error_px: 0.0,
        observation_count: 0,
    }
}

/// 9x6 board seen from `count` varied poses about half a metre away.
pub(crate) fn synthetic_observations(
    count: usize,
    truth: &IntrinsicProfile,
) -> Vec<CheckerboardObservation> {
    let spec = CheckerboardSpec::new(9, 6, 25.0).unwrap();
    let center = Vector3::new(100.0, 62.5, 0.0);
    (0..count)
        .map(|k| {
            let t = k as f64;
            let rotation = Rotation3::from_euler_angles(
                0.35 * (t * 1.3).sin(),
                0.35 * (t * 0.7 + 1.0).cos(),
                0.2 * (t * 0.9).sin(),
            );
            let offset = Vector3::new(
                20.0 * (t * 0.5).sin(),
                15.0 * (t * 0.8).cos(),
                520.0 + 8.0 * t,
            );
            let pose = RigidPose {
                rotation,
                translation: offset - rotation * center,
            };
            let image_points = spec
                .object_points()
                .iter()
                .map(|p| {
                    truth
                        .project(&pose.transform(&Vector3::new(p.x, p.y, 0.0)))
                        .unwrap()
                })
                .collect();
            CheckerboardObservation {
                spec,
                image_points,
                image_width: truth.image_width,
                image_height: truth.image_height,
            }
        })
        .collect()
}
