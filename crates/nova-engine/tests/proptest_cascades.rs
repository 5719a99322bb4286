//! Property tests for cascade fitting.
//!
//! Random increasing split schedules, camera poses and light directions are
//! fed to the calculator. Every cascade must end where its split fraction
//! says, and must contain the corners of the frustum slice it covers.

use glam::{Vec3, Vec4Swizzles};
use nova_engine::camera::Camera;
use nova_engine::config::ShadowSettings;
use nova_engine::render::cascade::{frustum_corners, CascadeCalculator};
use proptest::prelude::*;

/// Strictly increasing fractions in (0, 1] ending at 1.
fn split_strategy() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(0.05f32..1.0, 1..=4).prop_map(|steps| {
        let total: f32 = steps.iter().sum();
        let mut acc = 0.0;
        let mut fractions: Vec<f32> = steps
            .iter()
            .map(|step| {
                acc += step;
                acc / total
            })
            .collect();
        if let Some(last) = fractions.last_mut() {
            *last = 1.0;
        }
        fractions
    })
}

fn direction_strategy() -> impl Strategy<Value = Vec3> {
    (-1.0f32..1.0, 0.2f32..1.0, -1.0f32..1.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    #[test]
    fn cascades_end_at_their_split_distance(
        splits in split_strategy(),
        far in 20.0f32..500.0,
        yaw in 0.0f32..std::f32::consts::TAU,
        light in direction_strategy(),
    ) {
        let settings = ShadowSettings {
            cascade_count: splits.len(),
            split_fractions: splits.clone(),
            ..ShadowSettings::default()
        };
        prop_assert!(settings.validate().is_ok());

        let forward = Vec3::new(yaw.sin(), -0.1, yaw.cos());
        let camera = Camera::perspective(Vec3::new(0.0, 3.0, 0.0), forward, 60.0, 1.5, 0.1, far);
        let cascades = CascadeCalculator::from_settings(&settings)
            .compute(&camera, light)
            .unwrap();

        prop_assert_eq!(cascades.len(), splits.len());
        for (cascade, fraction) in cascades.iter().zip(&splits) {
            prop_assert!((cascade.far - far * fraction).abs() <= far * 1e-5);
            prop_assert!(cascade.half_extent > 0.0);
        }
        prop_assert!((cascades[cascades.len() - 1].far - far).abs() <= far * 1e-5);
        prop_assert!(cascades.windows(2).all(|pair| pair[0].far < pair[1].far));
    }

    #[test]
    fn slice_corners_stay_inside_their_cascade(
        splits in split_strategy(),
        yaw in 0.0f32..std::f32::consts::TAU,
        light in direction_strategy(),
    ) {
        let calculator = CascadeCalculator {
            cascade_count: splits.len(),
            split_fractions: splits,
            ..CascadeCalculator::default()
        };
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let camera = Camera::perspective(Vec3::new(1.0, 5.0, -2.0), forward, 60.0, 1.0, 0.1, 100.0);
        let cascades = calculator.compute(&camera, light).unwrap();
        let slack = 2.0 / calculator.resolution as f32 + 1e-3;

        let mut near = camera.near;
        for cascade in &cascades {
            let slice = camera.projection_range(near, cascade.far) * camera.view();
            for corner in frustum_corners(slice.inverse()) {
                let clip = cascade.view_projection * corner.extend(1.0);
                let ndc = clip.xyz() / clip.w;
                prop_assert!(ndc.x.abs() <= 1.0 + slack, "corner {} at {}", corner, ndc);
                prop_assert!(ndc.y.abs() <= 1.0 + slack, "corner {} at {}", corner, ndc);
                prop_assert!((0.0..=1.0).contains(&ndc.z), "corner {} at {}", corner, ndc);
            }
            near = cascade.far;
        }
    }
}
