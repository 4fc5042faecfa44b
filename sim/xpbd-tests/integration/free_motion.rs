//! Bodies with no candidate pairs follow the predictor exactly.

use nalgebra::{Point3, Vector3};
use xpbd_core::World;
use xpbd_core::integrators::predict;
use xpbd_types::{BodyArrays, BodyDesc, SimulationConfig};

fn scattered() -> BodyArrays {
    BodyArrays::from_bodies([
        BodyDesc::sphere(1.0, 0.5)
            .at(Point3::new(-20.0, 5.0, 0.0))
            .with_velocity(Vector3::new(1.0, 2.0, 0.0))
            .with_angular_velocity(Vector3::new(0.3, 0.0, 2.0)),
        BodyDesc::cuboid(2.0, Vector3::new(0.5, 0.5, 0.5))
            .at(Point3::new(0.0, 5.0, 20.0))
            .with_angular_velocity(Vector3::new(-1.0, 4.0, 0.5)),
        BodyDesc::capsule(1.0, 0.2, 0.6)
            .at(Point3::new(20.0, 5.0, -20.0))
            .with_velocity(Vector3::new(0.0, 0.0, -3.0)),
    ])
}

#[test]
fn poses_match_predictor_without_pairs() {
    let config = SimulationConfig::default();
    let mut world = World::new(scattered(), config.clone()).expect("valid scene");

    for _ in 0..100 {
        let mut predicted = world.body_store().clone();
        predict(&mut predicted, &config.gravity, config.timestep);

        world.step();

        assert_eq!(world.last_step_stats().pairs, 0);
        assert!(world.last_contacts().is_empty());
        assert_eq!(world.body_store().positions(), predicted.positions());
        assert_eq!(world.body_store().orientations(), predicted.orientations());

        // Velocities are reconciled from the pose change, so they match the
        // predictor's only to rounding
        for i in 0..3 {
            let v = world.body_store().linear_velocity(i);
            let w = world.body_store().angular_velocity(i);
            assert!((v - predicted.linear_velocity(i)).norm() < 1e-9);
            assert!((w - predicted.angular_velocity(i)).norm() < 1e-9);
        }
    }
}

/// Ballistic flight of the centre of mass.
#[test]
fn ballistic_height() {
    let config = SimulationConfig::with_timestep(0.001);
    let mut world = World::new(scattered(), config).expect("valid scene");

    world.run_steps(1000);

    // Semi-implicit Euler: y = y0 + v0 t - g t² (n + 1) / (2 n)
    let t = 1.0;
    let g = 9.81;
    let expected = 5.0 + 2.0 * t - 0.5 * g * t * t * 1001.0 / 1000.0;
    let y = world.body_store().position(0).y;
    assert!((y - expected).abs() < 1e-6, "y = {y}, expected {expected}");
    assert!((world.time() - 1.0).abs() < 1e-9);
}
