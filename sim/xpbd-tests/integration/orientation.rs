//! Orientations stay unit length through spinning and collisions.

use nalgebra::{Point3, Vector3};
use xpbd_core::World;
use xpbd_types::{BodyArrays, BodyDesc, SimulationConfig};

use crate::test_utils::{NORM_TOL, quaternion_norm, trajectory};

fn assert_unit_orientations(world: &mut World, steps: usize) {
    for (step, state) in trajectory(world, steps).iter().enumerate() {
        for (i, &q) in state.orientations.iter().enumerate() {
            let norm = quaternion_norm(q);
            assert!(
                (norm - 1.0).abs() < NORM_TOL,
                "body {i} at step {step}: |q| = {norm}"
            );
        }
    }
}

/// Fast free spin with no contacts: only the predictor touches orientation.
#[test]
fn free_spin_keeps_unit_norm() {
    let bodies = BodyArrays::from_bodies([
        BodyDesc::cuboid(1.0, Vector3::new(0.5, 0.2, 0.1))
            .with_angular_velocity(Vector3::new(40.0, -25.0, 13.0)),
        BodyDesc::capsule(1.0, 0.1, 0.5)
            .at(Point3::new(5.0, 0.0, 0.0))
            .with_angular_velocity(Vector3::new(0.0, 0.0, 100.0)),
    ]);
    let mut world =
        World::new(bodies, SimulationConfig::default().zero_gravity()).expect("valid scene");

    assert_unit_orientations(&mut world, 2000);
}

/// Tumbling bodies landing in a pile: position corrections also rotate.
#[test]
fn colliding_pile_keeps_unit_norm() {
    let mut world =
        World::new(xpbd_tests::mixed_pile(3), SimulationConfig::default()).expect("valid scene");

    assert_unit_orientations(&mut world, 400);
}

/// Spinning boxes skidding on the slab.
#[test]
fn skidding_boxes_keep_unit_norm() {
    let bodies = BodyArrays::from_bodies([
        xpbd_tests::ground_slab(),
        BodyDesc::cuboid(1.0, Vector3::new(0.3, 0.1, 0.2))
            .at(Point3::new(0.0, 0.3, 0.0))
            .with_velocity(Vector3::new(4.0, 0.0, 1.0))
            .with_angular_velocity(Vector3::new(0.0, 20.0, 5.0)),
        BodyDesc::cuboid(1.0, Vector3::new(0.2, 0.2, 0.2))
            .at(Point3::new(-2.0, 0.4, 0.0))
            .with_angular_velocity(Vector3::new(15.0, 0.0, -8.0)),
    ]);
    let mut world = World::new(bodies, xpbd_tests::resting_config()).expect("valid scene");

    assert_unit_orientations(&mut world, 500);
}
