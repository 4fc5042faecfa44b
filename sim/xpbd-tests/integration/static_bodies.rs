//! Immovable bodies are bit-identical across every step.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use xpbd_core::World;
use xpbd_types::{BodyArrays, BodyDesc, Shape, SimulationConfig, SolverConfig, SolverMode};

use crate::test_utils::trajectory;

/// A slab, a tilted ramp and a fixed sphere, hit by a rain of movable
/// bodies.
fn obstacle_course() -> BodyArrays {
    let mut bodies = vec![
        xpbd_tests::ground_slab(),
        BodyDesc::fixed_cuboid(Vector3::new(1.0, 0.1, 1.0))
            .at(Point3::new(0.0, 1.0, 0.0))
            .with_orientation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3)),
        BodyDesc::fixed(Shape::sphere(0.4)).at(Point3::new(2.0, 0.6, 0.0)),
    ];
    for k in 0..6 {
        let x = f64::from(k) * 0.45 - 0.5;
        bodies.push(
            BodyDesc::sphere(1.0, 0.2)
                .at(Point3::new(x, 2.0 + f64::from(k) * 0.1, 0.05))
                .with_velocity(Vector3::new(0.5, -1.0, 0.0)),
        );
        bodies.push(
            BodyDesc::cuboid(2.0, Vector3::new(0.15, 0.1, 0.15))
                .at(Point3::new(x, 3.0, -0.05))
                .with_angular_velocity(Vector3::new(1.0, 2.0, 0.0)),
        );
    }
    BodyArrays::from_bodies(bodies)
}

fn assert_static_unchanged(config: SimulationConfig) {
    let mut world = World::new(obstacle_course(), config).expect("valid scene");
    let initial = world.state();
    let mut touched = false;

    for state in trajectory(&mut world, 300) {
        for i in 0..3 {
            assert_eq!(state.positions[i], initial.positions[i], "body {i} moved");
            assert_eq!(state.orientations[i], initial.orientations[i], "body {i} rotated");
            assert_eq!(state.linear_velocities[i], initial.linear_velocities[i]);
            assert_eq!(state.angular_velocities[i], initial.angular_velocities[i]);
        }
        touched |= world.last_contacts().iter().any(|c| c.body_a < 3);
    }

    assert!(touched, "no body ever reached an obstacle");
}

#[test]
fn static_bodies_unchanged_gauss_seidel() {
    assert_static_unchanged(SimulationConfig::default());
}

#[test]
fn static_bodies_unchanged_jacobi() {
    assert_static_unchanged(
        SimulationConfig::default().solver(SolverConfig::default().mode(SolverMode::Jacobi)),
    );
}

#[test]
fn static_bodies_unchanged_with_static_friction() {
    assert_static_unchanged(
        SimulationConfig::default().solver(SolverConfig::default().with_static_friction()),
    );
}

/// Velocities given to an immovable body are kept but never integrated.
#[test]
fn static_body_with_velocity_stays_put() {
    let bodies = BodyArrays::from_bodies([
        xpbd_tests::ground_slab().with_velocity(Vector3::new(3.0, 0.0, 0.0)),
        BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 0.6, 0.0)),
    ]);
    let mut world = World::new(bodies, SimulationConfig::default()).expect("valid scene");
    let before = world.state();

    world.run_steps(50);

    let after = world.state();
    assert_eq!(after.positions[0], before.positions[0]);
    assert_eq!(after.linear_velocities[0], [3.0, 0.0, 0.0]);
}
