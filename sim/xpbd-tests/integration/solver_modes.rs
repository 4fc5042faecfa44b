//! Gauss-Seidel and Jacobi ordering reach the same resting states.

use nalgebra::{Point3, Vector3};
use xpbd_core::World;
use xpbd_tests::{ground_slab, resting_config, sphere_over_slab, sphere_slab_penetration};
use xpbd_types::{BodyArrays, BodyDesc, SimulationConfig, SolverConfig, SolverMode};

fn with_mode(config: SimulationConfig, mode: SolverMode) -> SimulationConfig {
    let solver = SolverConfig {
        mode,
        ..config.solver.clone()
    };
    config.solver(solver)
}

#[test]
fn jacobi_sphere_settles_on_slab() {
    let config = with_mode(resting_config(), SolverMode::Jacobi);
    let mut world = World::new(sphere_over_slab(1.0), config).expect("valid scene");

    let mut max_penetration: f64 = 0.0;
    for _ in 0..250 {
        world.step();
        let y = world.body_store().position(1).y;
        max_penetration = max_penetration.max(sphere_slab_penetration(y, 0.5));
    }

    let y = world.body_store().position(1).y;
    assert!(max_penetration < 0.0005, "max penetration {max_penetration}");
    assert!((y - 0.55).abs() < 0.02, "final height {y}");
}

/// With a single contact per body both orderings do the same work.
#[test]
fn modes_agree_on_single_contact() {
    let mut gs = World::new(sphere_over_slab(1.0), resting_config()).expect("valid scene");
    let mut jacobi = World::new(
        sphere_over_slab(1.0),
        with_mode(resting_config(), SolverMode::Jacobi),
    )
    .expect("valid scene");

    for _ in 0..250 {
        gs.step();
        jacobi.step();
        let dy = gs.body_store().position(1).y - jacobi.body_store().position(1).y;
        assert!(dy.abs() < 1e-9, "trajectories diverged by {dy}");
    }
}

/// A body touching two others gets averaged corrections under Jacobi but
/// still settles.
#[test]
fn stacks_settle_in_both_modes() {
    let stack = || {
        BodyArrays::from_bodies([
            ground_slab(),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 0.6, 0.0)),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 1.7, 0.0)),
            BodyDesc::cuboid(1.0, Vector3::new(0.3, 0.3, 0.3)).at(Point3::new(0.0, 2.6, 0.0)),
        ])
    };

    for mode in [SolverMode::GaussSeidel, SolverMode::Jacobi] {
        let mut world =
            World::new(stack(), with_mode(resting_config(), mode)).expect("valid scene");
        world.run_steps(400);

        let store = world.body_store();
        assert!((store.position(1).y - 0.55).abs() < 0.03, "{mode}: bottom sphere");
        assert!((store.position(2).y - 1.55).abs() < 0.04, "{mode}: top sphere");
        assert!((store.position(3).y - 2.35).abs() < 0.05, "{mode}: box");
        for i in 1..4 {
            assert!(
                store.linear_velocity(i).norm() < 0.05,
                "{mode}: body {i} still moving"
            );
        }
    }
}
