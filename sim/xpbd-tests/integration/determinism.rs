//! Identical inputs give bit-identical trajectories.

use xpbd_core::World;
use xpbd_types::{SimulationConfig, SolverConfig, SolverMode};

use crate::test_utils::trajectory;

fn run(config: &SimulationConfig, steps: usize) -> Vec<xpbd_types::BodyState> {
    let mut world = World::new(xpbd_tests::mixed_pile(2), config.clone()).expect("valid scene");
    trajectory(&mut world, steps)
}

#[test]
fn repeated_runs_are_identical() {
    let config = SimulationConfig::default();
    assert_eq!(run(&config, 200), run(&config, 200));
}

#[test]
fn repeated_jacobi_runs_are_identical() {
    let config =
        SimulationConfig::default().solver(SolverConfig::default().mode(SolverMode::Jacobi));
    assert_eq!(run(&config, 200), run(&config, 200));
}

#[test]
fn run_steps_matches_single_steps() {
    let config = SimulationConfig::default();
    let mut batched = World::new(xpbd_tests::mixed_pile(2), config.clone()).expect("valid scene");
    let mut single = World::new(xpbd_tests::mixed_pile(2), config).expect("valid scene");

    batched.run_steps(150);
    for _ in 0..150 {
        single.step();
    }

    assert_eq!(batched.state(), single.state());
    assert_eq!(batched.step_count(), single.step_count());
    assert_eq!(batched.time().to_bits(), single.time().to_bits());
}

/// Restoring a saved state replays the same future.
#[test]
fn restored_state_replays_identically() {
    let config = SimulationConfig::default();
    let mut world = World::new(xpbd_tests::mixed_pile(2), config).expect("valid scene");
    world.run_steps(50);
    let saved = world.state();

    world.set_state(&saved).expect("saved state is valid");
    let first = trajectory(&mut world, 50);
    world.set_state(&saved).expect("saved state is valid");
    let second = trajectory(&mut world, 50);

    assert_eq!(first, second);
}
