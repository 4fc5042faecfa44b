//! The host-facing `World` surface: construction from flat arrays, state
//! access and validation errors.

use nalgebra::{Point3, Vector3};
use xpbd_core::World;
use xpbd_types::{
    BodyArrays, BodyDesc, InverseInertiaArray, SimError, SimulationConfig,
};

use crate::test_utils::EXACT_TOL;

/// Two bodies written out by hand the way a host would supply them.
fn raw_arrays() -> BodyArrays {
    BodyArrays {
        positions: vec![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        orientations: vec![[1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]],
        linear_velocities: vec![[0.0; 3]; 2],
        angular_velocities: vec![[0.0; 3]; 2],
        inverse_masses: vec![0.0, 1.0],
        inverse_inertias: InverseInertiaArray::Diagonal(vec![[0.0; 3], [10.0; 3]]),
        shape_kinds: vec![1, 0],
        shape_params: vec![[50.0, 0.05, 50.0], [0.5, 0.0, 0.0]],
        frictions: None,
    }
}

#[test]
fn raw_arrays_match_typed_builders() {
    let raw = World::new(raw_arrays(), SimulationConfig::default()).expect("valid arrays");
    let typed = World::new(
        xpbd_tests::sphere_over_slab(1.0),
        SimulationConfig::default(),
    )
    .expect("valid scene");

    assert_eq!(raw.body_count(), 2);
    assert_eq!(raw.state(), typed.state());
    assert_eq!(raw.body_store().shape(1), typed.body_store().shape(1));
    // Absent friction array falls back to the default coefficient
    assert_eq!(raw.body_store().friction(1), xpbd_types::DEFAULT_FRICTION);
}

#[test]
fn construction_errors_are_config_errors() {
    let mut short = raw_arrays();
    short.inverse_masses.pop();
    let err = World::new(short, SimulationConfig::default()).unwrap_err();
    assert!(matches!(err, SimError::LengthMismatch { .. }));
    assert!(err.is_config_error());

    let mut unknown = raw_arrays();
    unknown.shape_kinds[1] = 7;
    let err = World::new(unknown, SimulationConfig::default()).unwrap_err();
    assert!(matches!(err, SimError::UnknownShapeKind { index: 1, code: 7 }));

    let mut flat = raw_arrays();
    flat.shape_params[1] = [0.0, 0.0, 0.0];
    let err = World::new(flat, SimulationConfig::default()).unwrap_err();
    assert!(matches!(err, SimError::InvalidShape { index: 1, .. }));

    let mut zero_q = raw_arrays();
    zero_q.orientations[1] = [0.0; 4];
    let err = World::new(zero_q, SimulationConfig::default()).unwrap_err();
    assert!(matches!(err, SimError::InvalidOrientation { index: 1 }));

    let mut sticky = raw_arrays();
    sticky.frictions = Some(vec![0.5, -0.1]);
    let err = World::new(sticky, SimulationConfig::default()).unwrap_err();
    assert!(matches!(err, SimError::InvalidFriction { index: 1, .. }));

    let bad_config = SimulationConfig::default().restitution(1.5);
    assert!(World::new(raw_arrays(), bad_config).is_err());
}

#[test]
fn orientations_are_normalized_on_input() {
    let mut arrays = raw_arrays();
    arrays.orientations[1] = [2.0, 0.0, 0.0, 0.0];
    let world = World::new(arrays, SimulationConfig::default()).expect("normalizable");

    let q = world.state().orientations[1];
    assert!((q[0] - 1.0).abs() < EXACT_TOL);
}

#[test]
fn empty_world_steps() {
    let mut world =
        World::new(BodyArrays::default(), SimulationConfig::default()).expect("empty is valid");

    world.run_steps(3);

    assert_eq!(world.body_count(), 0);
    assert_eq!(world.step_count(), 3);
    assert!(world.last_contacts().is_empty());
}

#[test]
fn contacts_are_an_empty_list_when_apart() {
    let mut world = World::new(
        xpbd_tests::sphere_over_slab(10.0),
        SimulationConfig::default(),
    )
    .expect("valid scene");

    assert!(world.last_contacts().is_empty());
    world.step();
    assert!(world.last_contacts().is_empty());
    assert!(!world.last_step_stats().has_contacts());
}

#[test]
fn timestep_override_is_one_off() {
    let config = SimulationConfig::with_timestep(0.01);
    let mut world = World::new(xpbd_tests::sphere_over_slab(10.0), config).expect("valid scene");

    world.step_with(0.02).expect("valid dt");
    world.step();

    assert!((world.time() - 0.03).abs() < EXACT_TOL);
    assert!((world.timestep() - 0.01).abs() < EXACT_TOL);
    assert!((world.last_step_stats().dt - 0.01).abs() < EXACT_TOL);

    let before = world.state();
    for dt in [0.0, -0.01, f64::NAN, f64::INFINITY] {
        let err = world.step_with(dt).unwrap_err();
        assert!(matches!(err, SimError::InvalidTimestep(_)));
    }
    assert_eq!(world.state(), before);
    assert_eq!(world.step_count(), 2);
}

#[test]
fn set_state_moves_bodies_but_not_properties() {
    let mut world = World::new(
        xpbd_tests::sphere_over_slab(1.0),
        SimulationConfig::default(),
    )
    .expect("valid scene");

    let mut state = world.state();
    state.positions[1] = [3.0, 4.0, 5.0];
    state.linear_velocities[1] = [0.0, 0.0, -2.0];
    world.set_state(&state).expect("valid state");

    let store = world.body_store();
    assert_eq!(store.position(1), Point3::new(3.0, 4.0, 5.0));
    assert_eq!(store.linear_velocity(1), Vector3::new(0.0, 0.0, -2.0));
    assert!((store.inverse_mass(1) - 1.0).abs() < EXACT_TOL);

    let mut short = world.state();
    short.angular_velocities.pop();
    assert!(matches!(
        world.set_state(&short).unwrap_err(),
        SimError::LengthMismatch { .. }
    ));

    let mut nan = world.state();
    nan.positions[0][1] = f64::NAN;
    assert!(world.set_state(&nan).is_err());
    assert_eq!(world.body_store().position(1), Point3::new(3.0, 4.0, 5.0));
}

#[test]
fn diagnostics_track_the_scene() {
    let bodies = BodyArrays::from_bodies([
        BodyDesc::sphere(2.0, 0.5).with_velocity(Vector3::new(3.0, 0.0, 0.0)),
        BodyDesc::sphere(1.0, 0.5)
            .at(Point3::new(0.0, 0.0, 10.0))
            .with_velocity(Vector3::new(0.0, 4.0, 0.0)),
    ]);
    let world = World::new(bodies, SimulationConfig::default().zero_gravity()).expect("valid");

    assert!((world.total_kinetic_energy() - (9.0 + 8.0)).abs() < EXACT_TOL);
    assert_eq!(world.total_linear_momentum(), Vector3::new(6.0, 4.0, 0.0));
    assert!(world.check_finite().is_ok());
}
