//! Restitution at its boundaries: no bounce at zero, a real bounce when
//! elastic.

use nalgebra::{Point3, Vector3};
use xpbd_core::World;
use xpbd_types::{BodyArrays, BodyDesc, SimulationConfig, SolverConfig};

use crate::test_utils::VELOCITY_TOL;

/// Sphere dropped from 2 m onto the slab.
fn drop_scene() -> BodyArrays {
    xpbd_tests::sphere_over_slab(2.0)
}

/// With zero restitution the sphere never leaves the slab with a separating
/// normal velocity.
#[test]
fn zero_restitution_never_separates() {
    let config = xpbd_tests::resting_config();
    let mut world = World::new(drop_scene(), config).expect("valid scene");

    let mut landed = false;
    for step in 0..400 {
        world.step();
        let touching = world.last_contacts().iter().any(|c| c.depth > 0.0);
        landed |= touching;
        if landed {
            let vy = world.body_store().linear_velocity(1).y;
            assert!(vy <= VELOCITY_TOL, "step {step}: separating speed {vy}");
        }
    }

    assert!(landed);
}

/// An elastic sphere rebounds with most of its impact speed.
#[test]
fn elastic_sphere_bounces() {
    let config = xpbd_tests::resting_config().restitution(0.8);
    let mut world = World::new(drop_scene(), config).expect("valid scene");

    let mut bounce = None;
    for _ in 0..400 {
        let before = world.body_store().linear_velocity(1).y;
        world.step();
        let after = world.body_store().linear_velocity(1).y;
        if bounce.is_none() && before < 0.0 && after > 0.0 {
            bounce = Some((-before, after));
        }
    }
    let (impact_speed, rebound_speed) = bounce.expect("sphere never bounced");

    // Free fall over 1.45 m
    let expected_impact = (2.0 * 9.81 * 1.45_f64).sqrt();
    assert!((impact_speed - expected_impact).abs() < 0.1);
    assert!(
        rebound_speed > 0.7 * impact_speed,
        "rebound {rebound_speed} from impact {impact_speed}"
    );
    assert!(rebound_speed < impact_speed);
}

/// Slow approaches below the restitution threshold do not bounce, even
/// when restitution is high.
#[test]
fn slow_contact_below_threshold_does_not_bounce() {
    let bodies = BodyArrays::from_bodies([
        xpbd_tests::ground_slab(),
        BodyDesc::sphere(1.0, 0.5)
            .at(Point3::new(0.0, 0.551, 0.0))
            .with_velocity(Vector3::new(0.0, -0.01, 0.0)),
    ]);
    let config = SimulationConfig::with_timestep(0.004)
        .zero_gravity()
        .restitution(1.0)
        .compliance(0.0)
        .solver(SolverConfig::default().restitution_threshold(0.1));
    let mut world = World::new(bodies, config).expect("valid scene");

    world.run_steps(50);

    assert!(world.body_store().linear_velocity(1).y <= VELOCITY_TOL);
}

/// A fast sphere just above the slab only turns around once it touches.
#[test]
fn no_bounce_before_touching() {
    let bodies = BodyArrays::from_bodies([
        xpbd_tests::ground_slab(),
        BodyDesc::sphere(1.0, 0.5)
            .at(Point3::new(0.0, xpbd_tests::SLAB_TOP + 0.5 + 0.1, 0.0))
            .with_velocity(Vector3::new(0.0, -5.0, 0.0)),
    ]);
    let config = SimulationConfig::default().restitution(0.8);
    let mut world = World::new(bodies, config).expect("valid scene");

    let mut gap_at_bounce = None;
    for _ in 0..20 {
        world.step();
        let store = world.body_store();
        if store.linear_velocity(1).y > 0.0 {
            gap_at_bounce = Some(store.position(1).y - 0.5 - xpbd_tests::SLAB_TOP);
            break;
        }
    }
    let gap = gap_at_bounce.expect("sphere never bounced");

    assert!(gap <= 0.0, "turned around {gap} m above the slab");
}

/// Without a configured threshold even a slow approach bounces with the
/// full coefficient.
#[test]
fn slow_approach_bounces_by_default() {
    let bodies = || {
        BodyArrays::from_bodies([
            xpbd_tests::ground_slab(),
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 0.551, 0.0))
                .with_velocity(Vector3::new(0.0, -0.1, 0.0)),
        ])
    };
    let config = SimulationConfig::default().restitution(1.0);

    let mut world = World::new(bodies(), config.clone()).expect("valid scene");
    world.step();
    // Approach after gravity: 0.1 + 9.81 * 0.016
    let approach = 0.1 + 9.81 * 0.016;
    assert!((world.body_store().linear_velocity(1).y - approach).abs() < 1e-9);

    // The resting threshold 2 |g| dt = 0.314 swallows it
    let mut world =
        World::new(bodies(), config.with_resting_threshold()).expect("valid scene");
    world.step();
    assert!(world.body_store().linear_velocity(1).y.abs() < 1e-9);
}
