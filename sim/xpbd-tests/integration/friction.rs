//! Friction at its boundaries: none at zero, monotonic braking, full arrest,
//! and the Coulomb bound at any mass.

use nalgebra::{Point3, Vector3};
use xpbd_core::World;
use xpbd_types::{BodyArrays, BodyDesc, SimulationConfig, SolverConfig};

use crate::test_utils::{VELOCITY_TOL, tangential_speed};

const HALF: f64 = 0.25;

/// A unit-mass cube resting on the slab, sliding along +X at `speed`, with
/// friction `mu` on both bodies.
fn sliding_cube(mu: f64, speed: f64) -> BodyArrays {
    sliding_cube_of_mass(1.0, mu, speed)
}

fn sliding_cube_of_mass(mass: f64, mu: f64, speed: f64) -> BodyArrays {
    BodyArrays::from_bodies([
        xpbd_tests::ground_slab().with_friction(mu),
        BodyDesc::cuboid(mass, Vector3::new(HALF, HALF, HALF))
            .at(Point3::new(0.0, xpbd_tests::SLAB_TOP + HALF, 0.0))
            .with_velocity(Vector3::new(speed, 0.0, 0.0))
            .with_friction(mu),
    ])
}

fn sliding_config() -> SimulationConfig {
    SimulationConfig::default().restitution(0.0).compliance(1e-5)
}

/// Tangential speed of a cube launched at 1 m/s after `steps` steps.
fn speed_after(mu: f64, steps: usize) -> f64 {
    let mut world = World::new(sliding_cube(mu, 1.0), sliding_config()).expect("valid scene");
    world.run_steps(steps);
    tangential_speed(&world, 1)
}

#[test]
fn zero_friction_applies_no_tangential_impulse() {
    let bodies = BodyArrays::from_bodies([
        xpbd_tests::ground_slab().with_friction(0.0),
        BodyDesc::sphere(1.0, 0.5)
            .at(Point3::new(0.0, 0.55, 0.0))
            .with_velocity(Vector3::new(3.0, 0.0, -1.0))
            .with_friction(0.0),
    ]);
    let mut world = World::new(bodies, sliding_config()).expect("valid scene");

    for _ in 0..100 {
        world.step();
        assert!(!world.last_contacts().is_empty());
        for contact in world.last_contacts() {
            assert_eq!(contact.friction, 0.0);
            assert_eq!(contact.tangent_impulse, Vector3::zeros());
            assert!(!contact.has_friction_impulse());
        }
    }

    // Nothing slowed the sphere down or set it rolling
    let v = world.body_store().linear_velocity(1);
    assert!((v.x - 3.0).abs() < VELOCITY_TOL);
    assert!((v.z + 1.0).abs() < VELOCITY_TOL);
    assert!(world.body_store().angular_velocity(1).norm() < VELOCITY_TOL);
}

/// Zero friction on one body is enough under the default geometric mean.
#[test]
fn zero_friction_on_one_body_disables_friction() {
    let bodies = BodyArrays::from_bodies([
        xpbd_tests::ground_slab().with_friction(0.9),
        BodyDesc::cuboid(1.0, Vector3::new(HALF, HALF, HALF))
            .at(Point3::new(0.0, xpbd_tests::SLAB_TOP + HALF, 0.0))
            .with_velocity(Vector3::new(2.0, 0.0, 0.0))
            .with_friction(0.0),
    ]);
    let mut world = World::new(bodies, sliding_config()).expect("valid scene");

    world.run_steps(30);

    assert!(world.last_contacts().iter().all(|c| c.friction == 0.0));
    assert!((tangential_speed(&world, 1) - 2.0).abs() < 1e-3);
}

/// More friction brakes harder, all the way to a standstill.
#[test]
fn friction_brakes_monotonically_to_arrest() {
    // 0.48 s: μ = 0.1 and 0.2 are still sliding, 0.4 and 0.8 have stopped
    let steps = 30;
    let speeds: Vec<f64> = [0.0, 0.1, 0.2, 0.4, 0.8]
        .into_iter()
        .map(|mu| speed_after(mu, steps))
        .collect();

    assert!((speeds[0] - 1.0).abs() < 1e-3, "frictionless cube slowed: {speeds:?}");
    for pair in speeds.windows(2) {
        assert!(
            pair[1] <= pair[0] + 1e-3,
            "friction increased the speed: {speeds:?}"
        );
    }
    assert!(speeds[1] < speeds[0] - 0.1);
    assert!(speeds[2] < speeds[1] - 0.1);
    assert!(speeds[4] < 0.05, "cube still sliding at {}", speeds[4]);
}

/// Once arrested, the cube stays put instead of creeping.
#[test]
fn arrested_cube_stays_put() {
    let mut world = World::new(sliding_cube(0.8, 1.0), sliding_config()).expect("valid scene");
    world.run_steps(60);
    let x = world.body_store().position(1).x;

    world.run_steps(60);

    assert!((world.body_store().position(1).x - x).abs() < 1e-3);
}

/// Static friction at the position level catches a slowly creeping cube.
#[test]
fn static_friction_stops_creeping_cube() {
    let config = sliding_config().solver(SolverConfig::default().with_static_friction());
    let mut world = World::new(sliding_cube(0.8, 0.05), config).expect("valid scene");

    world.run_steps(100);

    // Sliding freely it would have covered 8 cm
    let p = world.body_store().position(1);
    assert!(p.x.abs() < 5e-3 && p.z.abs() < 5e-3, "cube crept to {p}");
    assert!(tangential_speed(&world, 1) < 1e-3);
}

/// The friction impulse at every contact stays inside the Coulomb cone
/// `μ λ_n / dt`, for heavy and light bodies alike.
#[test]
fn friction_impulse_stays_in_coulomb_cone() {
    for mass in [0.1, 100.0] {
        let mut world = World::new(sliding_cube_of_mass(mass, 0.5, 5.0), sliding_config())
            .expect("valid scene");
        let dt = world.timestep();

        let mut saturated = false;
        for step in 0..30 {
            world.step();
            for contact in world.last_contacts() {
                let bound = contact.friction * contact.lambda_normal / dt;
                let impulse = contact.tangent_impulse.norm();
                assert!(
                    impulse <= bound * (1.0 + 1e-9),
                    "mass {mass}, step {step}: impulse {impulse} exceeds {bound}"
                );
                saturated |= bound > 0.0 && impulse >= bound * (1.0 - 1e-9);
            }
        }

        // Sliding at speed, friction sits on the cone
        assert!(saturated, "mass {mass}: friction never reached its bound");
    }
}

/// Coulomb friction decelerates at μ g whatever the mass.
#[test]
fn sliding_deceleration_is_mass_independent() {
    let config = sliding_config().compliance(0.0);
    let speed_of = |mass: f64| {
        let mut world = World::new(sliding_cube_of_mass(mass, 0.5, 5.0), config.clone())
            .expect("valid scene");
        world.run_steps(20);
        tangential_speed(&world, 1)
    };

    let light = speed_of(0.1);
    let heavy = speed_of(100.0);

    // 5 - μ g t with t = 0.32 s gives about 3.43
    assert!((light - heavy).abs() < 1e-4, "light {light}, heavy {heavy}");
    assert!(light > 2.9 && light < 4.0, "speed after braking {light}");
}
