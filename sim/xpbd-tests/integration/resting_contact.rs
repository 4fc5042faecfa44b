//! Resting contact: bodies released above the slab settle on it.
//!
//! All scenes use the stiff 250 Hz configuration from
//! [`xpbd_tests::resting_config`].

use std::f64::consts::FRAC_PI_2;

use approx::assert_relative_eq;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use xpbd_core::World;
use xpbd_tests::{
    SLAB_TOP, ground_slab, resting_config, sphere_over_slab, sphere_slab_penetration,
};
use xpbd_types::{BodyArrays, BodyDesc};

/// Sphere of radius 0.5 dropped from y = 1.0 onto a slab of half-thickness
/// 0.05, stepped for one second at 250 Hz.
///
/// Expected: the sphere never sinks more than half a millimetre and ends
/// resting at y ≈ 0.55.
#[test]
fn sphere_settles_on_slab() {
    let mut world = World::new(sphere_over_slab(1.0), resting_config()).expect("valid scene");

    let mut max_penetration: f64 = 0.0;
    for _ in 0..250 {
        world.step();
        let y = world.body_store().position(1).y;
        max_penetration = max_penetration.max(sphere_slab_penetration(y, 0.5));
    }

    let y = world.body_store().position(1).y;
    assert!(
        max_penetration < 0.0005,
        "max penetration {max_penetration} exceeds 0.5 mm"
    );
    assert!((y - 0.55).abs() < 0.02, "final height {y}");
    assert!(world.last_step_stats().has_contacts());
}

/// The sphere comes to rest rather than jittering.
#[test]
fn sphere_comes_to_rest() {
    let mut world = World::new(sphere_over_slab(1.0), resting_config()).expect("valid scene");
    world.run_steps(500);

    let v = world.body_store().linear_velocity(1);
    assert!(v.norm() < 1e-3, "residual velocity {v}");
    assert_relative_eq!(world.body_store().position(1).x, 0.0, epsilon = 1e-12);
    assert_relative_eq!(world.body_store().position(1).z, 0.0, epsilon = 1e-12);
}

/// A cube dropped flat settles on its face without tipping.
#[test]
fn box_settles_flat() {
    let half = 0.25;
    let bodies = BodyArrays::from_bodies([
        ground_slab(),
        BodyDesc::cuboid(1.0, Vector3::new(half, half, half)).at(Point3::new(0.0, 0.5, 0.0)),
    ]);
    let mut world = World::new(bodies, resting_config()).expect("valid scene");

    world.run_steps(250);

    let store = world.body_store();
    let y = store.position(1).y;
    assert!((y - (SLAB_TOP + half)).abs() < 0.02, "final height {y}");
    assert!(
        store.orientation(1).angle() < 0.05,
        "box tipped by {} rad",
        store.orientation(1).angle()
    );
    assert!(store.linear_velocity(1).norm() < 0.05);
    // Face-on-face contact reports several points
    assert!(world.last_contacts().len() >= 4);
}

/// A capsule lying on its side rests on its core segment.
#[test]
fn capsule_rests_on_side() {
    let radius = 0.2;
    let bodies = BodyArrays::from_bodies([
        ground_slab(),
        BodyDesc::capsule(1.0, radius, 0.4)
            .at(Point3::new(0.0, 0.5, 0.0))
            .with_orientation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2)),
    ]);
    let mut world = World::new(bodies, resting_config()).expect("valid scene");

    world.run_steps(250);

    let store = world.body_store();
    let y = store.position(1).y;
    assert!((y - (SLAB_TOP + radius)).abs() < 0.02, "final height {y}");
    // Still lying along X
    let axis = store.orientation(1) * Vector3::y();
    assert!(axis.y.abs() < 0.05, "capsule axis {axis}");
}

/// Two spheres stacked vertically settle one on the other.
#[test]
fn sphere_stack_settles() {
    let bodies = BodyArrays::from_bodies([
        ground_slab(),
        BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 0.6, 0.0)),
        BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 1.7, 0.0)),
    ]);
    let mut world = World::new(bodies, resting_config()).expect("valid scene");

    world.run_steps(300);

    let store = world.body_store();
    assert!((store.position(1).y - 0.55).abs() < 0.02);
    assert!((store.position(2).y - 1.55).abs() < 0.03);
}
