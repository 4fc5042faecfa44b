//! Shared scenes for the XPBD end-to-end tests.
//!
//! The tests themselves live under `integration/`; this crate only provides
//! the body layouts they have in common.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]

use nalgebra::{Point3, UnitQuaternion, Vector3};
use xpbd_types::{BodyArrays, BodyDesc, SimulationConfig};

/// Half-thickness of the standard ground slab.
pub const SLAB_HALF_THICKNESS: f64 = 0.05;

/// Half-width of the standard ground slab in X and Z.
pub const SLAB_HALF_WIDTH: f64 = 50.0;

/// Height of the top face of the standard ground slab.
pub const SLAB_TOP: f64 = SLAB_HALF_THICKNESS;

/// A wide immovable slab centred on the origin.
#[must_use]
pub fn ground_slab() -> BodyDesc {
    BodyDesc::fixed_cuboid(Vector3::new(
        SLAB_HALF_WIDTH,
        SLAB_HALF_THICKNESS,
        SLAB_HALF_WIDTH,
    ))
}

/// Configuration for the resting-contact scenario: 250 Hz, no bounce, 32
/// iterations, compliance `1e-5`.
#[must_use]
pub fn resting_config() -> SimulationConfig {
    SimulationConfig::with_timestep(0.004)
        .restitution(0.0)
        .iterations(32)
        .compliance(1e-5)
}

/// The slab with a unit sphere of radius 0.5 released at `height`.
#[must_use]
pub fn sphere_over_slab(height: f64) -> BodyArrays {
    BodyArrays::from_bodies([
        ground_slab(),
        BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, height, 0.0)),
    ])
}

/// A mixed pile over the slab: `layers` layers of a 3×3 grid, alternating
/// spheres, boxes and capsules, each slightly rotated and offset so no two
/// bodies start exactly aligned.
///
/// Body 0 is the slab. The pile is fully determined by `layers`.
#[must_use]
pub fn mixed_pile(layers: usize) -> BodyArrays {
    let mut bodies = vec![ground_slab()];

    for layer in 0..layers {
        for k in 0..9 {
            let i = layer * 9 + k;
            // Small deterministic jitter
            let jitter = ((i * 37 % 11) as f64 - 5.0) * 0.01;
            let position = Point3::new(
                (k % 3) as f64 - 1.0 + jitter,
                0.6 + layer as f64,
                (k / 3) as f64 - 1.0 - jitter,
            );
            let tilt = UnitQuaternion::from_euler_angles(jitter * 3.0, i as f64 * 0.3, -jitter);

            let body = match i % 3 {
                0 => BodyDesc::sphere(1.0, 0.3),
                1 => BodyDesc::cuboid(1.5, Vector3::new(0.25, 0.2, 0.3)),
                _ => BodyDesc::capsule(0.8, 0.15, 0.2),
            };
            bodies.push(body.at(position).with_orientation(tilt).with_friction(0.6));
        }
    }

    BodyArrays::from_bodies(bodies)
}

/// Penetration of a sphere of `radius` centred at `y` into the slab top,
/// zero when separated.
#[must_use]
pub fn sphere_slab_penetration(y: f64, radius: f64) -> f64 {
    (SLAB_TOP - (y - radius)).max(0.0)
}
