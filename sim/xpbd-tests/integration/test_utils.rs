//! Tolerances and helpers shared by the integration tests.
//!
//! # Tolerance Hierarchy
//!
//! ```text
//! EXACT_TOL = 1e-12 ─── quantities that only see a handful of flops
//!     │
//! VELOCITY_TOL = 1e-6 ─── velocities after the contact velocity pass
//!     │
//! NORM_TOL = 1e-5 ─── unit quaternion drift after any step
//! ```

use nalgebra::{Quaternion, Vector3};
use xpbd_core::World;
use xpbd_types::BodyState;

/// Tolerance for quantities computed by a handful of operations.
pub const EXACT_TOL: f64 = 1e-12;

/// Tolerance on velocities the velocity pass drives to a target.
pub const VELOCITY_TOL: f64 = 1e-6;

/// Allowed deviation of an orientation norm from 1.
pub const NORM_TOL: f64 = 1e-5;

/// Norm of a stored `[w, x, y, z]` orientation.
pub fn quaternion_norm(q: [f64; 4]) -> f64 {
    Quaternion::new(q[0], q[1], q[2], q[3]).norm()
}

/// Horizontal speed of body `i`.
pub fn tangential_speed(world: &World, i: usize) -> f64 {
    let v = world.body_store().linear_velocity(i);
    Vector3::new(v.x, 0.0, v.z).norm()
}

/// Step `world` `n` times, collecting the state after every step.
pub fn trajectory(world: &mut World, n: usize) -> Vec<BodyState> {
    (0..n)
        .map(|_| {
            world.step();
            world.state()
        })
        .collect()
}
