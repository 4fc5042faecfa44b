//! Core types for the XPBD rigid-body simulation core.
//!
//! This crate provides the data the stepping pipeline operates on:
//!
//! - [`BodyStore`] - Structure-of-arrays storage of every body
//! - [`BodyArrays`] / [`BodyState`] - Flat host-facing input and snapshots
//! - [`BodyDesc`] / [`MassProperties`] - Typed scene construction helpers
//! - [`Shape`] - Sphere, box and capsule collision shapes
//! - [`SimulationConfig`] - Timestep, gravity, solver and contact settings
//! - [`SimError`] - Configuration and divergence errors
//!
//! # Design Philosophy
//!
//! These types hold no physics. Validation happens once, when data enters
//! the store, so the per-step stages can assume well-formed input:
//! unit quaternions, positive shape dimensions, non-negative friction and
//! inverse masses.
//!
//! # Coordinate System
//!
//! - Gravity defaults to -Y
//! - Right-handed
//! - Quaternions are exchanged with the host as `[w, x, y, z]`
//! - Angular velocities are expressed in the world frame
//!
//! # Example
//!
//! ```
//! use xpbd_types::{BodyArrays, BodyDesc, BodyStore};
//! use nalgebra::{Point3, Vector3};
//!
//! let arrays = BodyArrays::from_bodies([
//!     BodyDesc::fixed_cuboid(Vector3::new(50.0, 0.05, 50.0)),
//!     BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 1.0, 0.0)),
//! ]);
//!
//! let store = BodyStore::from_arrays(arrays).unwrap();
//! assert!(store.is_static(0));
//! assert_eq!(store.position(1).y, 1.0);
//! ```

#![doc(html_root_url = "https://docs.rs/xpbd-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
// Allow certain clippy lints that are overly pedantic for type definitions
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod error;
mod shape;
mod store;

pub use body::{BodyDesc, DEFAULT_FRICTION, MassProperties};
pub use config::{
    BroadPhaseConfig, CoefficientCombine, ContactConfig, STANDARD_GRAVITY, SimulationConfig,
    SolverConfig, SolverMode, validate_timestep,
};
pub use error::SimError;
pub use shape::{Shape, ShapeKind};
pub use store::{
    BodyArrays, BodyState, BodyStore, BodyViewMut, InverseInertiaArray, world_inverse_inertia,
};

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_store_from_descs() {
        let arrays = BodyArrays::from_bodies([
            BodyDesc::capsule(1.0, 0.2, 0.5).at(Point3::new(1.0, 2.0, 3.0)),
            BodyDesc::fixed(Shape::sphere(1.0)),
        ]);
        let store = BodyStore::from_arrays(arrays).unwrap();

        assert_eq!(store.shape(0).kind(), ShapeKind::Capsule);
        assert_eq!(store.position(0), Point3::new(1.0, 2.0, 3.0));
        assert!(store.is_static(1));
    }

    #[test]
    fn test_state_layout_is_wxyz() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.5);
        let arrays = BodyArrays::from_bodies([BodyDesc::sphere(1.0, 0.1).with_orientation(q)]);
        let state = BodyStore::from_arrays(arrays).unwrap().state();

        let [w, x, y, z] = state.orientations[0];
        assert!((w - (0.25_f64).cos()).abs() < 1e-12);
        assert!((x - (0.25_f64).sin()).abs() < 1e-12);
        assert!(y.abs() < 1e-12 && z.abs() < 1e-12);
    }
}
