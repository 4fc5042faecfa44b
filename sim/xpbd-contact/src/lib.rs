//! Narrowphase contact generation for the XPBD rigid-body core.
//!
//! This crate turns candidate pairs from the broadphase into [`Contact`]
//! records the position and velocity solvers consume.
//!
//! # Contact Model
//!
//! Each contact carries a pair of witness points, one on each surface, stored
//! in the owning body's local frame. The signed penetration depth is
//!
//! ```text
//! d = (p_b - p_a) · n
//! ```
//!
//! Where:
//! - `p_a`, `p_b` = witness points on bodies a and b
//! - `n` = unit normal pointing from body b to body a
//! - `d > 0` when the shapes overlap
//!
//! Because the witnesses move with their bodies, the solver re-evaluates `d`
//! after every correction without re-running collision detection.
//!
//! # Supported Pairs
//!
//! | Pair | Method |
//! |------|--------|
//! | sphere-sphere | center distance |
//! | sphere-box | clamp into box frame |
//! | box-box | SAT (15 axes), face clipping, edge-edge closest points |
//! | capsule-sphere | closest point on core segment |
//! | capsule-capsule | segment-segment closest points, endpoint manifold when parallel |
//! | capsule-box | convex search along the core segment plus endpoints |
//!
//! # Speculative Margin
//!
//! A pair reports contacts while separated by less than a margin. With
//! speculative contacts enabled (they are opt-in) the margin grows by the
//! distance the two surfaces can close in one step, so fast bodies are
//! caught the step before they would tunnel or land deep.
//!
//! # Example
//!
//! ```
//! use xpbd_contact::{CandidatePair, generate_contacts};
//! use xpbd_types::{BodyArrays, BodyDesc, BodyStore, ContactConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let store = BodyStore::from_arrays(BodyArrays::from_bodies([
//!     BodyDesc::fixed_cuboid(Vector3::new(50.0, 0.05, 50.0)),
//!     BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 0.54, 0.0)),
//! ]))
//! .unwrap();
//!
//! let mut contacts = Vec::new();
//! generate_contacts(
//!     &[CandidatePair::new(0, 1)],
//!     &store,
//!     &ContactConfig::default(),
//!     0.016,
//!     &mut contacts,
//! );
//!
//! assert_eq!(contacts.len(), 1);
//! assert!((contacts[0].depth - 0.01).abs() < 1e-12);
//! ```

#![doc(html_root_url = "https://docs.rs/xpbd-contact/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn, clippy::suboptimal_flops)]

mod contact;
mod generator;
pub mod geometry;
pub mod narrow;

pub use contact::{
    CandidatePair, Contact, ContactFrame, ContactGeometry, generalized_inverse_mass,
};
pub use generator::{collide, generate_contacts, pair_margin, surface_travel};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use xpbd_types::{BodyArrays, BodyDesc, BodyStore, ContactConfig};

    #[test]
    fn test_box_stack_contacts() {
        let store = BodyStore::from_arrays(BodyArrays::from_bodies([
            BodyDesc::fixed_cuboid(Vector3::new(10.0, 0.5, 10.0)),
            BodyDesc::cuboid(1.0, Vector3::new(0.5, 0.5, 0.5)).at(Point3::new(0.0, 0.99, 0.0)),
            BodyDesc::cuboid(1.0, Vector3::new(0.5, 0.5, 0.5)).at(Point3::new(0.1, 1.98, 0.0)),
        ]))
        .unwrap();

        let pairs = [CandidatePair::new(0, 1), CandidatePair::new(1, 2)];
        let mut contacts = Vec::new();
        generate_contacts(&pairs, &store, &ContactConfig::default(), 0.01, &mut contacts);

        assert_eq!(contacts.len(), 8);
        for c in &contacts {
            assert_relative_eq!(c.depth, 0.01, epsilon = 1e-9);
            assert!(c.body_a < c.body_b);
            // Lower body is always a, so normals point down
            assert_relative_eq!(c.normal, -Vector3::y(), epsilon = 1e-9);
        }
    }
}
