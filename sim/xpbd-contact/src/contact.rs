//! Contact records produced by the narrowphase and consumed by the solvers.

use nalgebra::{Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unordered pair of bodies whose bounding boxes overlap.
///
/// Always stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CandidatePair {
    /// Lower body index.
    pub a: usize,
    /// Higher body index.
    pub b: usize,
}

impl CandidatePair {
    /// Create a pair, ordering the indices.
    #[must_use]
    pub fn new(i: usize, j: usize) -> Self {
        if i < j {
            Self { a: i, b: j }
        } else {
            Self { a: j, b: i }
        }
    }
}

/// Witness geometry of one contact point, before it is bound to bodies.
///
/// `point_a` lies on the surface of the first shape, `point_b` on the
/// second. The normal points from the second shape toward the first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactGeometry {
    /// Deepest point of the first shape toward the second.
    pub point_a: Point3<f64>,
    /// Deepest point of the second shape toward the first.
    pub point_b: Point3<f64>,
    /// Unit normal from the second shape to the first.
    pub normal: Vector3<f64>,
}

impl ContactGeometry {
    /// Signed penetration depth, positive when overlapping.
    #[must_use]
    pub fn depth(&self) -> f64 {
        (self.point_b - self.point_a).dot(&self.normal)
    }

    /// Swap the roles of the two shapes.
    #[must_use]
    pub fn flip(self) -> Self {
        Self {
            point_a: self.point_b,
            point_b: self.point_a,
            normal: -self.normal,
        }
    }
}

/// Witness points of a contact evaluated at the current body poses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactFrame {
    /// Lever arm from body a's origin to its witness point (world frame).
    pub r_a: Vector3<f64>,
    /// Lever arm from body b's origin to its witness point (world frame).
    pub r_b: Vector3<f64>,
    /// Witness point on body a.
    pub p_a: Point3<f64>,
    /// Witness point on body b.
    pub p_b: Point3<f64>,
}

/// A contact constraint between two bodies.
///
/// Contacts are rebuilt every step; the accumulated multipliers start at
/// zero and there is no warm starting.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Contact {
    /// First body.
    pub body_a: usize,
    /// Second body.
    pub body_b: usize,
    /// World contact point at generation time (midpoint of the witnesses).
    pub point: Point3<f64>,
    /// Unit normal pointing from body b to body a.
    pub normal: Vector3<f64>,
    /// Penetration depth at generation time (negative = separated).
    pub depth: f64,
    /// Witness point on body a in body a's frame.
    pub local_anchor_a: Vector3<f64>,
    /// Witness point on body b in body b's frame.
    pub local_anchor_b: Vector3<f64>,
    /// Combined friction coefficient.
    pub friction: f64,
    /// Compliance (inverse stiffness, m/N).
    pub compliance: f64,
    /// Accumulated normal Lagrange multiplier (position solver), `>= 0`.
    pub lambda_normal: f64,
    /// Accumulated static friction multiplier (position solver).
    pub lambda_tangent: f64,
    /// Accumulated normal impulse applied by the velocity solver.
    pub normal_impulse: f64,
    /// Accumulated tangential impulse applied by the velocity solver.
    pub tangent_impulse: Vector3<f64>,
    /// Relative normal velocity before the position solver ran
    /// (negative = approaching).
    pub pre_solve_normal_speed: f64,
}

impl Contact {
    /// Witness points and lever arms at the given poses.
    #[must_use]
    pub fn frame(
        &self,
        x_a: &Point3<f64>,
        q_a: &UnitQuaternion<f64>,
        x_b: &Point3<f64>,
        q_b: &UnitQuaternion<f64>,
    ) -> ContactFrame {
        let r_a = q_a * self.local_anchor_a;
        let r_b = q_b * self.local_anchor_b;
        ContactFrame {
            r_a,
            r_b,
            p_a: x_a + r_a,
            p_b: x_b + r_b,
        }
    }

    /// Penetration depth along the contact normal for a frame.
    #[must_use]
    pub fn depth_at(&self, frame: &ContactFrame) -> f64 {
        (frame.p_b - frame.p_a).dot(&self.normal)
    }

    /// Check if the velocity solver applied any friction.
    #[must_use]
    pub fn has_friction_impulse(&self) -> bool {
        self.tangent_impulse.norm_squared() > 0.0
    }
}

/// Generalized inverse mass of a body at lever arm `r` along direction `n`.
///
/// `w = m⁻¹ + (r × n)ᵀ I⁻¹ (r × n)` with the world-frame inverse inertia.
#[must_use]
pub fn generalized_inverse_mass(
    inverse_mass: f64,
    world_inverse_inertia: &nalgebra::Matrix3<f64>,
    r: &Vector3<f64>,
    n: &Vector3<f64>,
) -> f64 {
    let rn = r.cross(n);
    inverse_mass + rn.dot(&(world_inverse_inertia * rn))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    #[test]
    fn test_candidate_pair_ordering() {
        assert_eq!(CandidatePair::new(5, 2), CandidatePair { a: 2, b: 5 });
        assert_eq!(CandidatePair::new(2, 5), CandidatePair::new(5, 2));
        assert!(CandidatePair::new(0, 9) < CandidatePair::new(1, 2));
    }

    #[test]
    fn test_geometry_depth_and_flip() {
        let g = ContactGeometry {
            point_a: Point3::new(0.0, -0.1, 0.0),
            point_b: Point3::new(0.0, 0.0, 0.0),
            normal: Vector3::y(),
        };
        assert_relative_eq!(g.depth(), 0.1, epsilon = 1e-12);

        let f = g.flip();
        assert_relative_eq!(f.depth(), 0.1, epsilon = 1e-12);
        assert_eq!(f.normal, -Vector3::y());
    }

    #[test]
    fn test_generalized_inverse_mass() {
        // Lever arm parallel to the normal adds nothing
        let inv_i = Matrix3::identity() * 2.0;
        let w = generalized_inverse_mass(1.0, &inv_i, &Vector3::y(), &Vector3::y());
        assert_relative_eq!(w, 1.0);

        // Perpendicular lever arm of length 1 adds the inverse inertia
        let w = generalized_inverse_mass(1.0, &inv_i, &Vector3::x(), &Vector3::y());
        assert_relative_eq!(w, 3.0);

        // Static body
        let w = generalized_inverse_mass(0.0, &Matrix3::zeros(), &Vector3::x(), &Vector3::y());
        assert_eq!(w, 0.0);
    }
}
