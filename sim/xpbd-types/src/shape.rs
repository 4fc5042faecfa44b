//! Collision shapes.
//!
//! Shapes are described in the body's local frame, centered on the body
//! origin. The host hands them over as an integer kind code plus three
//! parameters; [`Shape::from_raw`] validates them once at construction so no
//! stage has to re-check dimensions while stepping.
//!
//! | Code | Kind      | Parameters                         |
//! |------|-----------|------------------------------------|
//! | 0    | Sphere    | `[radius, _, _]`                   |
//! | 1    | Box       | `[hx, hy, hz]` (half extents)      |
//! | 2    | Capsule   | `[radius, half_length, _]` (axis Y) |

use nalgebra::{UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Result, SimError};

/// Shape kind tag, mirroring the integer codes accepted from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeKind {
    /// Sphere (code 0).
    Sphere,
    /// Oriented box (code 1).
    Box,
    /// Capsule along the local Y axis (code 2).
    Capsule,
}

impl ShapeKind {
    /// Look up a kind by its integer code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Sphere),
            1 => Some(Self::Box),
            2 => Some(Self::Capsule),
            _ => None,
        }
    }

    /// The integer code of this kind.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Sphere => 0,
            Self::Box => 1,
            Self::Capsule => 2,
        }
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sphere => write!(f, "sphere"),
            Self::Box => write!(f, "box"),
            Self::Capsule => write!(f, "capsule"),
        }
    }
}

/// A validated collision shape in body-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Sphere centered on the body origin.
    Sphere {
        /// Radius (> 0).
        radius: f64,
    },
    /// Box centered on the body origin.
    Box {
        /// Half extents along the local axes (each > 0).
        half_extents: Vector3<f64>,
    },
    /// Capsule: a segment along local Y swept by a sphere.
    Capsule {
        /// Radius (> 0).
        radius: f64,
        /// Half the length of the core segment (≥ 0).
        half_length: f64,
    },
}

impl Shape {
    /// Create a sphere.
    #[must_use]
    pub const fn sphere(radius: f64) -> Self {
        Self::Sphere { radius }
    }

    /// Create a box from half extents.
    #[must_use]
    pub const fn cuboid(half_extents: Vector3<f64>) -> Self {
        Self::Box { half_extents }
    }

    /// Create a capsule along local Y.
    #[must_use]
    pub const fn capsule(radius: f64, half_length: f64) -> Self {
        Self::Capsule {
            radius,
            half_length,
        }
    }

    /// Build and validate a shape from a host kind code and parameters.
    ///
    /// `index` is only used to label errors.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownShapeKind`] for an unrecognized code and
    /// [`SimError::InvalidShape`] for non-positive or non-finite dimensions.
    pub fn from_raw(index: usize, code: i32, params: [f64; 3]) -> Result<Self> {
        let kind = ShapeKind::from_code(code).ok_or(SimError::UnknownShapeKind { index, code })?;
        let shape = match kind {
            ShapeKind::Sphere => Self::sphere(params[0]),
            ShapeKind::Box => Self::cuboid(Vector3::new(params[0], params[1], params[2])),
            ShapeKind::Capsule => Self::capsule(params[0], params[1]),
        };
        shape.validate(index)?;
        Ok(shape)
    }

    /// Check that every dimension is finite and in range.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidShape`] naming the first bad dimension.
    pub fn validate(&self, index: usize) -> Result<()> {
        match *self {
            Self::Sphere { radius } => positive(index, "sphere radius", radius),
            Self::Box { half_extents } => {
                positive(index, "box half extent x", half_extents.x)?;
                positive(index, "box half extent y", half_extents.y)?;
                positive(index, "box half extent z", half_extents.z)
            }
            Self::Capsule {
                radius,
                half_length,
            } => {
                positive(index, "capsule radius", radius)?;
                if !half_length.is_finite() || half_length < 0.0 {
                    return Err(SimError::invalid_shape(
                        index,
                        format!("capsule half length must be >= 0 and finite, got {half_length}"),
                    ));
                }
                Ok(())
            }
        }
    }

    /// The kind tag of this shape.
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        match self {
            Self::Sphere { .. } => ShapeKind::Sphere,
            Self::Box { .. } => ShapeKind::Box,
            Self::Capsule { .. } => ShapeKind::Capsule,
        }
    }

    /// The three host parameters describing this shape.
    #[must_use]
    pub fn params(&self) -> [f64; 3] {
        match *self {
            Self::Sphere { radius } => [radius, 0.0, 0.0],
            Self::Box { half_extents } => [half_extents.x, half_extents.y, half_extents.z],
            Self::Capsule {
                radius,
                half_length,
            } => [radius, half_length, 0.0],
        }
    }

    /// Radius of the smallest origin-centered sphere enclosing the shape.
    #[must_use]
    pub fn bounding_radius(&self) -> f64 {
        match *self {
            Self::Sphere { radius } => radius,
            Self::Box { half_extents } => half_extents.norm(),
            Self::Capsule {
                radius,
                half_length,
            } => radius + half_length,
        }
    }

    /// Half extents of the world-aligned bounding box for the given orientation.
    #[must_use]
    pub fn aabb_half_extents(&self, orientation: &UnitQuaternion<f64>) -> Vector3<f64> {
        match *self {
            Self::Sphere { radius } => Vector3::repeat(radius),
            Self::Box { half_extents } => {
                // |R| * h gives the tight box around all 8 rotated corners
                let rot = orientation.to_rotation_matrix();
                rot.matrix().abs() * half_extents
            }
            Self::Capsule {
                radius,
                half_length,
            } => {
                let axis = orientation * Vector3::y();
                axis.abs() * half_length + Vector3::repeat(radius)
            }
        }
    }
}

fn positive(index: usize, what: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid_shape(
            index,
            format!("{what} must be positive and finite, got {value}"),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn test_kind_codes() {
        for kind in [ShapeKind::Sphere, ShapeKind::Box, ShapeKind::Capsule] {
            assert_eq!(ShapeKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ShapeKind::from_code(3), None);
        assert_eq!(ShapeKind::from_code(-1), None);
    }

    #[test]
    fn test_from_raw() {
        let s = Shape::from_raw(0, 0, [0.5, 0.0, 0.0]).unwrap();
        assert_eq!(s, Shape::sphere(0.5));

        let b = Shape::from_raw(0, 1, [1.0, 2.0, 3.0]).unwrap();
        assert_eq!(b.kind(), ShapeKind::Box);

        let c = Shape::from_raw(0, 2, [0.2, 0.0, 0.0]).unwrap();
        assert_eq!(c, Shape::capsule(0.2, 0.0));
    }

    #[test]
    fn test_from_raw_rejects_bad_input() {
        assert_eq!(
            Shape::from_raw(3, 9, [1.0, 1.0, 1.0]),
            Err(SimError::UnknownShapeKind { index: 3, code: 9 })
        );
        assert!(matches!(
            Shape::from_raw(1, 0, [0.0, 0.0, 0.0]),
            Err(SimError::InvalidShape { index: 1, .. })
        ));
        assert!(Shape::from_raw(0, 0, [-1.0, 0.0, 0.0]).is_err());
        assert!(Shape::from_raw(0, 1, [1.0, 0.0, 1.0]).is_err());
        assert!(Shape::from_raw(0, 1, [1.0, f64::NAN, 1.0]).is_err());
        assert!(Shape::from_raw(0, 2, [0.1, -0.5, 0.0]).is_err());
    }

    #[test]
    fn test_aabb_half_extents() {
        let b = Shape::cuboid(Vector3::new(1.0, 1.0, 1.0));
        let h = b.aabb_half_extents(&UnitQuaternion::identity());
        assert_relative_eq!(h, Vector3::new(1.0, 1.0, 1.0), epsilon = 1e-12);

        // 45 degrees about Z widens X and Y to sqrt(2)
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_4);
        let h = b.aabb_half_extents(&q);
        assert_relative_eq!(h.x, 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(h.y, 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(h.z, 1.0, epsilon = 1e-12);

        let c = Shape::capsule(0.5, 1.0);
        let h = c.aabb_half_extents(&UnitQuaternion::identity());
        assert_relative_eq!(h, Vector3::new(0.5, 1.5, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_bounding_radius() {
        assert_relative_eq!(Shape::sphere(0.3).bounding_radius(), 0.3);
        assert_relative_eq!(Shape::capsule(0.3, 1.0).bounding_radius(), 1.3);
        assert_relative_eq!(
            Shape::cuboid(Vector3::new(1.0, 2.0, 2.0)).bounding_radius(),
            3.0,
            epsilon = 1e-12
        );
    }
}
