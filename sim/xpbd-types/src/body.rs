//! Per-body descriptions and mass properties.
//!
//! [`BodyDesc`] is a typed convenience for building scenes in Rust; the
//! host-facing path is the flat [`BodyArrays`](crate::BodyArrays) layout, and
//! [`BodyArrays::from_bodies`](crate::BodyArrays::from_bodies) bridges the two.

use nalgebra::{Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::shape::Shape;

/// Friction coefficient used when the host does not supply one.
pub const DEFAULT_FRICTION: f64 = 0.5;

/// Mass and diagonal inertia of a rigid body about its center of mass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass in kg (`f64::INFINITY` for immovable bodies).
    pub mass: f64,
    /// Principal moments of inertia in the body frame (kg·m²).
    pub inertia: Vector3<f64>,
}

impl MassProperties {
    /// Mass properties of an immovable body.
    #[must_use]
    pub fn infinite() -> Self {
        Self {
            mass: f64::INFINITY,
            inertia: Vector3::repeat(f64::INFINITY),
        }
    }

    /// Create mass properties for a uniform sphere.
    ///
    /// Inertia of a solid sphere: I = (2/5) * m * r²
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            inertia: Vector3::new(i, i, i),
        }
    }

    /// Create mass properties for a uniform box.
    ///
    /// Inertia of a solid box with dimensions (x, y, z):
    /// - Ixx = (1/12) * m * (y² + z²)
    /// - Iyy = (1/12) * m * (x² + z²)
    /// - Izz = (1/12) * m * (x² + y²)
    #[must_use]
    pub fn cuboid(mass: f64, half_extents: Vector3<f64>) -> Self {
        let x2 = 4.0 * half_extents.x * half_extents.x;
        let y2 = 4.0 * half_extents.y * half_extents.y;
        let z2 = 4.0 * half_extents.z * half_extents.z;

        Self {
            mass,
            inertia: Vector3::new(
                mass * (y2 + z2) / 12.0,
                mass * (x2 + z2) / 12.0,
                mass * (x2 + y2) / 12.0,
            ),
        }
    }

    /// Create mass properties for a uniform capsule along local Y.
    ///
    /// Mass is split between the cylinder and the two hemispherical caps by
    /// volume; the caps are shifted to their centroids with the parallel axis
    /// theorem.
    #[must_use]
    pub fn capsule(mass: f64, radius: f64, half_length: f64) -> Self {
        let r2 = radius * radius;
        let h = 2.0 * half_length;
        let v_cyl = std::f64::consts::PI * r2 * h;
        let v_caps = 4.0 / 3.0 * std::f64::consts::PI * r2 * radius;
        let m_cyl = mass * v_cyl / (v_cyl + v_caps);
        let m_caps = mass - m_cyl;

        let iyy = m_cyl * r2 / 2.0 + m_caps * 2.0 * r2 / 5.0;
        let ixx = m_cyl * (h * h / 12.0 + r2 / 4.0)
            + m_caps * (2.0 * r2 / 5.0 + h * h / 4.0 + 3.0 * h * radius / 8.0);

        Self {
            mass,
            inertia: Vector3::new(ixx, iyy, ixx),
        }
    }

    /// Mass properties of a uniform solid filling `shape`.
    #[must_use]
    pub fn from_shape(mass: f64, shape: &Shape) -> Self {
        match *shape {
            Shape::Sphere { radius } => Self::sphere(mass, radius),
            Shape::Box { half_extents } => Self::cuboid(mass, half_extents),
            Shape::Capsule {
                radius,
                half_length,
            } => Self::capsule(mass, radius, half_length),
        }
    }

    /// Get the inverse mass (0 if mass is infinite/static).
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.mass <= 0.0 || self.mass.is_infinite() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Get the diagonal of the inverse inertia tensor.
    ///
    /// Zero or infinite moments map to 0 (locked axis).
    #[must_use]
    pub fn inverse_inertia(&self) -> Vector3<f64> {
        self.inertia
            .map(|i| if i > 0.0 && i.is_finite() { 1.0 / i } else { 0.0 })
    }

    /// Check if this represents a static (immovable) body.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.mass <= 0.0 || self.mass.is_infinite()
    }
}

/// Typed description of one body.
///
/// # Example
///
/// ```
/// use xpbd_types::{BodyDesc, BodyArrays};
/// use nalgebra::{Point3, Vector3};
///
/// let ground = BodyDesc::fixed_cuboid(Vector3::new(50.0, 0.05, 50.0));
/// let ball = BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 1.0, 0.0));
///
/// let arrays = BodyArrays::from_bodies([ground, ball]);
/// assert_eq!(arrays.len(), 2);
/// assert_eq!(arrays.inverse_masses[0], 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyDesc {
    /// World position of the body origin.
    pub position: Point3<f64>,
    /// Orientation.
    pub orientation: UnitQuaternion<f64>,
    /// Linear velocity (m/s).
    pub linear_velocity: Vector3<f64>,
    /// Angular velocity in the world frame (rad/s).
    pub angular_velocity: Vector3<f64>,
    /// Inverse mass (0 for immovable).
    pub inverse_mass: f64,
    /// Diagonal of the body-frame inverse inertia tensor.
    pub inverse_inertia: Vector3<f64>,
    /// Collision shape.
    pub shape: Shape,
    /// Coulomb friction coefficient.
    pub friction: f64,
}

impl BodyDesc {
    /// A dynamic body of uniform density filling `shape`.
    #[must_use]
    pub fn new(mass: f64, shape: Shape) -> Self {
        let props = MassProperties::from_shape(mass, &shape);
        Self {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            inverse_mass: props.inverse_mass(),
            inverse_inertia: props.inverse_inertia(),
            shape,
            friction: DEFAULT_FRICTION,
        }
    }

    /// A dynamic sphere.
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        Self::new(mass, Shape::sphere(radius))
    }

    /// A dynamic box.
    #[must_use]
    pub fn cuboid(mass: f64, half_extents: Vector3<f64>) -> Self {
        Self::new(mass, Shape::cuboid(half_extents))
    }

    /// A dynamic capsule along local Y.
    #[must_use]
    pub fn capsule(mass: f64, radius: f64, half_length: f64) -> Self {
        Self::new(mass, Shape::capsule(radius, half_length))
    }

    /// An immovable body with the given shape.
    #[must_use]
    pub fn fixed(shape: Shape) -> Self {
        Self::new(f64::INFINITY, shape)
    }

    /// An immovable box, typically a ground slab.
    #[must_use]
    pub fn fixed_cuboid(half_extents: Vector3<f64>) -> Self {
        Self::fixed(Shape::cuboid(half_extents))
    }

    /// Set the position.
    #[must_use]
    pub fn at(mut self, position: Point3<f64>) -> Self {
        self.position = position;
        self
    }

    /// Set the orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: UnitQuaternion<f64>) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set the linear velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Set the world-frame angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, omega: Vector3<f64>) -> Self {
        self.angular_velocity = omega;
        self
    }

    /// Set the friction coefficient.
    #[must_use]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    /// Override the inverse inertia diagonal (0 locks rotation about that axis).
    #[must_use]
    pub fn with_inverse_inertia(mut self, inverse_inertia: Vector3<f64>) -> Self {
        self.inverse_inertia = inverse_inertia;
        self
    }

    /// Check if this body is immovable.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mass_properties_sphere() {
        let props = MassProperties::sphere(1.0, 1.0);
        assert_relative_eq!(props.inertia, Vector3::repeat(0.4), epsilon = 1e-10);
        assert_relative_eq!(props.inverse_mass(), 1.0);
        assert_relative_eq!(props.inverse_inertia(), Vector3::repeat(2.5), epsilon = 1e-10);
    }

    #[test]
    fn test_mass_properties_box() {
        let props = MassProperties::cuboid(12.0, Vector3::new(0.5, 0.5, 0.5));
        // For a 1x1x1 box with mass 12:
        // I = (1/12) * 12 * (1 + 1) = 2
        assert_relative_eq!(props.inertia.x, 2.0, epsilon = 1e-10);
        assert_relative_eq!(props.inertia.y, 2.0, epsilon = 1e-10);
        assert_relative_eq!(props.inertia.z, 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_mass_properties_capsule() {
        // A zero-length capsule is a sphere
        let props = MassProperties::capsule(2.0, 0.5, 0.0);
        let sphere = MassProperties::sphere(2.0, 0.5);
        assert_relative_eq!(props.inertia, sphere.inertia, epsilon = 1e-12);

        // A long capsule resists rotation about X much more than about Y
        let long = MassProperties::capsule(1.0, 0.1, 2.0);
        assert!(long.inertia.x > 10.0 * long.inertia.y);
        assert_relative_eq!(long.inertia.x, long.inertia.z);
    }

    #[test]
    fn test_infinite_mass() {
        let props = MassProperties::infinite();
        assert!(props.is_static());
        assert_eq!(props.inverse_mass(), 0.0);
        assert_eq!(props.inverse_inertia(), Vector3::zeros());
    }

    #[test]
    fn test_body_desc_builders() {
        let b = BodyDesc::sphere(2.0, 0.5)
            .at(Point3::new(1.0, 2.0, 3.0))
            .with_velocity(Vector3::new(0.0, -1.0, 0.0))
            .with_friction(0.8);
        assert_relative_eq!(b.inverse_mass, 0.5);
        assert_eq!(b.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(b.friction, 0.8);
        assert!(!b.is_static());

        let g = BodyDesc::fixed_cuboid(Vector3::new(10.0, 0.1, 10.0));
        assert!(g.is_static());
        assert_eq!(g.inverse_inertia, Vector3::zeros());
        assert_eq!(g.friction, DEFAULT_FRICTION);
    }
}
