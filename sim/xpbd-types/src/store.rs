//! Structure-of-arrays body storage.
//!
//! [`BodyStore`] is the single owner of per-body data. Each attribute lives in
//! its own contiguous buffer indexed by body number, so the per-body stages
//! (prediction, velocity reconciliation) are plain loops over slices and the
//! contact stages address bodies by index.
//!
//! The host supplies bodies as [`BodyArrays`]: parallel flat arrays with
//! quaternions in `[w, x, y, z]` layout and shapes as integer kind codes.
//! Everything is validated once in [`BodyStore::from_arrays`].

use nalgebra::{Matrix3, Point3, Quaternion, UnitQuaternion, Vector3};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::body::{BodyDesc, DEFAULT_FRICTION};
use crate::shape::Shape;
use crate::{Result, SimError};

/// Orientations whose norm is further than this from 1 are reported when
/// normalized on input.
const RENORMALIZE_WARN_TOL: f64 = 1e-5;

/// Inverse inertia tensors as supplied by the host.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InverseInertiaArray {
    /// Body-frame diagonal, one `[ixx, iyy, izz]` per body.
    Diagonal(Vec<[f64; 3]>),
    /// Full body-frame 3×3 tensor, row-major, one per body.
    Full(Vec<[f64; 9]>),
}

impl InverseInertiaArray {
    /// Number of bodies described.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Diagonal(v) => v.len(),
            Self::Full(v) => v.len(),
        }
    }

    /// Check if no bodies are described.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matrix(&self, index: usize) -> Matrix3<f64> {
        match self {
            Self::Diagonal(v) => Matrix3::from_diagonal(&Vector3::from(v[index])),
            Self::Full(v) => Matrix3::from_row_slice(&v[index]),
        }
    }
}

impl Default for InverseInertiaArray {
    fn default() -> Self {
        Self::Diagonal(Vec::new())
    }
}

/// Flat, host-facing description of every body in a world.
///
/// All arrays are indexed by body number and must have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyArrays {
    /// Positions, N×3.
    pub positions: Vec<[f64; 3]>,
    /// Orientations as `[w, x, y, z]`, N×4. Normalized on input.
    pub orientations: Vec<[f64; 4]>,
    /// Linear velocities, N×3.
    pub linear_velocities: Vec<[f64; 3]>,
    /// World-frame angular velocities, N×3.
    pub angular_velocities: Vec<[f64; 3]>,
    /// Inverse masses, N. Zero marks an immovable body.
    pub inverse_masses: Vec<f64>,
    /// Body-frame inverse inertia, N×3 diagonal or N×9 full.
    pub inverse_inertias: InverseInertiaArray,
    /// Shape kind codes, N.
    pub shape_kinds: Vec<i32>,
    /// Shape parameters, N×3.
    pub shape_params: Vec<[f64; 3]>,
    /// Friction coefficients, N. Defaults to 0.5 per body when absent.
    pub frictions: Option<Vec<f64>>,
}

impl BodyArrays {
    /// Flatten typed body descriptions into host arrays.
    #[must_use]
    pub fn from_bodies(bodies: impl IntoIterator<Item = BodyDesc>) -> Self {
        let mut arrays = Self::default();
        let mut inertias: Vec<[f64; 3]> = Vec::new();
        let mut frictions = Vec::new();

        for b in bodies {
            let q = b.orientation.quaternion();
            arrays.positions.push(b.position.coords.into());
            arrays.orientations.push([q.w, q.i, q.j, q.k]);
            arrays.linear_velocities.push(b.linear_velocity.into());
            arrays.angular_velocities.push(b.angular_velocity.into());
            arrays.inverse_masses.push(b.inverse_mass);
            inertias.push(b.inverse_inertia.into());
            arrays.shape_kinds.push(b.shape.kind().code());
            arrays.shape_params.push(b.shape.params());
            frictions.push(b.friction);
        }

        arrays.inverse_inertias = InverseInertiaArray::Diagonal(inertias);
        arrays.frictions = Some(frictions);
        arrays
    }

    /// Number of bodies, taken from the position array.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if there are no bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn check_lengths(&self) -> Result<()> {
        let n = self.len();
        let lengths = [
            ("orientations", self.orientations.len()),
            ("linear_velocities", self.linear_velocities.len()),
            ("angular_velocities", self.angular_velocities.len()),
            ("inverse_masses", self.inverse_masses.len()),
            ("inverse_inertias", self.inverse_inertias.len()),
            ("shape_kinds", self.shape_kinds.len()),
            ("shape_params", self.shape_params.len()),
        ];
        for (field, actual) in lengths {
            if actual != n {
                return Err(SimError::length_mismatch(field, n, actual));
            }
        }
        if let Some(frictions) = &self.frictions {
            if frictions.len() != n {
                return Err(SimError::length_mismatch("frictions", n, frictions.len()));
            }
        }
        Ok(())
    }
}

/// Snapshot of the mutable part of every body.
///
/// Returned by value: the caller owns the copy.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyState {
    /// Positions, N×3.
    pub positions: Vec<[f64; 3]>,
    /// Orientations as `[w, x, y, z]`, N×4.
    pub orientations: Vec<[f64; 4]>,
    /// Linear velocities, N×3.
    pub linear_velocities: Vec<[f64; 3]>,
    /// World-frame angular velocities, N×3.
    pub angular_velocities: Vec<[f64; 3]>,
}

impl BodyState {
    /// Number of bodies in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Mutable borrow of the kinematic buffers alongside the read-only ones.
///
/// Splitting the store this way lets a stage write poses while reading mass
/// and shape data without cloning.
#[derive(Debug)]
pub struct BodyViewMut<'a> {
    /// Positions.
    pub positions: &'a mut [Point3<f64>],
    /// Orientations.
    pub orientations: &'a mut [UnitQuaternion<f64>],
    /// Linear velocities.
    pub linear_velocities: &'a mut [Vector3<f64>],
    /// World-frame angular velocities.
    pub angular_velocities: &'a mut [Vector3<f64>],
    /// Inverse masses.
    pub inverse_masses: &'a [f64],
    /// Body-frame inverse inertia tensors.
    pub inverse_inertias: &'a [Matrix3<f64>],
    /// Shapes.
    pub shapes: &'a [Shape],
}

/// Owner of all per-body simulation data.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyStore {
    positions: Vec<Point3<f64>>,
    orientations: Vec<UnitQuaternion<f64>>,
    linear_velocities: Vec<Vector3<f64>>,
    angular_velocities: Vec<Vector3<f64>>,
    inverse_masses: Vec<f64>,
    inverse_inertias: Vec<Matrix3<f64>>,
    shapes: Vec<Shape>,
    frictions: Vec<f64>,
}

impl BodyStore {
    /// Validate host arrays and build the store.
    ///
    /// Orientations are normalized. Immovable bodies (inverse mass 0) have
    /// their inverse inertia forced to zero so no correction can rotate them.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on length mismatch, unknown shape kind,
    /// invalid shape dimensions, negative or non-finite friction, a zero or
    /// non-finite orientation, invalid mass properties, or non-finite
    /// positions and velocities.
    pub fn from_arrays(arrays: BodyArrays) -> Result<Self> {
        arrays.check_lengths()?;
        let n = arrays.len();

        let mut store = Self {
            positions: Vec::with_capacity(n),
            orientations: Vec::with_capacity(n),
            linear_velocities: Vec::with_capacity(n),
            angular_velocities: Vec::with_capacity(n),
            inverse_masses: Vec::with_capacity(n),
            inverse_inertias: Vec::with_capacity(n),
            shapes: Vec::with_capacity(n),
            frictions: Vec::with_capacity(n),
        };

        for i in 0..n {
            let shape = Shape::from_raw(i, arrays.shape_kinds[i], arrays.shape_params[i])?;

            let friction = arrays
                .frictions
                .as_ref()
                .map_or(DEFAULT_FRICTION, |f| f[i]);
            if !friction.is_finite() || friction < 0.0 {
                return Err(SimError::InvalidFriction {
                    index: i,
                    value: friction,
                });
            }

            let inv_mass = arrays.inverse_masses[i];
            if !inv_mass.is_finite() || inv_mass < 0.0 {
                return Err(SimError::invalid_mass(
                    i,
                    format!("inverse mass must be >= 0 and finite, got {inv_mass}"),
                ));
            }
            let inv_inertia = if inv_mass == 0.0 {
                Matrix3::zeros()
            } else {
                validate_inverse_inertia(i, arrays.inverse_inertias.matrix(i))?
            };

            store.positions.push(finite_point(i, "position", arrays.positions[i])?);
            store
                .orientations
                .push(normalize_orientation(i, arrays.orientations[i])?);
            store.linear_velocities.push(finite_vector(
                i,
                "linear velocity",
                arrays.linear_velocities[i],
            )?);
            store.angular_velocities.push(finite_vector(
                i,
                "angular velocity",
                arrays.angular_velocities[i],
            )?);
            store.inverse_masses.push(inv_mass);
            store.inverse_inertias.push(inv_inertia);
            store.shapes.push(shape);
            store.frictions.push(friction);
        }

        Ok(store)
    }

    /// Number of bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the store holds no bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position of body `i`.
    #[must_use]
    pub fn position(&self, i: usize) -> Point3<f64> {
        self.positions[i]
    }

    /// Orientation of body `i`.
    #[must_use]
    pub fn orientation(&self, i: usize) -> UnitQuaternion<f64> {
        self.orientations[i]
    }

    /// Linear velocity of body `i`.
    #[must_use]
    pub fn linear_velocity(&self, i: usize) -> Vector3<f64> {
        self.linear_velocities[i]
    }

    /// World-frame angular velocity of body `i`.
    #[must_use]
    pub fn angular_velocity(&self, i: usize) -> Vector3<f64> {
        self.angular_velocities[i]
    }

    /// Inverse mass of body `i`.
    #[must_use]
    pub fn inverse_mass(&self, i: usize) -> f64 {
        self.inverse_masses[i]
    }

    /// Body-frame inverse inertia of body `i`.
    #[must_use]
    pub fn inverse_inertia(&self, i: usize) -> Matrix3<f64> {
        self.inverse_inertias[i]
    }

    /// World-frame inverse inertia of body `i`: `R I⁻¹ Rᵀ`.
    #[must_use]
    pub fn world_inverse_inertia(&self, i: usize) -> Matrix3<f64> {
        world_inverse_inertia(&self.orientations[i], &self.inverse_inertias[i])
    }

    /// Shape of body `i`.
    #[must_use]
    pub fn shape(&self, i: usize) -> &Shape {
        &self.shapes[i]
    }

    /// Friction coefficient of body `i`.
    #[must_use]
    pub fn friction(&self, i: usize) -> f64 {
        self.frictions[i]
    }

    /// Check if body `i` is immovable.
    #[must_use]
    pub fn is_static(&self, i: usize) -> bool {
        self.inverse_masses[i] == 0.0
    }

    /// All positions.
    #[must_use]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// All orientations.
    #[must_use]
    pub fn orientations(&self) -> &[UnitQuaternion<f64>] {
        &self.orientations
    }

    /// All linear velocities.
    #[must_use]
    pub fn linear_velocities(&self) -> &[Vector3<f64>] {
        &self.linear_velocities
    }

    /// All angular velocities.
    #[must_use]
    pub fn angular_velocities(&self) -> &[Vector3<f64>] {
        &self.angular_velocities
    }

    /// All inverse masses.
    #[must_use]
    pub fn inverse_masses(&self) -> &[f64] {
        &self.inverse_masses
    }

    /// All shapes.
    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// All friction coefficients.
    #[must_use]
    pub fn frictions(&self) -> &[f64] {
        &self.frictions
    }

    /// Borrow the kinematic buffers mutably.
    pub fn view_mut(&mut self) -> BodyViewMut<'_> {
        BodyViewMut {
            positions: &mut self.positions,
            orientations: &mut self.orientations,
            linear_velocities: &mut self.linear_velocities,
            angular_velocities: &mut self.angular_velocities,
            inverse_masses: &self.inverse_masses,
            inverse_inertias: &self.inverse_inertias,
            shapes: &self.shapes,
        }
    }

    /// Copy out positions, orientations and velocities.
    #[must_use]
    pub fn state(&self) -> BodyState {
        BodyState {
            positions: self.positions.iter().map(|p| p.coords.into()).collect(),
            orientations: self
                .orientations
                .iter()
                .map(|q| [q.w, q.i, q.j, q.k])
                .collect(),
            linear_velocities: self.linear_velocities.iter().map(|&v| v.into()).collect(),
            angular_velocities: self.angular_velocities.iter().map(|&v| v.into()).collect(),
        }
    }

    /// Overwrite positions, orientations and velocities.
    ///
    /// The whole snapshot is validated before anything is written, so on
    /// error the store is unchanged. Orientations are normalized.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::LengthMismatch`] if any array does not match the
    /// body count, [`SimError::InvalidOrientation`] for a quaternion that
    /// cannot be normalized, and [`SimError::InvalidConfig`] for non-finite
    /// positions or velocities.
    pub fn set_state(&mut self, state: &BodyState) -> Result<()> {
        let n = self.len();
        let lengths = [
            ("positions", state.positions.len()),
            ("orientations", state.orientations.len()),
            ("linear_velocities", state.linear_velocities.len()),
            ("angular_velocities", state.angular_velocities.len()),
        ];
        for (field, actual) in lengths {
            if actual != n {
                return Err(SimError::length_mismatch(field, n, actual));
            }
        }

        let positions = (0..n)
            .map(|i| finite_point(i, "position", state.positions[i]))
            .collect::<Result<Vec<_>>>()?;
        let orientations = (0..n)
            .map(|i| normalize_orientation(i, state.orientations[i]))
            .collect::<Result<Vec<_>>>()?;
        let linear = (0..n)
            .map(|i| finite_vector(i, "linear velocity", state.linear_velocities[i]))
            .collect::<Result<Vec<_>>>()?;
        let angular = (0..n)
            .map(|i| finite_vector(i, "angular velocity", state.angular_velocities[i]))
            .collect::<Result<Vec<_>>>()?;

        self.positions = positions;
        self.orientations = orientations;
        self.linear_velocities = linear;
        self.angular_velocities = angular;
        Ok(())
    }

    /// Index of the first body holding a `NaN` or `Inf`, if any.
    #[must_use]
    pub fn first_non_finite(&self) -> Option<usize> {
        (0..self.len()).find(|&i| {
            !(self.positions[i].coords.iter().all(|x| x.is_finite())
                && self.orientations[i].coords.iter().all(|x| x.is_finite())
                && self.linear_velocities[i].iter().all(|x| x.is_finite())
                && self.angular_velocities[i].iter().all(|x| x.is_finite()))
        })
    }
}

/// Rotate a body-frame inverse inertia into the world frame: `R I⁻¹ Rᵀ`.
#[must_use]
pub fn world_inverse_inertia(
    orientation: &UnitQuaternion<f64>,
    inverse_inertia: &Matrix3<f64>,
) -> Matrix3<f64> {
    let r = orientation.to_rotation_matrix();
    r.matrix() * inverse_inertia * r.matrix().transpose()
}

fn normalize_orientation(index: usize, wxyz: [f64; 4]) -> Result<UnitQuaternion<f64>> {
    let q = Quaternion::new(wxyz[0], wxyz[1], wxyz[2], wxyz[3]);
    let norm = q.norm();
    if !norm.is_finite() || norm <= f64::EPSILON {
        return Err(SimError::InvalidOrientation { index });
    }
    if (norm - 1.0).abs() > RENORMALIZE_WARN_TOL {
        warn!(body = index, norm, "orientation is not unit length, normalizing");
    }
    Ok(UnitQuaternion::from_quaternion(q))
}

fn finite_point(index: usize, what: &str, v: [f64; 3]) -> Result<Point3<f64>> {
    finite_vector(index, what, v).map(Point3::from)
}

fn finite_vector(index: usize, what: &str, v: [f64; 3]) -> Result<Vector3<f64>> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(Vector3::from(v))
    } else {
        Err(SimError::invalid_config(format!(
            "body {index}: {what} must be finite, got {v:?}"
        )))
    }
}

fn validate_inverse_inertia(index: usize, m: Matrix3<f64>) -> Result<Matrix3<f64>> {
    if !m.iter().all(|x| x.is_finite()) {
        return Err(SimError::invalid_mass(index, "inverse inertia must be finite"));
    }
    if m.diagonal().iter().any(|&d| d < 0.0) {
        return Err(SimError::invalid_mass(
            index,
            "inverse inertia diagonal must be >= 0",
        ));
    }
    let scale = m.abs().max().max(1.0);
    if (m - m.transpose()).abs().max() > 1e-9 * scale {
        return Err(SimError::invalid_mass(
            index,
            "inverse inertia tensor must be symmetric",
        ));
    }
    Ok(m)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn two_bodies() -> BodyArrays {
        BodyArrays::from_bodies([
            BodyDesc::fixed_cuboid(Vector3::new(5.0, 0.1, 5.0)),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 1.0, 0.0)),
        ])
    }

    #[test]
    fn test_from_arrays() {
        let store = BodyStore::from_arrays(two_bodies()).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.is_static(0));
        assert!(!store.is_static(1));
        assert_relative_eq!(store.position(1).y, 1.0);
        assert_eq!(store.shape(1), &Shape::sphere(0.5));
        assert_eq!(store.friction(1), DEFAULT_FRICTION);
    }

    #[test]
    fn test_length_mismatch() {
        let mut arrays = two_bodies();
        arrays.inverse_masses.pop();
        assert_eq!(
            BodyStore::from_arrays(arrays),
            Err(SimError::length_mismatch("inverse_masses", 2, 1))
        );

        let mut arrays = two_bodies();
        arrays.frictions = Some(vec![0.5]);
        assert!(matches!(
            BodyStore::from_arrays(arrays),
            Err(SimError::LengthMismatch {
                field: "frictions",
                ..
            })
        ));
    }

    #[test]
    fn test_default_friction() {
        let mut arrays = two_bodies();
        arrays.frictions = None;
        let store = BodyStore::from_arrays(arrays).unwrap();
        assert_eq!(store.frictions(), &[0.5, 0.5]);
    }

    #[test]
    fn test_rejects_bad_bodies() {
        let mut arrays = two_bodies();
        arrays.shape_kinds[1] = 5;
        assert_eq!(
            BodyStore::from_arrays(arrays),
            Err(SimError::UnknownShapeKind { index: 1, code: 5 })
        );

        let mut arrays = two_bodies();
        arrays.frictions = Some(vec![0.5, -0.1]);
        assert!(matches!(
            BodyStore::from_arrays(arrays),
            Err(SimError::InvalidFriction { index: 1, .. })
        ));

        let mut arrays = two_bodies();
        arrays.orientations[0] = [0.0; 4];
        assert_eq!(
            BodyStore::from_arrays(arrays),
            Err(SimError::InvalidOrientation { index: 0 })
        );

        let mut arrays = two_bodies();
        arrays.inverse_masses[1] = -1.0;
        assert!(matches!(
            BodyStore::from_arrays(arrays),
            Err(SimError::InvalidMass { index: 1, .. })
        ));

        let mut arrays = two_bodies();
        arrays.positions[1][0] = f64::NAN;
        assert!(BodyStore::from_arrays(arrays).is_err());
    }

    #[test]
    fn test_orientation_normalized_on_input() {
        let mut arrays = two_bodies();
        arrays.orientations[1] = [2.0, 0.0, 0.0, 0.0];
        let store = BodyStore::from_arrays(arrays).unwrap();
        assert_relative_eq!(store.orientation(1).coords.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_static_inverse_inertia_zeroed() {
        let mut arrays = two_bodies();
        arrays.inverse_inertias = InverseInertiaArray::Diagonal(vec![[1.0; 3], [1.0; 3]]);
        let store = BodyStore::from_arrays(arrays).unwrap();
        assert_eq!(store.inverse_inertia(0), Matrix3::zeros());
        assert_eq!(store.inverse_inertia(1), Matrix3::identity());
    }

    #[test]
    fn test_full_inverse_inertia() {
        let mut arrays = two_bodies();
        let full = [2.0, 0.1, 0.0, 0.1, 3.0, 0.0, 0.0, 0.0, 4.0];
        arrays.inverse_inertias = InverseInertiaArray::Full(vec![[0.0; 9], full]);
        let store = BodyStore::from_arrays(arrays).unwrap();
        assert_relative_eq!(store.inverse_inertia(1)[(0, 1)], 0.1);

        let mut arrays = two_bodies();
        let skew = [2.0, 0.5, 0.0, 0.1, 3.0, 0.0, 0.0, 0.0, 4.0];
        arrays.inverse_inertias = InverseInertiaArray::Full(vec![[0.0; 9], skew]);
        assert!(BodyStore::from_arrays(arrays).is_err());
    }

    #[test]
    fn test_world_inverse_inertia() {
        let inv = Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0));
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let w = world_inverse_inertia(&q, &inv);
        // Rotating 90 degrees about Z swaps the X and Y moments
        assert_relative_eq!(w[(0, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(w[(1, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(w[(2, 2)], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_state_roundtrip() {
        let mut store = BodyStore::from_arrays(two_bodies()).unwrap();
        let mut state = store.state();
        state.positions[1] = [3.0, 4.0, 5.0];
        state.linear_velocities[1] = [1.0, 0.0, 0.0];
        store.set_state(&state).unwrap();
        assert_eq!(store.position(1), Point3::new(3.0, 4.0, 5.0));
        assert_eq!(store.state(), state);
    }

    #[test]
    fn test_set_state_is_atomic() {
        let mut store = BodyStore::from_arrays(two_bodies()).unwrap();
        let before = store.clone();

        let mut state = store.state();
        state.positions[0] = [9.0, 9.0, 9.0];
        state.orientations[1] = [0.0; 4];
        assert_eq!(
            store.set_state(&state),
            Err(SimError::InvalidOrientation { index: 1 })
        );
        assert_eq!(store, before);

        let mut state = store.state();
        state.angular_velocities.pop();
        assert!(store.set_state(&state).is_err());
    }

    #[test]
    fn test_first_non_finite() {
        let mut store = BodyStore::from_arrays(two_bodies()).unwrap();
        assert_eq!(store.first_non_finite(), None);
        store.view_mut().linear_velocities[1].y = f64::INFINITY;
        assert_eq!(store.first_non_finite(), Some(1));
    }
}
