//! Prediction step: unconstrained semi-implicit Euler integration.
//!
//! Every movable body is advanced as if nothing were in its way:
//!
//! ```text
//! v' = v + g * dt
//! x' = x + v' * dt
//! q' = normalize(exp(ω * dt) ⊗ q)
//! ```
//!
//! The orientation update uses the exact exponential map of the world-frame
//! angular velocity, so a constant `ω` produces an exact constant-rate
//! rotation. There is no torque in this core, so `ω` is left unchanged.
//!
//! Bodies with zero inverse mass are never written.
//!
//! # Example
//!
//! ```
//! use xpbd_core::integrators::predict;
//! use xpbd_types::{BodyArrays, BodyDesc, BodyStore};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut store = BodyStore::from_arrays(BodyArrays::from_bodies([
//!     BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 10.0, 0.0)),
//! ]))
//! .unwrap();
//!
//! predict(&mut store, &Vector3::new(0.0, -9.81, 0.0), 0.01);
//!
//! assert!(store.position(0).y < 10.0);
//! assert!(store.linear_velocity(0).y < 0.0);
//! ```

use nalgebra::{Point3, UnitQuaternion, Vector3};
use xpbd_types::BodyStore;

/// Poses of every body at the start of a step, before prediction.
///
/// The velocity reconciler differences against these, and the static
/// friction constraint measures drift from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseSnapshot {
    /// Positions.
    pub positions: Vec<Point3<f64>>,
    /// Orientations.
    pub orientations: Vec<UnitQuaternion<f64>>,
}

impl PoseSnapshot {
    /// Overwrite the snapshot with the store's current poses, reusing the
    /// buffers.
    pub fn capture(&mut self, store: &BodyStore) {
        self.positions.clear();
        self.positions.extend_from_slice(store.positions());
        self.orientations.clear();
        self.orientations.extend_from_slice(store.orientations());
    }

    /// Number of bodies captured.
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

/// Predict positions, orientations and velocities of all movable bodies.
///
/// Runs in parallel over bodies with the `parallel` feature; every body is
/// independent, so the result is identical either way.
pub fn predict(store: &mut BodyStore, gravity: &Vector3<f64>, dt: f64) {
    let view = store.view_mut();
    let inverse_masses = view.inverse_masses;

    #[cfg(feature = "parallel")]
    {
        use rayon::iter::{
            IndexedParallelIterator, IntoParallelRefIterator, IntoParallelRefMutIterator,
            ParallelIterator,
        };
        view.positions
            .par_iter_mut()
            .zip(view.orientations.par_iter_mut())
            .zip(view.linear_velocities.par_iter_mut())
            .zip(view.angular_velocities.par_iter())
            .zip(inverse_masses.par_iter())
            .for_each(|((((x, q), v), w), &inv_m)| {
                predict_body(x, q, v, w, inv_m, gravity, dt);
            });
    }

    #[cfg(not(feature = "parallel"))]
    {
        view.positions
            .iter_mut()
            .zip(view.orientations.iter_mut())
            .zip(view.linear_velocities.iter_mut())
            .zip(view.angular_velocities.iter())
            .zip(inverse_masses)
            .for_each(|((((x, q), v), w), &inv_m)| {
                predict_body(x, q, v, w, inv_m, gravity, dt);
            });
    }
}

/// Advance one body. No-op for immovable bodies.
fn predict_body(
    position: &mut Point3<f64>,
    orientation: &mut UnitQuaternion<f64>,
    linear_velocity: &mut Vector3<f64>,
    angular_velocity: &Vector3<f64>,
    inverse_mass: f64,
    gravity: &Vector3<f64>,
    dt: f64,
) {
    if inverse_mass <= 0.0 {
        return;
    }

    *linear_velocity += gravity * dt;
    *position += *linear_velocity * dt;
    integrate_rotation(orientation, angular_velocity, dt);
}

/// Rotate `rotation` by the world-frame angular velocity `omega` over `dt`.
///
/// `q' = exp(ω dt) ⊗ q`, followed by renormalization to stop drift.
pub fn integrate_rotation(rotation: &mut UnitQuaternion<f64>, omega: &Vector3<f64>, dt: f64) {
    if omega.norm_squared() == 0.0 {
        return;
    }

    let delta_q = UnitQuaternion::from_scaled_axis(omega * dt);
    *rotation = delta_q * *rotation;
    rotation.renormalize();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use xpbd_types::{BodyArrays, BodyDesc};

    fn single(body: BodyDesc) -> BodyStore {
        BodyStore::from_arrays(BodyArrays::from_bodies([body])).unwrap()
    }

    #[test]
    fn test_semi_implicit_gravity() {
        let mut store = single(BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 10.0, 0.0)));
        let g = Vector3::new(0.0, -10.0, 0.0);

        predict(&mut store, &g, 0.1);

        // Velocity updated first, then used for the position
        assert_relative_eq!(store.linear_velocity(0).y, -1.0, epsilon = 1e-12);
        assert_relative_eq!(store.position(0).y, 9.9, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_velocity_without_gravity() {
        let mut store = single(BodyDesc::sphere(1.0, 0.5).with_velocity(Vector3::new(1.0, 2.0, 3.0)));

        predict(&mut store, &Vector3::zeros(), 0.5);

        assert_relative_eq!(store.position(0), Point3::new(0.5, 1.0, 1.5), epsilon = 1e-12);
        assert_relative_eq!(store.linear_velocity(0), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_rotation_is_exact() {
        let omega = Vector3::new(0.0, 0.0, std::f64::consts::PI);
        let mut store = single(BodyDesc::sphere(1.0, 0.5).with_angular_velocity(omega));

        // Two half-second steps at pi rad/s make a half turn
        predict(&mut store, &Vector3::zeros(), 0.5);
        predict(&mut store, &Vector3::zeros(), 0.5);

        let rotated = store.orientation(0) * Vector3::x();
        assert_relative_eq!(rotated, -Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(store.angular_velocity(0), omega);
    }

    #[test]
    fn test_rotation_is_world_frame() {
        let start = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.7);
        let omega = Vector3::new(0.0, 1.0, 0.0);
        let mut q = start;

        integrate_rotation(&mut q, &omega, 0.3);

        let expected = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.3) * start;
        assert_relative_eq!(q, expected, epsilon = 1e-12);
        assert_relative_eq!(q.quaternion().norm(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_snapshot_reuses_buffers() {
        let mut store = single(BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 1.0, 0.0)));
        let mut snapshot = PoseSnapshot::default();
        snapshot.capture(&store);
        predict(&mut store, &Vector3::new(0.0, -9.81, 0.0), 0.01);
        snapshot.capture(&store);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.positions[0], store.position(0));
    }

    #[test]
    fn test_static_body_untouched() {
        let mut store = single(
            BodyDesc::fixed_cuboid(Vector3::new(1.0, 1.0, 1.0))
                .at(Point3::new(1.0, 2.0, 3.0))
                .with_velocity(Vector3::new(1.0, 0.0, 0.0))
                .with_angular_velocity(Vector3::new(0.0, 1.0, 0.0)),
        );
        let before = store.state();

        predict(&mut store, &Vector3::new(0.0, -9.81, 0.0), 0.01);

        assert_eq!(store.state(), before);
    }
}
