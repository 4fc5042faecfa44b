//! Velocity update after position projection.
//!
//! Two stages run once per step, after the position solver:
//!
//! 1. [`reconcile_velocities`] replaces the predicted velocities with the
//!    ones implied by the pose change the step actually produced:
//!
//!    ```text
//!    v = (x - x₀) / dt
//!    ω = log(q q₀⁻¹) / dt        (shortest arc)
//!    ```
//!
//! 2. [`solve_velocities`] makes one pass over the contacts and applies
//!    dynamic friction and restitution impulses at the witness points.
//!
//! # Velocity Solve
//!
//! For every contact, with relative velocity `v_rel = v_a - v_b` at the
//! contact point and normal speed `v_n = v_rel · n`:
//!
//! - **Friction** (only if `λ_n > 0`): an impulse against the tangential
//!   velocity `v_t` of magnitude `min(|v_t| / w_t, μ λ_n / dt)`, where `w_t`
//!   is the pair's generalized inverse mass along `v_t`. Friction never
//!   exceeds what the normal constraint supported this step, and never
//!   reverses the slip.
//! - **Restitution** on touching contacts: when approaching now or before the
//!   position solve, the normal speed is set to `max(-e ṽ_n, 0)` where `ṽ_n`
//!   is the normal speed captured before the position solve. This also
//!   removes the separating speed the position solver injected while pushing
//!   bodies apart.
//! - **Separated** contacts (`s > 0`, inside the margin): approach faster
//!   than `s / dt` is clipped so the gap closes exactly next step. No
//!   restitution applies until the bodies actually touch.
//!
//! An optional approach speed threshold treats restitution as zero for slow
//! impacts. It is off unless configured.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use tracing::trace;
use xpbd_contact::{Contact, generalized_inverse_mass};
use xpbd_types::BodyStore;

use crate::integrators::PoseSnapshot;

/// Tangential speed below this is treated as none.
const SLIP_EPSILON: f64 = 1e-12;

/// Restitution settings for one velocity solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestitutionParams {
    /// Coefficient of restitution in `[0, 1]`.
    pub restitution: f64,
    /// Approach speed at or below which restitution is treated as zero.
    pub threshold: f64,
}

impl RestitutionParams {
    /// Effective restitution for a pre-solve normal speed.
    #[must_use]
    pub fn effective(&self, pre_solve_normal_speed: f64) -> f64 {
        if pre_solve_normal_speed.abs() <= self.threshold {
            0.0
        } else {
            self.restitution
        }
    }
}

/// Derive velocities from the pose change since `start`.
///
/// Immovable bodies are never written.
pub fn reconcile_velocities(store: &mut BodyStore, start: &PoseSnapshot, dt: f64) {
    let inv_dt = 1.0 / dt;
    let view = store.view_mut();
    let inverse_masses = view.inverse_masses;

    #[cfg(feature = "parallel")]
    {
        use rayon::iter::{
            IndexedParallelIterator, IntoParallelRefIterator, IntoParallelRefMutIterator,
            ParallelIterator,
        };
        view.linear_velocities
            .par_iter_mut()
            .zip(view.angular_velocities.par_iter_mut())
            .zip(view.positions.par_iter())
            .zip(view.orientations.par_iter())
            .zip(start.positions.par_iter())
            .zip(start.orientations.par_iter())
            .zip(inverse_masses.par_iter())
            .for_each(|((((((v, w), x), q), x0), q0), &inv_m)| {
                reconcile_body(v, w, x, q, x0, q0, inv_m, inv_dt);
            });
    }

    #[cfg(not(feature = "parallel"))]
    {
        view.linear_velocities
            .iter_mut()
            .zip(view.angular_velocities.iter_mut())
            .zip(view.positions.iter())
            .zip(view.orientations.iter())
            .zip(&start.positions)
            .zip(&start.orientations)
            .zip(inverse_masses)
            .for_each(|((((((v, w), x), q), x0), q0), &inv_m)| {
                reconcile_body(v, w, x, q, x0, q0, inv_m, inv_dt);
            });
    }
}

#[allow(clippy::too_many_arguments)]
fn reconcile_body(
    linear_velocity: &mut Vector3<f64>,
    angular_velocity: &mut Vector3<f64>,
    position: &Point3<f64>,
    orientation: &UnitQuaternion<f64>,
    start_position: &Point3<f64>,
    start_orientation: &UnitQuaternion<f64>,
    inverse_mass: f64,
    inv_dt: f64,
) {
    if inverse_mass <= 0.0 {
        return;
    }

    *linear_velocity = (position - start_position) * inv_dt;
    *angular_velocity = rotation_rate(start_orientation, orientation) * inv_dt;
}

/// Rotation vector taking `from` to `to` in the world frame, along the
/// shortest arc.
#[must_use]
pub fn rotation_rate(from: &UnitQuaternion<f64>, to: &UnitQuaternion<f64>) -> Vector3<f64> {
    let delta = to * from.inverse();
    // q and -q are the same rotation; pick the one with w >= 0
    let delta = if delta.w < 0.0 {
        UnitQuaternion::new_unchecked(-delta.into_inner())
    } else {
        delta
    };
    delta.scaled_axis()
}

/// Velocity of the material point at lever arm `r` of a body.
fn point_velocity(store: &BodyStore, body: usize, r: &Vector3<f64>) -> Vector3<f64> {
    store.linear_velocity(body) + store.angular_velocity(body).cross(r)
}

/// Apply impulse `p` at lever arm `r`. Immovable bodies are skipped.
fn apply_impulse(store: &mut BodyStore, body: usize, r: &Vector3<f64>, p: &Vector3<f64>) {
    let inv_mass = store.inverse_mass(body);
    if inv_mass == 0.0 {
        return;
    }
    let dw = store.world_inverse_inertia(body) * r.cross(p);
    let view = store.view_mut();
    view.linear_velocities[body] += p * inv_mass;
    view.angular_velocities[body] += dw;
}

/// One pass of friction and restitution impulses over `contacts`.
///
/// Accumulated impulses are recorded on each contact. Returns the largest
/// penetration left at the post-solve poses (zero if none).
pub fn solve_velocities(
    store: &mut BodyStore,
    contacts: &mut [Contact],
    restitution: &RestitutionParams,
    dt: f64,
) -> f64 {
    let mut max_penetration = 0.0_f64;

    for contact in contacts.iter_mut() {
        let (a, b) = (contact.body_a, contact.body_b);
        let frame = contact.frame(
            &store.position(a),
            &store.orientation(a),
            &store.position(b),
            &store.orientation(b),
        );
        let n = contact.normal;
        let depth = contact.depth_at(&frame);
        max_penetration = max_penetration.max(depth);

        let inv_mass_a = store.inverse_mass(a);
        let inv_mass_b = store.inverse_mass(b);
        let inv_inertia_a = store.world_inverse_inertia(a);
        let inv_inertia_b = store.world_inverse_inertia(b);

        // Dynamic friction, bounded by the normal multiplier
        if contact.lambda_normal > 0.0 && contact.friction > 0.0 {
            let v_rel = point_velocity(store, a, &frame.r_a) - point_velocity(store, b, &frame.r_b);
            let v_t = v_rel - n * v_rel.dot(&n);
            let slip = v_t.norm();

            if slip > SLIP_EPSILON {
                let t = v_t / slip;
                let w = generalized_inverse_mass(inv_mass_a, &inv_inertia_a, &frame.r_a, &t)
                    + generalized_inverse_mass(inv_mass_b, &inv_inertia_b, &frame.r_b, &t);
                if w > 0.0 {
                    // Impulse capped at the Coulomb bound μ λ_n / dt
                    let magnitude = (slip / w).min(contact.friction * contact.lambda_normal / dt);
                    let p = -t * magnitude;
                    apply_impulse(store, a, &frame.r_a, &p);
                    apply_impulse(store, b, &frame.r_b, &-p);
                    contact.tangent_impulse += p;
                }
            }
        }

        // Normal: restitution on touching contacts, clipping on separated ones
        let v_rel = point_velocity(store, a, &frame.r_a) - point_velocity(store, b, &frame.r_b);
        let v_n = v_rel.dot(&n);
        let pre_v_n = contact.pre_solve_normal_speed;
        let e = restitution.effective(pre_v_n);
        let separation = -depth;

        let target = if separation <= 0.0 {
            (v_n < 0.0 || pre_v_n < 0.0).then(|| (-e * pre_v_n).max(0.0))
        } else {
            // Not touching yet: never bounce, only stop the gap closing past zero
            let limit = -separation / dt;
            (v_n < limit).then_some(limit)
        };

        if let Some(target) = target {
            let w = generalized_inverse_mass(inv_mass_a, &inv_inertia_a, &frame.r_a, &n)
                + generalized_inverse_mass(inv_mass_b, &inv_inertia_b, &frame.r_b, &n);
            if w > 0.0 {
                let j = (target - v_n) / w;
                let p = n * j;
                apply_impulse(store, a, &frame.r_a, &p);
                apply_impulse(store, b, &frame.r_b, &-p);
                contact.normal_impulse += j;
            }
        }
    }

    trace!(contacts = contacts.len(), max_penetration, "velocity solve");
    max_penetration
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use xpbd_contact::{CandidatePair, generate_contacts};
    use xpbd_types::{BodyArrays, BodyDesc, ContactConfig};

    const NO_THRESHOLD: RestitutionParams = RestitutionParams {
        restitution: 0.0,
        threshold: 0.0,
    };

    fn ground_and(body: BodyDesc, ground_friction: f64) -> BodyStore {
        BodyStore::from_arrays(BodyArrays::from_bodies([
            BodyDesc::fixed_cuboid(Vector3::new(10.0, 0.5, 10.0)).with_friction(ground_friction),
            body,
        ]))
        .unwrap()
    }

    fn contacts_for(store: &BodyStore) -> Vec<Contact> {
        let mut contacts = Vec::new();
        let config = ContactConfig::default().without_speculation();
        generate_contacts(&[CandidatePair::new(0, 1)], store, &config, 0.01, &mut contacts);
        contacts
    }

    #[test]
    fn test_reconcile_linear() {
        let mut store = ground_and(BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 5.0, 0.0)), 0.5);
        let mut start = PoseSnapshot::default();
        start.capture(&store);

        store.view_mut().positions[1] = Point3::new(0.1, 4.9, 0.0);
        reconcile_velocities(&mut store, &start, 0.1);

        assert_relative_eq!(store.linear_velocity(1), Vector3::new(1.0, -1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_reconcile_angular_round_trip() {
        let omega = Vector3::new(0.3, -1.2, 2.0);
        let q0 = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        let mut q = q0;
        crate::integrators::integrate_rotation(&mut q, &omega, 0.01);

        assert_relative_eq!(rotation_rate(&q0, &q) / 0.01, omega, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_rate_shortest_arc() {
        let from = UnitQuaternion::identity();
        // Rotation of 0.2 rad expressed with a negative scalar part
        let to = UnitQuaternion::new_unchecked(
            -UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.2).into_inner(),
        );
        assert_relative_eq!(rotation_rate(&from, &to), Vector3::new(0.0, 0.0, 0.2), epsilon = 1e-12);
    }

    #[test]
    fn test_reconcile_skips_static() {
        let mut store = ground_and(BodyDesc::sphere(1.0, 0.5), 0.5);
        let mut start = PoseSnapshot::default();
        start.capture(&store);
        start.positions[0].y += 1.0;

        let before = store.linear_velocity(0);
        reconcile_velocities(&mut store, &start, 0.01);
        assert_eq!(store.linear_velocity(0), before);
    }

    #[test]
    fn test_restitution_zero_stops_approach() {
        let mut store = ground_and(
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 0.999, 0.0))
                .with_velocity(Vector3::new(0.0, -2.0, 0.0)),
            0.0,
        );
        let mut contacts = contacts_for(&store);
        contacts[0].pre_solve_normal_speed = -2.0;

        solve_velocities(&mut store, &mut contacts, &NO_THRESHOLD, 0.01);

        assert_relative_eq!(store.linear_velocity(1).y, 0.0, epsilon = 1e-12);
        assert!(contacts[0].normal_impulse > 0.0);
    }

    #[test]
    fn test_restitution_bounce() {
        let mut store = ground_and(
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 0.999, 0.0))
                .with_velocity(Vector3::new(0.0, -2.0, 0.0)),
            0.0,
        );
        let mut contacts = contacts_for(&store);
        // Ground is body a, so approaching means v_n < 0 with n pointing down
        contacts[0].pre_solve_normal_speed = -2.0;

        let params = RestitutionParams {
            restitution: 0.5,
            threshold: 0.0,
        };
        solve_velocities(&mut store, &mut contacts, &params, 0.01);

        assert_relative_eq!(store.linear_velocity(1).y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_restitution_threshold() {
        let mut store = ground_and(
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 0.999, 0.0))
                .with_velocity(Vector3::new(0.0, -0.1, 0.0)),
            0.0,
        );
        let mut contacts = contacts_for(&store);
        contacts[0].pre_solve_normal_speed = -0.1;

        let params = RestitutionParams {
            restitution: 0.9,
            threshold: 0.2,
        };
        assert_eq!(params.effective(-0.1), 0.0);
        solve_velocities(&mut store, &mut contacts, &params, 0.01);

        assert_relative_eq!(store.linear_velocity(1).y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_removes_pushout_velocity() {
        // Position solve left the sphere moving up; it was resting before
        let mut store = ground_and(
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 0.999, 0.0))
                .with_velocity(Vector3::new(0.0, 0.3, 0.0)),
            0.0,
        );
        let mut contacts = contacts_for(&store);
        contacts[0].pre_solve_normal_speed = -0.05;

        solve_velocities(&mut store, &mut contacts, &NO_THRESHOLD, 0.01);
        assert_relative_eq!(store.linear_velocity(1).y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_separating_contact_untouched() {
        let mut store = ground_and(
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 0.999, 0.0))
                .with_velocity(Vector3::new(0.0, 1.0, 0.0)),
            0.0,
        );
        let mut contacts = contacts_for(&store);
        contacts[0].pre_solve_normal_speed = 1.0;

        solve_velocities(&mut store, &mut contacts, &NO_THRESHOLD, 0.01);
        assert_eq!(store.linear_velocity(1).y, 1.0);
        assert_eq!(contacts[0].normal_impulse, 0.0);
    }

    #[test]
    fn test_separated_approach_clip() {
        // 2 mm gap, falling at 1 m/s with dt 0.01: may only close 0.2 m/s
        let mut store = ground_and(
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 1.002, 0.0))
                .with_velocity(Vector3::new(0.0, -1.0, 0.0)),
            0.0,
        );
        let mut contacts = contacts_for(&store);
        assert_eq!(contacts.len(), 1);
        contacts[0].pre_solve_normal_speed = -1.0;

        let max_penetration = solve_velocities(&mut store, &mut contacts, &NO_THRESHOLD, 0.01);
        assert_relative_eq!(store.linear_velocity(1).y, -0.2, epsilon = 1e-9);
        assert_eq!(max_penetration, 0.0);
    }

    #[test]
    fn test_separated_contact_never_bounces() {
        // Same gap as the clip case, but elastic: still only the clip applies
        let mut store = ground_and(
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 1.002, 0.0))
                .with_velocity(Vector3::new(0.0, -1.0, 0.0)),
            0.0,
        );
        let mut contacts = contacts_for(&store);
        contacts[0].pre_solve_normal_speed = -1.0;

        let params = RestitutionParams {
            restitution: 0.8,
            threshold: 0.0,
        };
        solve_velocities(&mut store, &mut contacts, &params, 0.01);

        assert_relative_eq!(store.linear_velocity(1).y, -0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_friction_bounded_by_normal_multiplier() {
        // Same λ/m at every mass: the impulse hits μ λ / dt and the slip
        // change is mass independent
        for mass in [0.01, 1.0, 100.0] {
            let mut store = ground_and(
                BodyDesc::sphere(mass, 0.5)
                    .at(Point3::new(0.0, 0.999, 0.0))
                    .with_velocity(Vector3::new(2.0, 0.0, 0.0))
                    .with_friction(0.5),
                0.5,
            );
            let mut contacts = contacts_for(&store);
            contacts[0].lambda_normal = 0.001 * mass;

            solve_velocities(&mut store, &mut contacts, &NO_THRESHOLD, 0.01);

            let bound = contacts[0].friction * contacts[0].lambda_normal / 0.01;
            assert_relative_eq!(contacts[0].tangent_impulse.norm(), bound, max_relative = 1e-9);

            // w_t = 3.5 / m, so the contact point slip drops by 3.5 * 0.05
            let v = store.linear_velocity(1);
            let w = store.angular_velocity(1);
            let slip = (v + w.cross(&Vector3::new(0.0, -0.5, 0.0))).x;
            assert_relative_eq!(slip, 1.825, epsilon = 1e-9);
            assert_relative_eq!(v.x, 1.95, epsilon = 1e-9);
            // Friction below the contact spins the sphere toward rolling
            assert!(w.z < 0.0);
        }
    }

    #[test]
    fn test_zero_friction_no_tangent_impulse() {
        let mut store = ground_and(
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 0.999, 0.0))
                .with_velocity(Vector3::new(2.0, 0.0, 0.0))
                .with_friction(0.0),
            0.0,
        );
        let mut contacts = contacts_for(&store);
        assert_eq!(contacts[0].friction, 0.0);
        contacts[0].lambda_normal = 0.1;

        solve_velocities(&mut store, &mut contacts, &NO_THRESHOLD, 0.01);

        assert_eq!(store.linear_velocity(1).x, 2.0);
        assert!(!contacts[0].has_friction_impulse());
    }

    #[test]
    fn test_friction_arrests_slow_slip() {
        let mut store = ground_and(
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 0.999, 0.0))
                .with_velocity(Vector3::new(0.01, 0.0, 0.0))
                .with_friction(1.0),
            1.0,
        );
        let mut contacts = contacts_for(&store);
        contacts[0].lambda_normal = 0.01;

        solve_velocities(&mut store, &mut contacts, &NO_THRESHOLD, 0.01);

        let v = store.linear_velocity(1);
        let w = store.angular_velocity(1);
        let slip = (v + w.cross(&Vector3::new(0.0, -0.5, 0.0))).x;
        assert_relative_eq!(slip, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_static_body_bit_identical() {
        let mut store = ground_and(
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 0.999, 0.0))
                .with_velocity(Vector3::new(1.0, -2.0, 0.0)),
            0.5,
        );
        let mut contacts = contacts_for(&store);
        contacts[0].lambda_normal = 0.01;
        contacts[0].pre_solve_normal_speed = -2.0;
        let before = store.state();

        solve_velocities(&mut store, &mut contacts, &NO_THRESHOLD, 0.01);

        let after = store.state();
        assert_eq!(after.linear_velocities[0], before.linear_velocities[0]);
        assert_eq!(after.angular_velocities[0], before.angular_velocities[0]);
    }
}
