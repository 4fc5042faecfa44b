//! XPBD position-level contact projection.
//!
//! Each contact is a one-sided distance constraint `C = -d >= 0` where `d` is
//! the penetration depth measured between the contact's witness points at the
//! current poses. One projection of a contact computes
//!
//! ```text
//! α̃  = compliance / dt²
//! w   = m⁻¹ + (r × n)ᵀ I⁻¹ (r × n)          (per body, world inertia)
//! Δλ  = (d - α̃ λ) / (w_a + w_b + α̃)
//! λ   = max(λ + Δλ, 0)
//! p   = Δλ n
//! ```
//!
//! and moves body a by `+p` and body b by `-p`, each through its inverse
//! mass and inverse inertia. The witness points are body-local, so the depth
//! of every contact is re-evaluated from the updated poses on every visit.
//!
//! # Ordering
//!
//! - [`SolverMode::GaussSeidel`]: contacts are projected in input order and
//!   each correction is visible to the next contact.
//! - [`SolverMode::Jacobi`]: every correction of an iteration is computed
//!   from the iteration-start poses, then each body receives the average of
//!   the corrections aimed at it. The compute pass runs on rayon with the
//!   `parallel` feature; the scatter is sequential and index-ordered, so both
//!   builds produce identical results.
//!
//! # Static Friction
//!
//! With [`SolverConfig::static_friction`] set, a second constraint removes
//! tangential drift of the witness points relative to where they were at
//! the start of the step, for as long as the accumulated tangential
//! multiplier stays within `μ λ_n`.

use nalgebra::{UnitQuaternion, Vector3};
use tracing::trace;
use xpbd_contact::{Contact, generalized_inverse_mass};
use xpbd_types::{BodyStore, SolverConfig, SolverMode};

use crate::integrators::PoseSnapshot;

/// Tangential drift below this is treated as none.
const DRIFT_EPSILON: f64 = 1e-12;

/// Positional and rotational correction destined for one body.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BodyDelta {
    dx: Vector3<f64>,
    /// Rotation vector (world frame).
    dtheta: Vector3<f64>,
}

impl BodyDelta {
    /// Correction of a body receiving positional impulse `p` at lever arm `r`.
    fn from_impulse(store: &BodyStore, body: usize, r: &Vector3<f64>, p: &Vector3<f64>) -> Self {
        let inv_mass = store.inverse_mass(body);
        if inv_mass == 0.0 {
            return Self::default();
        }
        Self {
            dx: p * inv_mass,
            dtheta: store.world_inverse_inertia(body) * r.cross(p),
        }
    }

    fn add(&mut self, other: &Self) {
        self.dx += other.dx;
        self.dtheta += other.dtheta;
    }

    fn is_zero(&self) -> bool {
        self.dx == Vector3::zeros() && self.dtheta == Vector3::zeros()
    }
}

/// Result of projecting one contact against a fixed set of poses.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Projection {
    lambda_normal: f64,
    lambda_tangent: f64,
    a: BodyDelta,
    b: BodyDelta,
}

/// Apply `scale * delta` to a body's pose. Immovable bodies are skipped.
fn apply_delta(store: &mut BodyStore, body: usize, delta: &BodyDelta, scale: f64) {
    if store.is_static(body) || delta.is_zero() {
        return;
    }
    let view = store.view_mut();
    view.positions[body] += delta.dx * scale;

    let q = &mut view.orientations[body];
    *q = UnitQuaternion::from_scaled_axis(delta.dtheta * scale) * *q;
    q.renormalize();
}

/// Normal projection of `contact` at the store's current poses.
///
/// Returns the new multiplier and the per-body corrections, or `None` when
/// the clamped multiplier does not change.
fn project_normal(store: &BodyStore, contact: &Contact, alpha: f64) -> Option<Projection> {
    let (a, b) = (contact.body_a, contact.body_b);
    let frame = contact.frame(
        &store.position(a),
        &store.orientation(a),
        &store.position(b),
        &store.orientation(b),
    );
    let n = contact.normal;
    let depth = contact.depth_at(&frame);

    let w_a = generalized_inverse_mass(
        store.inverse_mass(a),
        &store.world_inverse_inertia(a),
        &frame.r_a,
        &n,
    );
    let w_b = generalized_inverse_mass(
        store.inverse_mass(b),
        &store.world_inverse_inertia(b),
        &frame.r_b,
        &n,
    );
    let denom = w_a + w_b + alpha;
    if denom <= 0.0 {
        return None;
    }

    let lambda = contact.lambda_normal;
    let new_lambda = (lambda + (depth - alpha * lambda) / denom).max(0.0);
    let delta_lambda = new_lambda - lambda;
    if delta_lambda == 0.0 {
        return None;
    }

    let p = n * delta_lambda;
    Some(Projection {
        lambda_normal: new_lambda,
        lambda_tangent: contact.lambda_tangent,
        a: BodyDelta::from_impulse(store, a, &frame.r_a, &p),
        b: BodyDelta::from_impulse(store, b, &frame.r_b, &-p),
    })
}

/// Static friction projection of `contact` at the store's current poses.
///
/// Measures how far the witness points have slid relative to each other
/// since `start` and pulls them back if the friction cone still allows it.
fn project_static_friction(
    store: &BodyStore,
    contact: &Contact,
    start: &PoseSnapshot,
) -> Option<Projection> {
    if contact.lambda_normal <= 0.0 || contact.friction <= 0.0 {
        return None;
    }

    let (a, b) = (contact.body_a, contact.body_b);
    let now = contact.frame(
        &store.position(a),
        &store.orientation(a),
        &store.position(b),
        &store.orientation(b),
    );
    let then = contact.frame(
        &start.positions[a],
        &start.orientations[a],
        &start.positions[b],
        &start.orientations[b],
    );

    let n = contact.normal;
    let drift = (now.p_a - then.p_a) - (now.p_b - then.p_b);
    let tangential = drift - n * drift.dot(&n);
    let c = tangential.norm();
    if c <= DRIFT_EPSILON {
        return None;
    }
    let t = tangential / c;

    let w_a = generalized_inverse_mass(
        store.inverse_mass(a),
        &store.world_inverse_inertia(a),
        &now.r_a,
        &t,
    );
    let w_b = generalized_inverse_mass(
        store.inverse_mass(b),
        &store.world_inverse_inertia(b),
        &now.r_b,
        &t,
    );
    if w_a + w_b <= 0.0 {
        return None;
    }

    let delta_lambda = -c / (w_a + w_b);
    let new_lambda = contact.lambda_tangent + delta_lambda.abs();
    if new_lambda > contact.friction * contact.lambda_normal {
        // Kinetic regime: the velocity solver handles sliding
        return None;
    }

    let p = t * delta_lambda;
    Some(Projection {
        lambda_normal: contact.lambda_normal,
        lambda_tangent: new_lambda,
        a: BodyDelta::from_impulse(store, a, &now.r_a, &p),
        b: BodyDelta::from_impulse(store, b, &now.r_b, &-p),
    })
}

/// Iterative XPBD position solver.
///
/// Holds the scratch buffers of the Jacobi mode so repeated steps do not
/// reallocate.
#[derive(Debug, Clone, Default)]
pub struct PositionSolver {
    projections: Vec<Option<Projection>>,
    deltas: Vec<BodyDelta>,
    counts: Vec<u32>,
}

impl PositionSolver {
    /// Create a solver with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `config.iterations` projection passes over `contacts`.
    ///
    /// Multipliers accumulate on the contacts themselves; they are expected
    /// to be zero on entry. `start` holds the poses at the start of the step
    /// and is only read when static friction is enabled.
    pub fn solve(
        &mut self,
        store: &mut BodyStore,
        contacts: &mut [Contact],
        start: &PoseSnapshot,
        config: &SolverConfig,
        dt: f64,
    ) {
        if contacts.is_empty() {
            return;
        }

        for _ in 0..config.iterations {
            match config.mode {
                SolverMode::GaussSeidel => Self::gauss_seidel_pass(store, contacts, start, config, dt),
                SolverMode::Jacobi => self.jacobi_pass(store, contacts, start, config, dt),
            }
        }

        trace!(
            contacts = contacts.len(),
            iterations = config.iterations,
            mode = %config.mode,
            "position solve"
        );
    }

    fn gauss_seidel_pass(
        store: &mut BodyStore,
        contacts: &mut [Contact],
        start: &PoseSnapshot,
        config: &SolverConfig,
        dt: f64,
    ) {
        for contact in contacts.iter_mut() {
            let alpha = contact.compliance / (dt * dt);
            if let Some(proj) = project_normal(store, contact, alpha) {
                contact.lambda_normal = proj.lambda_normal;
                apply_delta(store, contact.body_a, &proj.a, 1.0);
                apply_delta(store, contact.body_b, &proj.b, 1.0);
            }

            if config.static_friction {
                if let Some(proj) = project_static_friction(store, contact, start) {
                    contact.lambda_tangent = proj.lambda_tangent;
                    apply_delta(store, contact.body_a, &proj.a, 1.0);
                    apply_delta(store, contact.body_b, &proj.b, 1.0);
                }
            }
        }
    }

    fn jacobi_pass(
        &mut self,
        store: &mut BodyStore,
        contacts: &mut [Contact],
        start: &PoseSnapshot,
        config: &SolverConfig,
        dt: f64,
    ) {
        let frozen: &BodyStore = store;
        let project = |contact: &Contact| {
            let alpha = contact.compliance / (dt * dt);
            let normal = project_normal(frozen, contact, alpha);
            let friction = if config.static_friction {
                // Friction sees the multiplier this pass just produced
                let mut updated = contact.clone();
                if let Some(proj) = &normal {
                    updated.lambda_normal = proj.lambda_normal;
                }
                project_static_friction(frozen, &updated, start)
            } else {
                None
            };

            match (normal, friction) {
                (None, None) => None,
                (Some(n), None) => Some(n),
                (None, Some(f)) => Some(f),
                (Some(mut n), Some(f)) => {
                    n.lambda_tangent = f.lambda_tangent;
                    n.a.add(&f.a);
                    n.b.add(&f.b);
                    Some(n)
                }
            }
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
            contacts
                .par_iter()
                .map(project)
                .collect_into_vec(&mut self.projections);
        }

        #[cfg(not(feature = "parallel"))]
        {
            self.projections.clear();
            self.projections.extend(contacts.iter().map(project));
        }

        self.deltas.clear();
        self.deltas.resize(store.len(), BodyDelta::default());
        self.counts.clear();
        self.counts.resize(store.len(), 0);

        for (contact, proj) in contacts.iter_mut().zip(&self.projections) {
            let Some(proj) = proj else { continue };
            contact.lambda_normal = proj.lambda_normal;
            contact.lambda_tangent = proj.lambda_tangent;

            for (body, delta) in [(contact.body_a, &proj.a), (contact.body_b, &proj.b)] {
                if !delta.is_zero() {
                    self.deltas[body].add(delta);
                    self.counts[body] += 1;
                }
            }
        }

        for (body, (delta, &count)) in self.deltas.iter().zip(&self.counts).enumerate() {
            if count > 0 {
                apply_delta(store, body, delta, 1.0 / f64::from(count));
            }
        }
    }
}

/// Largest penetration over `contacts` at the store's current poses.
///
/// Zero when nothing overlaps.
#[must_use]
pub fn max_penetration(store: &BodyStore, contacts: &[Contact]) -> f64 {
    contacts
        .iter()
        .map(|c| {
            let frame = c.frame(
                &store.position(c.body_a),
                &store.orientation(c.body_a),
                &store.position(c.body_b),
                &store.orientation(c.body_b),
            );
            c.depth_at(&frame)
        })
        .fold(0.0, f64::max)
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
    use nalgebra::Point3;
    use xpbd_contact::{CandidatePair, generate_contacts};
    use xpbd_types::{BodyArrays, BodyDesc, ContactConfig};

    fn setup(bodies: Vec<BodyDesc>, compliance: f64) -> (BodyStore, Vec<Contact>, PoseSnapshot) {
        let store = BodyStore::from_arrays(BodyArrays::from_bodies(bodies)).unwrap();
        let pairs: Vec<_> = (0..store.len())
            .flat_map(|i| ((i + 1)..store.len()).map(move |j| CandidatePair::new(i, j)))
            .collect();
        let mut contacts = Vec::new();
        let config = ContactConfig::default().compliance(compliance).without_speculation();
        generate_contacts(&pairs, &store, &config, 0.01, &mut contacts);
        let mut start = PoseSnapshot::default();
        start.capture(&store);
        (store, contacts, start)
    }

    #[test]
    fn test_rigid_contact_resolves_in_one_iteration() {
        // Two equal spheres overlapping by 0.1, zero compliance
        let (mut store, mut contacts, start) = setup(
            vec![
                BodyDesc::sphere(1.0, 0.5),
                BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.9, 0.0, 0.0)),
            ],
            0.0,
        );
        assert_eq!(contacts.len(), 1);

        let config = SolverConfig::default().iterations(1);
        PositionSolver::new().solve(&mut store, &mut contacts, &start, &config, 0.01);

        assert_relative_eq!(store.position(0).x, -0.05, epsilon = 1e-12);
        assert_relative_eq!(store.position(1).x, 0.95, epsilon = 1e-12);
        assert_relative_eq!(contacts[0].lambda_normal, 0.05, epsilon = 1e-12);
        assert_relative_eq!(max_penetration(&store, &contacts), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compliance_leaves_residual() {
        let bodies = vec![
            BodyDesc::fixed_cuboid(Vector3::new(5.0, 0.5, 5.0)),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 0.9, 0.0)),
        ];
        let config = SolverConfig::default().iterations(1);

        let (mut stiff, mut stiff_contacts, start) = setup(bodies.clone(), 0.0);
        PositionSolver::new().solve(&mut stiff, &mut stiff_contacts, &start, &config, 0.01);

        // α̃ = 1e-4 / 1e-4 = 1 = w, so one pass removes half the overlap
        let (mut soft, mut soft_contacts, start) = setup(bodies, 1e-4);
        PositionSolver::new().solve(&mut soft, &mut soft_contacts, &start, &config, 0.01);

        assert_relative_eq!(stiff.position(1).y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(soft.position(1).y, 0.95, epsilon = 1e-12);
    }

    #[test]
    fn test_separated_contact_never_pulls() {
        // Within the margin but not touching
        let (mut store, mut contacts, start) = setup(
            vec![
                BodyDesc::sphere(1.0, 0.5),
                BodyDesc::sphere(1.0, 0.5).at(Point3::new(1.003, 0.0, 0.0)),
            ],
            0.0,
        );
        assert_eq!(contacts.len(), 1);
        let before = store.state();

        PositionSolver::new().solve(&mut store, &mut contacts, &start, &SolverConfig::default(), 0.01);

        assert_eq!(store.state(), before);
        assert_eq!(contacts[0].lambda_normal, 0.0);
    }

    #[test]
    fn test_static_body_never_moves() {
        let (mut store, mut contacts, start) = setup(
            vec![
                BodyDesc::fixed_cuboid(Vector3::new(1.0, 0.5, 1.0)),
                BodyDesc::cuboid(1.0, Vector3::new(0.5, 0.5, 0.5))
                    .at(Point3::new(0.2, 0.95, 0.1))
                    .with_orientation(UnitQuaternion::from_euler_angles(0.05, 0.2, 0.02)),
            ],
            0.0,
        );
        assert!(!contacts.is_empty());
        let ground = store.state();

        PositionSolver::new().solve(&mut store, &mut contacts, &start, &SolverConfig::default(), 0.01);

        let after = store.state();
        assert_eq!(after.positions[0], ground.positions[0]);
        assert_eq!(after.orientations[0], ground.orientations[0]);
        assert!(store.position(1).y > 0.95);
    }

    #[test]
    fn test_off_center_contact_rotates() {
        // Box tilted about z: only one edge touches, so the push must spin it
        let (mut store, mut contacts, start) = setup(
            vec![
                BodyDesc::fixed_cuboid(Vector3::new(5.0, 0.5, 5.0)),
                BodyDesc::cuboid(1.0, Vector3::new(0.5, 0.5, 0.5))
                    .at(Point3::new(0.0, 1.15, 0.0))
                    .with_orientation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.6)),
            ],
            0.0,
        );
        assert!(!contacts.is_empty());
        let q0 = store.orientation(1);

        PositionSolver::new().solve(&mut store, &mut contacts, &start, &SolverConfig::default(), 0.01);

        assert!(store.orientation(1).angle_to(&q0) > 1e-6);
        assert_relative_eq!(store.orientation(1).quaternion().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobi_averages_shared_body() {
        // Sphere squeezed between two static walls, both contacts push equally
        let (mut store, mut contacts, start) = setup(
            vec![
                BodyDesc::fixed_cuboid(Vector3::new(0.5, 2.0, 2.0)).at(Point3::new(-0.95, 0.0, 0.0)),
                BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.05, 0.0, 0.0)),
                BodyDesc::fixed_cuboid(Vector3::new(0.5, 2.0, 2.0)).at(Point3::new(0.95, 0.0, 0.0)),
            ],
            0.0,
        );
        assert_eq!(contacts.len(), 2);

        let config = SolverConfig::default().iterations(1).mode(SolverMode::Jacobi);
        PositionSolver::new().solve(&mut store, &mut contacts, &start, &config, 0.01);

        // Overlaps are 0.0 (left) and 0.1 (right): only the right wall pushes
        assert_relative_eq!(store.position(1).x, -0.05, epsilon = 1e-12);
        assert_eq!(contacts[0].lambda_normal, 0.0);

        // Now both overlap by 0.05: corrections cancel on average
        let (mut store, mut contacts, start) = setup(
            vec![
                BodyDesc::fixed_cuboid(Vector3::new(0.5, 2.0, 2.0)).at(Point3::new(-0.95, 0.0, 0.0)),
                BodyDesc::sphere(1.0, 0.5),
                BodyDesc::fixed_cuboid(Vector3::new(0.5, 2.0, 2.0)).at(Point3::new(0.95, 0.0, 0.0)),
            ],
            0.0,
        );
        PositionSolver::new().solve(&mut store, &mut contacts, &start, &config, 0.01);
        assert_relative_eq!(store.position(1).x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(contacts[0].lambda_normal, 0.05, epsilon = 1e-12);
        assert_relative_eq!(contacts[1].lambda_normal, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobi_converges_like_gauss_seidel() {
        let bodies = vec![
            BodyDesc::fixed_cuboid(Vector3::new(5.0, 0.5, 5.0)),
            BodyDesc::cuboid(1.0, Vector3::new(0.5, 0.5, 0.5)).at(Point3::new(0.0, 0.98, 0.0)),
        ];
        let gs = SolverConfig::default().iterations(32);
        let jacobi = gs.clone().mode(SolverMode::Jacobi);

        let (mut a, mut ca, sa) = setup(bodies.clone(), 0.0);
        PositionSolver::new().solve(&mut a, &mut ca, &sa, &gs, 0.01);
        let (mut b, mut cb, sb) = setup(bodies, 0.0);
        PositionSolver::new().solve(&mut b, &mut cb, &sb, &jacobi, 0.01);

        assert!(max_penetration(&a, &ca) < 1e-6);
        assert!(max_penetration(&b, &cb) < 1e-4);
        assert_relative_eq!(a.position(1).y, b.position(1).y, epsilon = 1e-3);
    }

    #[test]
    fn test_static_friction_holds_drift() {
        let (mut store, mut contacts, _) = setup(
            vec![
                BodyDesc::fixed_cuboid(Vector3::new(5.0, 0.5, 5.0)),
                BodyDesc::sphere(1.0, 0.5)
                    .at(Point3::new(0.0, 0.99, 0.0))
                    .with_friction(1.0),
            ],
            0.0,
        );
        // Pretend the sphere started the step 1 mm to the left
        let mut start = PoseSnapshot::default();
        start.capture(&store);
        start.positions[1].x -= 0.001;

        let config = SolverConfig::default().iterations(4).with_static_friction();
        PositionSolver::new().solve(&mut store, &mut contacts, &start, &config, 0.01);

        assert!(contacts[0].lambda_tangent > 0.0);
        assert!(contacts[0].lambda_tangent <= contacts[0].friction * contacts[0].lambda_normal);
        assert!(store.position(1).x < 0.0);
    }

    #[test]
    fn test_static_friction_respects_cone() {
        let (mut store, mut contacts, _) = setup(
            vec![
                BodyDesc::fixed_cuboid(Vector3::new(5.0, 0.5, 5.0)),
                BodyDesc::sphere(1.0, 0.5)
                    .at(Point3::new(0.0, 0.99, 0.0))
                    .with_friction(0.1),
            ],
            0.0,
        );
        // Drift far larger than μ times the 1 cm normal correction
        let mut start = PoseSnapshot::default();
        start.capture(&store);
        start.positions[1].x -= 0.5;

        let config = SolverConfig::default().iterations(4).with_static_friction();
        PositionSolver::new().solve(&mut store, &mut contacts, &start, &config, 0.01);

        assert_eq!(contacts[0].lambda_tangent, 0.0);
        assert_eq!(store.position(1).x, 0.0);
    }
}
