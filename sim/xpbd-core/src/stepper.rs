//! The fixed per-step pipeline.
//!
//! [`Stepper`] owns every step-scoped buffer (start poses, bounding boxes,
//! candidate pairs, contacts, solver scratch) and reuses them across steps,
//! so a warmed-up simulation does not allocate per step.
//!
//! One call to [`Stepper::step`] runs, in order:
//!
//! ```text
//! snapshot ─► predict ─► broad phase ─► narrow phase ─► position solve
//!                                                            │
//!                 velocity solve ◄─ reconcile velocities ◄───┘
//! ```
//!
//! Running N steps is N calls; there is no separate multi-step path.

use tracing::debug;
use xpbd_contact::{CandidatePair, Contact, generate_contacts};
use xpbd_types::{BodyStore, SimulationConfig};

use crate::broad_phase::{Aabb, BroadPhase, SpatialHash, compute_aabbs};
use crate::integrators::{PoseSnapshot, predict};
use crate::solver::PositionSolver;
use crate::velocity::{RestitutionParams, reconcile_velocities, solve_velocities};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Summary of one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepStats {
    /// Timestep used.
    pub dt: f64,
    /// Candidate pairs from the broad phase.
    pub pairs: usize,
    /// Contacts from the narrow phase.
    pub contacts: usize,
    /// Contacts that were overlapping when generated.
    pub touching: usize,
    /// Largest penetration left after the position solve.
    pub max_penetration: f64,
}

impl StepStats {
    /// Check if any contact was generated.
    #[must_use]
    pub fn has_contacts(&self) -> bool {
        self.contacts > 0
    }
}

/// Runs the step pipeline over a [`BodyStore`].
#[derive(Debug, Clone, Default)]
pub struct Stepper {
    broad_phase: SpatialHash,
    start: PoseSnapshot,
    aabbs: Vec<Aabb>,
    pairs: Vec<CandidatePair>,
    contacts: Vec<Contact>,
    position_solver: PositionSolver,
}

impl Stepper {
    /// Create a stepper for the given configuration.
    #[must_use]
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            broad_phase: SpatialHash::with_cell_size(config.broad_phase.cell_size),
            ..Self::default()
        }
    }

    /// Candidate pairs of the last step.
    #[must_use]
    pub fn pairs(&self) -> &[CandidatePair] {
        &self.pairs
    }

    /// Contacts of the last step, with their accumulated multipliers and
    /// impulses.
    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// The broad phase, for inspection.
    #[must_use]
    pub fn broad_phase(&self) -> &SpatialHash {
        &self.broad_phase
    }

    /// Advance `store` by one step of length `dt`.
    ///
    /// `dt` must already be validated. The store is mutated in place.
    ///
    /// This performs:
    /// 1. Snapshot start-of-step poses
    /// 2. Predict unconstrained motion under gravity
    /// 3. Find candidate pairs at the predicted poses
    /// 4. Generate contacts for the candidates
    /// 5. Project positions onto the contact constraints
    /// 6. Reconcile velocities with the projected poses
    /// 7. Apply friction and restitution impulses
    pub fn step(&mut self, store: &mut BodyStore, config: &SimulationConfig, dt: f64) -> StepStats {
        // 1. Snapshot
        self.start.capture(store);

        // 2. Predict
        predict(store, &config.gravity, dt);

        // 3. Broad phase
        compute_aabbs(store, &config.contact, dt, &mut self.aabbs);
        self.broad_phase
            .find_potential_pairs(store, &self.aabbs, &mut self.pairs);

        // 4. Narrow phase
        generate_contacts(&self.pairs, store, &config.contact, dt, &mut self.contacts);
        let touching = self.contacts.iter().filter(|c| c.depth > 0.0).count();

        // 5. Position solve
        self.position_solver
            .solve(store, &mut self.contacts, &self.start, &config.solver, dt);

        // 6. Reconcile
        reconcile_velocities(store, &self.start, dt);

        // 7. Velocity solve
        let restitution = RestitutionParams {
            restitution: config.restitution,
            threshold: config.restitution_threshold(),
        };
        let max_penetration = solve_velocities(store, &mut self.contacts, &restitution, dt);

        let stats = StepStats {
            dt,
            pairs: self.pairs.len(),
            contacts: self.contacts.len(),
            touching,
            max_penetration,
        };

        debug!(
            dt,
            pairs = stats.pairs,
            contacts = stats.contacts,
            touching,
            max_penetration,
            "step"
        );

        stats
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use xpbd_types::{BodyArrays, BodyDesc};

    fn store(bodies: Vec<BodyDesc>) -> BodyStore {
        BodyStore::from_arrays(BodyArrays::from_bodies(bodies)).unwrap()
    }

    #[test]
    fn test_free_fall_matches_prediction() {
        let config = SimulationConfig::default();
        let mut store = store(vec![
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(0.0, 10.0, 0.0))
                .with_angular_velocity(Vector3::new(0.0, 2.0, 0.0)),
        ]);
        let mut predicted = store.clone();
        crate::integrators::predict(&mut predicted, &config.gravity, config.timestep);

        let stats = Stepper::new(&config).step(&mut store, &config, config.timestep);

        assert_eq!(stats.pairs, 0);
        assert!(!stats.has_contacts());
        assert_eq!(store.positions(), predicted.positions());
        assert_eq!(store.orientations(), predicted.orientations());
        // Reconciled velocity is the finite difference of the predicted pose
        assert_relative_eq!(
            store.linear_velocity(0),
            predicted.linear_velocity(0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            store.angular_velocity(0),
            predicted.angular_velocity(0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_resting_contact_stats() {
        let config = SimulationConfig::default().compliance(1e-5);
        let mut store = store(vec![
            BodyDesc::fixed_cuboid(Vector3::new(10.0, 0.5, 10.0)),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 1.0, 0.0)),
        ]);
        let mut stepper = Stepper::new(&config);

        let mut stats = StepStats::default();
        for _ in 0..100 {
            stats = stepper.step(&mut store, &config, config.timestep);
        }

        assert_eq!(stats.pairs, 1);
        assert_eq!(stats.contacts, 1);
        assert_eq!(stepper.contacts().len(), 1);
        assert_eq!(stepper.pairs()[0], CandidatePair::new(0, 1));
        assert!(stats.max_penetration < 0.01);
        assert!(store.position(1).y > 0.98);
        assert!(store.linear_velocity(1).norm() < 0.05);
    }
}
