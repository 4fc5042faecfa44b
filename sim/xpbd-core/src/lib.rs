//! XPBD rigid-body stepping core.
//!
//! This crate advances a population of rigid bodies through discrete time
//! steps with Extended Position-Based Dynamics. It builds on [`xpbd_types`]
//! for body storage and configuration and on [`xpbd_contact`] for contact
//! generation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          World                               │
//! │  Owns: body store, configuration, time, step count          │
//! │  Provides: step / run_steps, state get/set, diagnostics     │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Stepper                              │
//! │  Owns step-scoped buffers; runs the fixed pipeline:         │
//! │  predict → broad phase → narrow phase → position solve      │
//! │          → reconcile velocities → velocity solve            │
//! └──────┬──────────────┬──────────────┬──────────────┬─────────┘
//!        ▼              ▼              ▼              ▼
//!   integrators    broad_phase     solver        velocity
//!   (predictor)   (SpatialHash)   (XPBD λ)   (restitution,
//!                                              friction)
//! ```
//!
//! # Quick Start
//!
//! ```
//! use xpbd_core::World;
//! use xpbd_types::{BodyArrays, BodyDesc, SimulationConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let bodies = BodyArrays::from_bodies([
//!     BodyDesc::fixed_cuboid(Vector3::new(50.0, 0.05, 50.0)),
//!     BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 1.0, 0.0)),
//! ]);
//! let config = SimulationConfig::with_timestep(0.004).compliance(1e-5);
//! let mut world = World::new(bodies, config).unwrap();
//!
//! // One second of simulation time
//! world.run_steps(250);
//!
//! // Resting on the slab
//! let y = world.state().positions[1][1];
//! assert!((y - 0.55).abs() < 0.02);
//! ```
//!
//! # Solver Modes
//!
//! | Mode | Ordering | Parallel | Notes |
//! |------|----------|----------|-------|
//! | Gauss-Seidel | input contact order | no | default, fastest convergence |
//! | Jacobi | iteration-start state, averaged per body | with `parallel` | slower convergence |
//!
//! Both modes are deterministic: identical inputs give bit-identical
//! trajectories.
//!
//! # Features
//!
//! - `parallel`: run the predictor, the velocity reconciler and the Jacobi
//!   projection on rayon
//! - `serde`: serialization derives on plain data types

#![doc(html_root_url = "https://docs.rs/xpbd-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
)]

pub mod broad_phase;
pub mod integrators;
pub mod solver;
mod stepper;
pub mod velocity;
mod world;

pub use broad_phase::{Aabb, Axis, BroadPhase, BruteForce, SpatialHash};
pub use integrators::PoseSnapshot;
pub use solver::PositionSolver;
pub use stepper::{StepStats, Stepper};
pub use velocity::RestitutionParams;
pub use world::World;

// Re-export key types for convenience
pub use xpbd_contact::{CandidatePair, Contact};
pub use xpbd_types::{
    BodyArrays, BodyDesc, BodyState, BodyStore, ContactConfig, InverseInertiaArray, Result,
    Shape, ShapeKind, SimError, SimulationConfig, SolverConfig, SolverMode,
};

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
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_basic_simulation() {
        let bodies = BodyArrays::from_bodies([BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 10.0, 0.0))]);
        let mut world = World::new(bodies, SimulationConfig::default()).unwrap();

        world.run_steps(30);

        assert!(world.state().positions[0][1] < 10.0);
        assert!(world.last_contacts().is_empty());
    }

    #[test]
    fn test_momentum_conservation() {
        // Head-on collision in zero gravity: contact corrections are equal
        // and opposite, so momentum survives the impact
        let bodies = BodyArrays::from_bodies([
            BodyDesc::sphere(1.0, 0.5)
                .at(Point3::new(-1.0, 0.0, 0.0))
                .with_velocity(Vector3::new(2.0, 0.0, 0.0)),
            BodyDesc::sphere(3.0, 0.5)
                .at(Point3::new(1.0, 0.0, 0.0))
                .with_velocity(Vector3::new(-1.0, 0.0, 0.0)),
        ]);
        let config = SimulationConfig::with_timestep(0.004)
            .zero_gravity()
            .restitution(0.5);
        let mut world = World::new(bodies, config).unwrap();

        let initial_momentum = world.total_linear_momentum();
        world.run_steps(200);
        let final_momentum = world.total_linear_momentum();

        assert_relative_eq!(initial_momentum, final_momentum, epsilon = 1e-9);
        // They actually collided and separated
        let state = world.state();
        assert!(state.linear_velocities[0][0] < 0.0);
    }

    #[test]
    fn test_energy_trend() {
        // Free fall: kinetic energy gained matches potential energy lost
        let initial_height = 10.0;
        let mass = 1.0;
        let g = 9.81;
        let bodies = BodyArrays::from_bodies([
            BodyDesc::sphere(mass, 0.5).at(Point3::new(0.0, initial_height, 0.0)),
        ]);
        let mut world = World::new(bodies, SimulationConfig::high_fidelity()).unwrap();

        let initial_total = mass * g * initial_height + world.total_kinetic_energy();
        world.run_steps(125);

        let final_height = world.state().positions[0][1];
        let final_total = mass * g * final_height + world.total_kinetic_energy();

        let energy_drift = (final_total - initial_total).abs() / initial_total;
        assert!(
            energy_drift < 0.01,
            "Energy drift too large: {}%",
            energy_drift * 100.0
        );
    }

    #[test]
    fn test_static_ground() {
        let bodies = BodyArrays::from_bodies([
            BodyDesc::fixed_cuboid(Vector3::new(10.0, 0.5, 10.0)),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 1.5, 0.0)),
        ]);
        let mut world = World::new(bodies, SimulationConfig::default()).unwrap();
        let ground = world.state();

        world.run_steps(100);

        let state = world.state();
        assert_eq!(state.positions[0], ground.positions[0]);
        assert_eq!(state.orientations[0], ground.orientations[0]);
        assert!(state.positions[1][1] > 0.5);
    }
}
