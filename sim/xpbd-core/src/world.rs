//! Simulation world: the body store, its configuration and the stepper.
//!
//! The [`World`] exclusively owns the [`BodyStore`]. Stepping takes
//! `&mut self`, so nothing outside the pipeline can touch body state while a
//! step is in progress.

use nalgebra::Vector3;
use tracing::debug;
use xpbd_contact::Contact;
use xpbd_types::{
    BodyArrays, BodyState, BodyStore, Result, SimError, SimulationConfig, validate_timestep,
};

use crate::stepper::{StepStats, Stepper};

/// A population of rigid bodies advanced by XPBD steps.
#[derive(Debug, Clone)]
pub struct World {
    store: BodyStore,
    config: SimulationConfig,
    stepper: Stepper,
    time: f64,
    step_count: u64,
    last_stats: StepStats,
}

impl World {
    /// Build a world from flat body arrays.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is invalid or the arrays
    /// disagree in length, name an unknown shape kind, or hold invalid
    /// shape, mass, friction or orientation data.
    pub fn new(bodies: BodyArrays, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let store = BodyStore::from_arrays(bodies)?;

        debug!(
            bodies = store.len(),
            immovable = (0..store.len()).filter(|&i| store.is_static(i)).count(),
            dt = config.timestep,
            iterations = config.solver.iterations,
            mode = %config.solver.mode,
            "world created"
        );

        Ok(Self {
            stepper: Stepper::new(&config),
            store,
            config,
            time: 0.0,
            step_count: 0,
            last_stats: StepStats::default(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the simulation configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Get the body store.
    #[must_use]
    pub fn body_store(&self) -> &BodyStore {
        &self.store
    }

    /// Get the number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.store.len()
    }

    /// Get the current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Get the step count.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Get the timestep from configuration.
    #[must_use]
    pub fn timestep(&self) -> f64 {
        self.config.timestep
    }

    /// Contacts generated and solved in the last step.
    ///
    /// Empty before the first step or when nothing was in contact.
    #[must_use]
    pub fn last_contacts(&self) -> &[Contact] {
        self.stepper.contacts()
    }

    /// Summary of the last step.
    #[must_use]
    pub fn last_step_stats(&self) -> &StepStats {
        &self.last_stats
    }

    // =========================================================================
    // Simulation Control
    // =========================================================================

    /// Advance one step with the configured timestep.
    pub fn step(&mut self) {
        self.advance(self.config.timestep);
    }

    /// Advance one step with a timestep override.
    ///
    /// The configured timestep is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is not positive and finite, or exceeds one
    /// second. The world is unchanged on error.
    pub fn step_with(&mut self, dt: f64) -> Result<()> {
        validate_timestep(dt)?;
        self.advance(dt);
        Ok(())
    }

    /// Advance `n` steps with the configured timestep.
    ///
    /// Identical to calling [`World::step`] `n` times.
    pub fn run_steps(&mut self, n: usize) {
        for _ in 0..n {
            self.step();
        }
    }

    fn advance(&mut self, dt: f64) {
        self.last_stats = self.stepper.step(&mut self.store, &self.config, dt);
        self.time += dt;
        self.step_count += 1;
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Copy out positions, orientations (`[w, x, y, z]`) and velocities.
    #[must_use]
    pub fn state(&self) -> BodyState {
        self.store.state()
    }

    /// Overwrite positions, orientations and velocities.
    ///
    /// Shape, mass and friction cannot be changed. Orientations are
    /// normalized.
    ///
    /// # Errors
    ///
    /// Returns an error if any array length differs from the body count, an
    /// orientation is zero or non-finite, or a position or velocity is
    /// non-finite. The world is unchanged on error.
    pub fn set_state(&mut self, state: &BodyState) -> Result<()> {
        self.store.set_state(state)
    }

    /// Check that every body's state is finite.
    ///
    /// Stepping never checks this itself; call it when a scene may blow up.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Diverged`] naming the first non-finite body.
    pub fn check_finite(&self) -> Result<()> {
        match self.store.first_non_finite() {
            Some(i) => Err(SimError::diverged(format!(
                "body {i} has non-finite state after {} steps",
                self.step_count
            ))),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Compute the total kinetic energy of the movable bodies.
    ///
    /// Axes with zero inverse inertia (infinite inertia) carry no
    /// rotational energy and are left out.
    #[must_use]
    pub fn total_kinetic_energy(&self) -> f64 {
        (0..self.store.len())
            .filter(|&i| !self.store.is_static(i))
            .map(|i| {
                let mass = 1.0 / self.store.inverse_mass(i);
                let v = self.store.linear_velocity(i);
                let linear = 0.5 * mass * v.norm_squared();

                let omega_body = self.store.orientation(i).inverse() * self.store.angular_velocity(i);
                let angular = self
                    .store
                    .inverse_inertia(i)
                    .try_inverse()
                    .map_or(0.0, |inertia| 0.5 * omega_body.dot(&(inertia * omega_body)));

                linear + angular
            })
            .sum()
    }

    /// Compute the total linear momentum of the movable bodies.
    #[must_use]
    pub fn total_linear_momentum(&self) -> Vector3<f64> {
        (0..self.store.len())
            .filter(|&i| !self.store.is_static(i))
            .map(|i| self.store.linear_velocity(i) / self.store.inverse_mass(i))
            .fold(Vector3::zeros(), |acc, p| acc + p)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, UnitQuaternion};
    use xpbd_types::{BodyDesc, InverseInertiaArray};

    fn falling_sphere() -> BodyArrays {
        BodyArrays::from_bodies([
            BodyDesc::fixed_cuboid(Vector3::new(10.0, 0.05, 10.0)),
            BodyDesc::sphere(1.0, 0.5).at(Point3::new(0.0, 2.0, 0.0)),
        ])
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let config = SimulationConfig::default().restitution(1.5);
        let err = World::new(falling_sphere(), config).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let mut arrays = falling_sphere();
        arrays.inverse_masses.pop();
        let err = World::new(arrays, SimulationConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            SimError::LengthMismatch {
                field: "inverse_masses",
                ..
            }
        ));
    }

    #[test]
    fn test_new_rejects_unknown_shape() {
        let mut arrays = falling_sphere();
        arrays.shape_kinds[1] = 7;
        let err = World::new(arrays, SimulationConfig::default()).unwrap_err();
        assert_eq!(err, SimError::UnknownShapeKind { index: 1, code: 7 });
    }

    #[test]
    fn test_new_with_full_inertia() {
        let mut arrays = falling_sphere();
        arrays.inverse_inertias = InverseInertiaArray::Full(vec![
            [0.0; 9],
            [10.0, 0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 10.0],
        ]);
        let world = World::new(arrays, SimulationConfig::default()).unwrap();
        assert_eq!(world.body_store().inverse_inertia(1)[(1, 1)], 10.0);
    }

    #[test]
    fn test_step_advances_time() {
        let mut world = World::new(falling_sphere(), SimulationConfig::default()).unwrap();
        world.step();
        world.step_with(0.004).unwrap();

        assert_eq!(world.step_count(), 2);
        assert_relative_eq!(world.time(), 0.016 + 0.004, epsilon = 1e-15);
        // The override does not stick
        assert_eq!(world.timestep(), 0.016);
        assert_eq!(world.last_step_stats().dt, 0.004);
    }

    #[test]
    fn test_step_with_rejects_bad_dt() {
        let mut world = World::new(falling_sphere(), SimulationConfig::default()).unwrap();
        let before = world.state();

        assert_eq!(world.step_with(0.0), Err(SimError::InvalidTimestep(0.0)));
        assert!(world.step_with(f64::NAN).is_err());
        assert!(world.step_with(-0.01).is_err());

        assert_eq!(world.state(), before);
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_run_steps_equals_repeated_step() {
        let mut a = World::new(falling_sphere(), SimulationConfig::default()).unwrap();
        let mut b = a.clone();

        a.run_steps(50);
        for _ in 0..50 {
            b.step();
        }

        assert_eq!(a.state(), b.state());
        assert_eq!(a.step_count(), b.step_count());
    }

    #[test]
    fn test_state_round_trip() {
        let mut world = World::new(falling_sphere(), SimulationConfig::default()).unwrap();
        let mut state = world.state();
        state.positions[1] = [1.0, 3.0, -1.0];
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.4);
        state.orientations[1] = [q.w, q.i, q.j, q.k];
        state.linear_velocities[1] = [0.5, 0.0, 0.0];

        world.set_state(&state).unwrap();
        assert_eq!(world.state(), state);
    }

    #[test]
    fn test_set_state_validation() {
        let mut world = World::new(falling_sphere(), SimulationConfig::default()).unwrap();
        let before = world.state();

        let mut short = before.clone();
        short.angular_velocities.pop();
        assert!(matches!(
            world.set_state(&short),
            Err(SimError::LengthMismatch { .. })
        ));

        let mut zero_q = before.clone();
        zero_q.orientations[1] = [0.0; 4];
        assert_eq!(
            world.set_state(&zero_q),
            Err(SimError::InvalidOrientation { index: 1 })
        );

        assert_eq!(world.state(), before);
    }

    #[test]
    fn test_check_finite() {
        let mut world = World::new(falling_sphere(), SimulationConfig::default()).unwrap();
        assert!(world.check_finite().is_ok());

        // NaN gravity is rejected at construction, so poison the state directly
        world.store.view_mut().linear_velocities[1].x = f64::NAN;
        let err = world.check_finite().unwrap_err();
        assert!(err.is_diverged());
    }

    #[test]
    fn test_energy_and_momentum() {
        let arrays = BodyArrays::from_bodies([
            BodyDesc::fixed_cuboid(Vector3::new(1.0, 1.0, 1.0)).with_velocity(Vector3::x()),
            BodyDesc::sphere(2.0, 0.5)
                .at(Point3::new(5.0, 0.0, 0.0))
                .with_velocity(Vector3::new(3.0, 0.0, 0.0))
                .with_angular_velocity(Vector3::new(0.0, 0.0, 1.0)),
        ]);
        let world = World::new(arrays, SimulationConfig::default()).unwrap();

        // ½ m v² + ½ I ω², I = 2/5 m r² = 0.2
        assert_relative_eq!(world.total_kinetic_energy(), 9.0 + 0.1, epsilon = 1e-12);
        assert_relative_eq!(
            world.total_linear_momentum(),
            Vector3::new(6.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_last_contacts() {
        let mut world = World::new(falling_sphere(), SimulationConfig::default()).unwrap();
        assert!(world.last_contacts().is_empty());

        world.run_steps(200);
        assert!(!world.last_contacts().is_empty());
        assert!(world.last_step_stats().has_contacts());
        assert_eq!(world.last_contacts()[0].body_a, 0);
    }
}
