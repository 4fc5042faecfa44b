//! Configuration types for simulation.
//!
//! This module provides configuration types that control how the simulation
//! runs: timestep, gravity, restitution, solver settings and contact
//! generation.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Standard gravity (m/s²).
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Main configuration for a simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Default timestep (seconds). A per-step override does not change it.
    pub timestep: f64,
    /// Gravitational acceleration (m/s²). Defaults to -Y.
    pub gravity: Vector3<f64>,
    /// Coefficient of restitution in `[0, 1]`, shared by all contacts.
    pub restitution: f64,
    /// Solver configuration.
    pub solver: SolverConfig,
    /// Contact generation configuration.
    pub contact: ContactConfig,
    /// Broadphase configuration.
    pub broad_phase: BroadPhaseConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 0.016,
            gravity: Vector3::new(0.0, -STANDARD_GRAVITY, 0.0),
            restitution: 0.1,
            solver: SolverConfig::default(),
            contact: ContactConfig::default(),
            broad_phase: BroadPhaseConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a new simulation config with the given timestep.
    #[must_use]
    pub fn with_timestep(timestep: f64) -> Self {
        Self {
            timestep,
            ..Default::default()
        }
    }

    /// Create a configuration for real-time simulation (60 Hz).
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            ..Default::default()
        }
    }

    /// Create a configuration for stiff, accurate resting contact (250 Hz).
    #[must_use]
    pub fn high_fidelity() -> Self {
        Self {
            timestep: 0.004,
            solver: SolverConfig::high_accuracy(),
            contact: ContactConfig::default().compliance(1e-5),
            ..Default::default()
        }
    }

    /// Create a configuration for fast, low-fidelity simulation (30 Hz).
    #[must_use]
    pub fn fast() -> Self {
        Self {
            timestep: 1.0 / 30.0,
            solver: SolverConfig::fast(),
            ..Default::default()
        }
    }

    /// Set the gravity vector.
    #[must_use]
    pub fn gravity(mut self, gravity: Vector3<f64>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity (zero-G environment).
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Vector3::zeros();
        self
    }

    /// Set the coefficient of restitution.
    #[must_use]
    pub fn restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set the number of position solver iterations.
    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.solver.iterations = iterations;
        self
    }

    /// Set the contact compliance (inverse stiffness, m/N).
    #[must_use]
    pub fn compliance(mut self, compliance: f64) -> Self {
        self.contact.compliance = compliance;
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Set the contact configuration.
    #[must_use]
    pub fn contact(mut self, contact: ContactConfig) -> Self {
        self.contact = contact;
        self
    }

    /// Set the broadphase configuration.
    #[must_use]
    pub fn broad_phase(mut self, broad_phase: BroadPhaseConfig) -> Self {
        self.broad_phase = broad_phase;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        validate_timestep(self.timestep)?;

        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(crate::SimError::invalid_config(
                "restitution must be between 0 and 1",
            ));
        }

        self.solver.validate()?;
        self.contact.validate()?;
        self.broad_phase.validate()?;

        Ok(())
    }

    /// Get the frequency in Hz.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        1.0 / self.timestep
    }

    /// Approach speed at or below which restitution is suppressed.
    ///
    /// Zero when no threshold is configured, so every approach bounces with
    /// the configured coefficient.
    #[must_use]
    pub fn restitution_threshold(&self) -> f64 {
        self.solver.restitution_threshold.unwrap_or(0.0)
    }

    /// Suppress restitution below `2 |g| dt`, the speed a resting body gains
    /// from gravity over two steps at the configured timestep.
    ///
    /// Resting contacts then stop micro-bouncing. Call after setting gravity
    /// and the timestep.
    #[must_use]
    pub fn with_resting_threshold(mut self) -> Self {
        self.solver.restitution_threshold = Some(2.0 * self.gravity.norm() * self.timestep);
        self
    }
}

/// Check that a timestep is positive and finite.
pub fn validate_timestep(dt: f64) -> crate::Result<()> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(crate::SimError::InvalidTimestep(dt));
    }
    if dt > 1.0 {
        return Err(crate::SimError::invalid_config(
            "timestep > 1 second is likely an error",
        ));
    }
    Ok(())
}

/// Ordering strategy for the position solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverMode {
    /// Contacts are projected one after another, each seeing the previous
    /// corrections.
    #[default]
    GaussSeidel,
    /// Every correction in an iteration is computed from the same state and
    /// averaged per body before being applied.
    Jacobi,
}

impl std::fmt::Display for SolverMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GaussSeidel => write!(f, "Gauss-Seidel"),
            Self::Jacobi => write!(f, "Jacobi"),
        }
    }
}

/// Configuration for the position and velocity solvers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Number of position solver iterations per step.
    pub iterations: usize,
    /// Position solver ordering.
    pub mode: SolverMode,
    /// Resolve static friction at the position level.
    pub static_friction: bool,
    /// Approach speed (m/s) at or below which restitution is treated as
    /// zero. `None` disables the threshold.
    pub restitution_threshold: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 8,
            mode: SolverMode::GaussSeidel,
            static_friction: false,
            restitution_threshold: None,
        }
    }
}

impl SolverConfig {
    /// Create a high-accuracy solver configuration.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            iterations: 32,
            ..Default::default()
        }
    }

    /// Create a fast solver configuration.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            iterations: 4,
            ..Default::default()
        }
    }

    /// Set the number of iterations.
    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the solver mode.
    #[must_use]
    pub fn mode(mut self, mode: SolverMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable position-level static friction.
    #[must_use]
    pub fn with_static_friction(mut self) -> Self {
        self.static_friction = true;
        self
    }

    /// Set an explicit restitution speed threshold.
    #[must_use]
    pub fn restitution_threshold(mut self, threshold: f64) -> Self {
        self.restitution_threshold = Some(threshold);
        self
    }

    /// Validate the solver configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.iterations == 0 {
            return Err(crate::SimError::invalid_config(
                "iterations must be at least 1",
            ));
        }

        if let Some(threshold) = self.restitution_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(crate::SimError::invalid_config(
                    "restitution_threshold must be >= 0 and finite",
                ));
            }
        }

        Ok(())
    }
}

/// Rule for combining two per-body coefficients into one per contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoefficientCombine {
    /// `(a + b) / 2`.
    Average,
    /// `sqrt(a * b)`.
    #[default]
    GeometricMean,
    /// `min(a, b)`.
    Min,
    /// `a * b`.
    Multiply,
    /// `max(a, b)`.
    Max,
}

impl CoefficientCombine {
    /// Combine two coefficients according to the rule.
    #[must_use]
    pub fn mix(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Average => (a + b) * 0.5,
            Self::GeometricMean => (a * b).sqrt(),
            Self::Min => a.min(b),
            Self::Multiply => a * b,
            Self::Max => a.max(b),
        }
    }
}

/// Configuration for contact generation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactConfig {
    /// Contact compliance (inverse stiffness, m/N). Zero is rigid.
    pub compliance: f64,
    /// Separation (m) below which a contact is reported before touching.
    pub margin: f64,
    /// Widen the margin by the distance the pair can close in one step.
    /// Off by default; fast bodies may then pass through thin ones.
    pub speculative: bool,
    /// How per-body friction coefficients are combined.
    pub friction_combine: CoefficientCombine,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            compliance: 0.01,
            margin: 0.005,
            speculative: false,
            friction_combine: CoefficientCombine::GeometricMean,
        }
    }
}

impl ContactConfig {
    /// Set the compliance.
    #[must_use]
    pub fn compliance(mut self, compliance: f64) -> Self {
        self.compliance = compliance;
        self
    }

    /// Set the contact margin.
    #[must_use]
    pub fn margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Enable speculative contacts.
    #[must_use]
    pub fn with_speculation(mut self) -> Self {
        self.speculative = true;
        self
    }

    /// Disable speculative contacts.
    #[must_use]
    pub fn without_speculation(mut self) -> Self {
        self.speculative = false;
        self
    }

    /// Set the friction combine rule.
    #[must_use]
    pub fn friction_combine(mut self, rule: CoefficientCombine) -> Self {
        self.friction_combine = rule;
        self
    }

    /// Validate the contact configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.compliance.is_finite() || self.compliance < 0.0 {
            return Err(crate::SimError::invalid_config(
                "compliance must be >= 0 and finite",
            ));
        }

        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(crate::SimError::invalid_config(
                "contact margin must be >= 0 and finite",
            ));
        }

        Ok(())
    }
}

/// Configuration for the spatial hash broadphase.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BroadPhaseConfig {
    /// Hash cell edge length (m). `None` sizes cells to the largest movable
    /// body every step.
    pub cell_size: Option<f64>,
}

impl BroadPhaseConfig {
    /// Use a fixed cell size.
    #[must_use]
    pub fn with_cell_size(cell_size: f64) -> Self {
        Self {
            cell_size: Some(cell_size),
        }
    }

    /// Validate the broadphase configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(cell) = self.cell_size {
            if !cell.is_finite() || cell <= 0.0 {
                return Err(crate::SimError::invalid_config(
                    "cell_size must be positive and finite",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.timestep, 0.016, epsilon = 1e-12);
        assert_relative_eq!(config.gravity.y, -9.81, epsilon = 1e-12);
        assert_relative_eq!(config.restitution, 0.1);
        assert_eq!(config.solver.iterations, 8);
        assert_relative_eq!(config.contact.compliance, 0.01);
        assert_eq!(config.solver.mode, SolverMode::GaussSeidel);
        assert_eq!(config.solver.restitution_threshold, None);
        assert!(!config.contact.speculative);
        assert!(ContactConfig::default().with_speculation().speculative);
        assert_eq!(
            config.contact.friction_combine,
            CoefficientCombine::GeometricMean
        );
    }

    #[test]
    fn test_config_presets() {
        let realtime = SimulationConfig::realtime();
        assert_relative_eq!(realtime.timestep, 1.0 / 60.0, epsilon = 1e-10);

        let hifi = SimulationConfig::high_fidelity();
        assert!(hifi.validate().is_ok());
        assert_eq!(hifi.solver.iterations, 32);
        assert_relative_eq!(hifi.contact.compliance, 1e-5);

        let fast = SimulationConfig::fast();
        assert_eq!(fast.solver.iterations, 4);
    }

    #[test]
    fn test_config_builder() {
        let config = SimulationConfig::with_timestep(0.004)
            .zero_gravity()
            .restitution(0.0)
            .iterations(32)
            .compliance(1e-5);

        assert_relative_eq!(config.timestep, 0.004, epsilon = 1e-12);
        assert_relative_eq!(config.gravity.norm(), 0.0, epsilon = 1e-12);
        assert_eq!(config.solver.iterations, 32);
        assert_relative_eq!(config.contact.compliance, 1e-5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimulationConfig::default();
        config.timestep = -0.01;
        assert!(config.validate().is_err());

        config.timestep = 0.0;
        assert!(config.validate().is_err());

        config.timestep = f64::NAN;
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "invalid timestep: NaN (must be positive and finite)"
        );

        let config = SimulationConfig::default().restitution(1.5);
        assert!(config.validate().is_err());

        let config = SimulationConfig::default().compliance(-1.0);
        assert!(config.validate().is_err());

        let config = SimulationConfig::default().iterations(0);
        assert!(config.validate().is_err());

        let config = SimulationConfig::default().gravity(Vector3::new(0.0, f64::INFINITY, 0.0));
        assert!(config.validate().is_err());

        let config = SimulationConfig::default().broad_phase(BroadPhaseConfig::with_cell_size(0.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_restitution_threshold() {
        // Off unless asked for
        let config = SimulationConfig::default();
        assert_eq!(config.restitution_threshold(), 0.0);

        let config = SimulationConfig::with_timestep(0.01).with_resting_threshold();
        assert_relative_eq!(config.restitution_threshold(), 2.0 * 9.81 * 0.01, epsilon = 1e-12);

        let config = config.solver(SolverConfig::default().restitution_threshold(0.3));
        assert_eq!(config.restitution_threshold(), 0.3);

        let bad = SolverConfig::default().restitution_threshold(-1.0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_coefficient_combine() {
        assert_relative_eq!(CoefficientCombine::Average.mix(0.2, 0.6), 0.4);
        assert_relative_eq!(CoefficientCombine::GeometricMean.mix(0.25, 1.0), 0.5);
        assert_relative_eq!(CoefficientCombine::Min.mix(0.2, 0.6), 0.2);
        assert_relative_eq!(CoefficientCombine::Multiply.mix(0.5, 0.5), 0.25);
        assert_relative_eq!(CoefficientCombine::Max.mix(0.2, 0.6), 0.6);
        assert_eq!(CoefficientCombine::GeometricMean.mix(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_frequency() {
        let config = SimulationConfig::with_timestep(0.01);
        assert_relative_eq!(config.frequency(), 100.0, epsilon = 1e-10);
    }
}
