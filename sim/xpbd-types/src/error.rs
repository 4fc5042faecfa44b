//! Error types for world construction and stepping.

use thiserror::Error;

/// Errors that can occur when building or driving a simulation.
///
/// Everything except [`SimError::Diverged`] is a configuration error: it is
/// raised while validating input at construction, on `set_state`, or when a
/// per-step timestep override is supplied. Nothing is raised mid-step.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Two per-body arrays disagree on the number of bodies.
    #[error("length mismatch for {field}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Name of the offending array.
        field: &'static str,
        /// Expected number of entries.
        expected: usize,
        /// Number of entries supplied.
        actual: usize,
    },

    /// Shape kind code is not one of the supported kinds.
    #[error("body {index}: unknown shape kind code {code}")]
    UnknownShapeKind {
        /// Body index.
        index: usize,
        /// The unrecognized code.
        code: i32,
    },

    /// Shape dimensions are non-positive or non-finite.
    #[error("body {index}: invalid shape: {reason}")]
    InvalidShape {
        /// Body index.
        index: usize,
        /// Description of what's wrong.
        reason: String,
    },

    /// Friction coefficient is negative or non-finite.
    #[error("body {index}: invalid friction coefficient {value}")]
    InvalidFriction {
        /// Body index.
        index: usize,
        /// The offending coefficient.
        value: f64,
    },

    /// Orientation quaternion is zero or non-finite and cannot be normalized.
    #[error("body {index}: orientation cannot be normalized")]
    InvalidOrientation {
        /// Body index.
        index: usize,
    },

    /// Inverse mass or inverse inertia is negative or non-finite.
    #[error("body {index}: invalid mass properties: {reason}")]
    InvalidMass {
        /// Body index.
        index: usize,
        /// Description of what's wrong.
        reason: String,
    },

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Simulation diverged (`NaN` or `Inf` detected).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },
}

impl SimError {
    /// Create a length mismatch error.
    #[must_use]
    pub fn length_mismatch(field: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            field,
            expected,
            actual,
        }
    }

    /// Create an invalid shape error.
    #[must_use]
    pub fn invalid_shape(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            index,
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidMass {
            index,
            reason: reason.into(),
        }
    }

    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this is a configuration error.
    ///
    /// Every variant other than [`SimError::Diverged`] qualifies.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        !self.is_diverged()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::length_mismatch("positions", 3, 2);
        let msg = err.to_string();
        assert!(msg.contains("positions"));
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));

        let err = SimError::UnknownShapeKind { index: 4, code: 7 };
        assert!(err.to_string().contains("code 7"));

        let err = SimError::invalid_shape(1, "radius must be positive");
        assert!(err.to_string().contains("body 1"));

        let err = SimError::diverged("NaN in velocity");
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn test_error_predicates() {
        let err = SimError::diverged("test");
        assert!(err.is_diverged());
        assert!(!err.is_config_error());

        let err = SimError::invalid_config("bad value");
        assert!(err.is_config_error());
        assert!(!err.is_diverged());

        assert!(SimError::InvalidTimestep(-1.0).is_config_error());
        assert!(SimError::InvalidOrientation { index: 0 }.is_config_error());
        assert!(SimError::InvalidFriction { index: 0, value: -0.5 }.is_config_error());
        assert!(SimError::invalid_mass(2, "negative").is_config_error());
    }
}
