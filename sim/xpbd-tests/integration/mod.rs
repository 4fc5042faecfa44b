//! Integration tests for the XPBD crates.
//!
//! These tests drive whole worlds through `World::step` and check the
//! properties every step must hold:
//! - Immovable bodies never change
//! - Orientations stay unit length
//! - Far-apart bodies follow the predictor exactly
//! - Resting contact settles with bounded penetration
//! - Restitution and friction behave at their boundaries
//! - Repeated runs are bit-identical

pub mod api;
pub mod determinism;
pub mod free_motion;
pub mod friction;
pub mod orientation;
pub mod restitution;
pub mod resting_contact;
pub mod solver_modes;
pub mod static_bodies;
pub mod test_utils;
