//! hpge-field-sim
//!
//! a coaxial HPGe detector field and pulse-shape simulator: a multi-grid
//! SOR solver for the bias and weighting potentials on a cylindrically
//! symmetric (r, z) grid, plus a Shockley-Ramo charge-drift signal
//! generator with anisotropic carrier velocities and an RC preamp response

pub mod config;
pub mod constants;
pub mod drift;
pub mod error;
pub mod field;
pub mod geometry;
pub mod helpers;
pub mod io;
pub mod setup;
pub mod signal;
pub mod solver;
pub mod velocity;
