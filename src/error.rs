//! error module
//!
//! typed error taxonomy for the field solver and signal generator

use thiserror::Error;

/// `SimError` enum
///
/// covers the error kinds a caller of this crate's core must distinguish between;
/// fatal kinds are meant to be propagated through `anyhow::Error` at the facade layer,
/// `OutOfField` / `OutsideDetector` are meant to be treated as a per-event skip
#[derive(Error, Debug)]
pub enum SimError {
    /// missing required config key, parse failure, or inconsistent sign(bias, impurity)
    #[error("config error: {0}")]
    ConfigError(String),

    /// table/file not found, permission denied, or short read
    #[error("io error: {0}")]
    IoError(String),

    /// unsorted E, too few columns, or a missing e/h summary line in a velocity table
    #[error("malformed table: {0}")]
    MalformedTable(String),

    /// point outside the loaded field/weighting-potential grid
    #[error("point ({r}, {z}) is out of the loaded field grid")]
    OutOfField { r: f64, z: f64 },

    /// start point rejected by the geometry oracle
    #[error("start point ({x}, {y}, {z}) lies outside the detector")]
    OutsideDetector { x: f64, y: f64, z: f64 },

    /// temperature outside the Omar-Reggiani validity range of [77, 110] K
    #[error("temperature {0} K is out of the [77, 110] K correction range")]
    OutOfTemperatureRange(f64),

    /// drift integrator exhausted its step budget while still in a high-field region
    #[error("drift truncated after {0} steps while still in a high-field region")]
    Truncated(usize),

    /// unrecoverable allocation failure, retained for taxonomy completeness
    #[error("allocation failure: {0}")]
    AllocFailure(String),
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::IoError(err.to_string())
    }
}

/// `SolveReport` struct
///
/// non-fatal outcome of a relaxation solve: `NotConverged` is folded into this
/// report rather than raised as a `SimError`, per the source's "warning, not
/// fatal" policy for solver divergence
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    /// true if the sweep met its tolerance before `max_iterations`
    pub converged: bool,

    /// number of sweeps performed on the finest grid level
    pub iterations: u64,

    /// max-abs per-pixel delta on the final sweep
    pub final_residual: f64,

    /// number of pixels reclassified `PINCHED` after the Poisson pass
    pub pinched_pixels: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// tests that `SimError` variants render a non-empty message
    ///
    /// # Errors
    /// - a variant's `Display` impl produces an empty string
    #[test]
    fn display_is_non_empty() {
        let errs: Vec<SimError> = vec![
            SimError::ConfigError("missing xtal_HV".into()),
            SimError::IoError("no such file".into()),
            SimError::MalformedTable("unsorted E".into()),
            SimError::OutOfField { r: 1.0, z: 2.0 },
            SimError::OutsideDetector {
                x: 0.0,
                y: 0.0,
                z: 60.0,
            },
            SimError::OutOfTemperatureRange(200.0),
            SimError::Truncated(4096),
            SimError::AllocFailure("oom".into()),
        ];

        for err in errs {
            assert!(!format!("{err}").is_empty());
        }
    }

    /// tests that `std::io::Error` converts into `SimError::IoError`
    ///
    /// # Errors
    /// - the `From` impl does not produce an `IoError` variant
    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let sim_err: SimError = io_err.into();
        assert!(matches!(sim_err, SimError::IoError(_)));
    }
}
