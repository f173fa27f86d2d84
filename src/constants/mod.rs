//! constants module
//!
//! container for compile-time constants

/// (F * m^-1) vacuum permittivity https://en.wikipedia.org/wiki/Vacuum_permittivity
pub const VAC_PERM: f64 = 8.8541878188e-12;

/// (C) elementary charge https://en.wikipedia.org/wiki/Elementary_charge
pub const ELEC_CHARGE: f64 = 1.602176634e-19;

/// (J * K^-1) boltzmann constant https://en.wikipedia.org/wiki/Boltzmann_constant
pub const BOLTZMANN: f64 = 1.380649e-23;

/// (K) reference temperature the velocity table is normalized against
pub const REF_TEMP: f64 = 77.0;

/// lowest temperature (K) the Omar-Reggiani correction is valid for
pub const MIN_TEMP: f64 = 77.0;

/// highest temperature (K) the Omar-Reggiani correction is valid for
pub const MAX_TEMP: f64 = 110.0;

/// bulk space-charge-to-potential conversion prefactor, absorbs e/eps0 in mm*V units
///
/// kappa = KAPPA_PREFACTOR * h^2 is applied per grid level with that level's own h
pub const KAPPA_PREFACTOR: f64 = 0.7072 * 4.0;

/// relative permittivity of germanium
pub const EPS_GE: f64 = 16.0;

/// relative permittivity of vacuum (ditch region)
pub const EPS_VACUUM: f64 = 1.0;

/// successive-over-relaxation acceleration constant used by the relaxation solver
pub const SOR_ACC: f64 = 1.4;

/// gauss-seidel iterations between convergence checks
pub const CONV_CHECK_ITER: u64 = 25;

/// convergence tolerance on the Poisson (bias) pass, max-abs per-pixel delta
pub const POISSON_TOL: f64 = 1e-9;

/// convergence tolerance on the Laplace (weighting) pass, max-abs per-pixel delta
pub const LAPLACE_TOL: f64 = 1e-10;

/// default maximum sweeps on the finest grid level
pub const DEFAULT_MAX_ITERATIONS: u64 = 30_000;

/// undepleted-contact detection threshold on weighting potential
pub const WP_SATURATED: f64 = 0.999;

/// weighting-potential threshold for the step-budget-exhaustion check: a
/// carrier this close to the contact with two steps left is treated as
/// effectively arrived even though it hasn't crossed `WP_SATURATED`
pub const WP_NEAR_BUDGET: f64 = 0.99;

/// undepleted-contact detection threshold on the per-step weighting potential delta
pub const WP_STEP_FLOOR: f64 = 2e-4;
