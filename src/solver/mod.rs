//! relaxation solver
//!
//! a multi-grid, cylindrically symmetric Gauss-Seidel-SOR-flavored (Jacobi
//! double-buffered) solver for the bias (Poisson) and weighting (Laplace)
//! potentials on the same (r, z) mesh

pub mod grid_level;
pub mod kernel;

use crate::constants::{CONV_CHECK_ITER, KAPPA_PREFACTOR, LAPLACE_TOL, POISSON_TOL, SOR_ACC};
use crate::error::SolveReport;
use crate::field::grid::Grid2D;
use crate::geometry::Geometry;
use grid_level::{prolongate, schedule, GridLevel};
use kernel::{classify, permittivity_at, relax_bulk, relax_edge, CellTag, EdgeFace};
use log::{debug, info, warn};

const MM_PER_CM: f64 = 10.0;

/// outcome of a bias (Poisson) solve: the potential, the derived E-field,
/// and a convergence report
#[derive(Debug, Clone)]
pub struct BiasSolution {
    pub potential: Grid2D<f64>,
    pub e_r: Grid2D<f64>,
    pub e_z: Grid2D<f64>,
    pub h: f64,
    pub undepleted: Grid2D<bool>,
    pub report: SolveReport,
}

/// outcome of a weighting (Laplace) solve
#[derive(Debug, Clone)]
pub struct WeightingSolution {
    pub potential: Grid2D<f64>,
    pub h: f64,
    pub report: SolveReport,
}

/// solves the bias potential and derives the E-field from it
///
/// # Arguments
/// - `geometry`: `&Geometry`
/// - `bias_v`: `f64` (V) outer-electrode bias
/// - `n0`, `m`: `f64` impurity profile coefficients, rho(z) = n0 + m*z
/// - `h_final`: `f64` (mm) finest grid spacing
/// - `max_iterations`: `u64` sweep ceiling on the finest level (halved at
///   every coarser-to-finer transition, per the multi-grid schedule)
///
/// # Returns
/// `BiasSolution`
///
/// # Errors
///
/// this never fails outright: non-convergence is reported via
/// `SolveReport` and a `log::warn!`, not an `Err`
pub fn solve_bias(
    geometry: &Geometry,
    bias_v: f64,
    n0: f64,
    m: f64,
    h_final: f64,
    max_iterations: u64,
) -> BiasSolution {
    // n-type convention (N0 > 0, hence bias < 0 by Config::validate's opposite-sign
    // rule): negate bias, gradient, and concentration so the iteration proceeds in
    // the same non-negative-potential space the clamp/bubble logic below assumes,
    // then flip the converged potential back before deriving the E-field.
    let flip = n0 > 0.0;
    let (bias_v, n0, m) = if flip {
        (-bias_v, -n0, -m)
    } else {
        (bias_v, n0, m)
    };

    let levels = schedule(geometry.l_z, geometry.r_max, h_final);

    let mut v: Grid2D<f64> = Grid2D::new(levels[0].nr, levels[0].nz);
    let mut undepleted: Grid2D<bool> = Grid2D::filled(levels[0].nr, levels[0].nz, false);
    init_linear_guess(&mut v, geometry, &levels[0], bias_v);

    let mut level_max_iter = max_iterations;
    let mut final_residual = f64::INFINITY;
    let mut total_iterations = 0u64;
    let mut converged = false;

    for (idx, level) in levels.iter().enumerate() {
        if idx > 0 {
            let prev = levels[idx - 1];
            let ratio = (prev.h / level.h).round().max(1.0) as usize;
            let mut fine_v: Grid2D<f64> = Grid2D::new(level.nr, level.nz);
            prolongate(&v, &mut fine_v, ratio);
            v = fine_v;
            undepleted = Grid2D::filled(level.nr, level.nz, false);
            level_max_iter = (level_max_iter / 2).max(1);
        }

        let tags = classify(geometry, level.nr, level.nz, level.h, bias_v, 0.0, None);
        let eps = build_eps(geometry, level);
        let kappa = KAPPA_PREFACTOR * level.h * level.h;

        let (iters, residual, level_converged) = relax_level(
            &mut v,
            &tags,
            &eps,
            level.h,
            kappa,
            1.0,
            n0,
            m,
            POISSON_TOL,
            level_max_iter,
            &mut undepleted,
        );

        total_iterations += iters;
        final_residual = residual;
        converged = level_converged;

        info!(
            "bias solve level {idx} (h = {} mm) finished after {iters} iterations, residual {residual:e}",
            level.h
        );
    }

    if !converged {
        warn!(
            "bias solve did not converge: residual {final_residual:e} after {total_iterations} iterations"
        );
    }

    if flip {
        v *= -1.0;
    }

    let finest = *levels.last().expect("schedule always has at least one level");
    let (e_r, e_z) = compute_efield(&v, finest.h);
    let pinched_pixels = undepleted.iter().filter(|u| **u).count();

    BiasSolution {
        potential: v,
        e_r,
        e_z,
        h: finest.h,
        undepleted,
        report: SolveReport {
            converged,
            iterations: total_iterations,
            final_residual,
            pinched_pixels,
        },
    }
}

/// solves the weighting potential of the point contact
///
/// # Arguments
/// - `geometry`: `&Geometry`
/// - `h_final`: `f64` (mm) finest grid spacing
/// - `max_iterations`: `u64` sweep ceiling on the finest level
/// - `pinched`: `Option<&Grid2D<bool>>` undepleted mask from a prior bias
///   solve at the same finest spacing, marking islands that float together
///
/// # Returns
/// `WeightingSolution`
///
/// # Errors
///
/// never fails outright, see `solve_bias`
pub fn solve_weighting(
    geometry: &Geometry,
    h_final: f64,
    max_iterations: u64,
    pinched: Option<&Grid2D<bool>>,
) -> WeightingSolution {
    let levels = schedule(geometry.l_z, geometry.r_max, h_final);

    let mut v: Grid2D<f64> = Grid2D::new(levels[0].nr, levels[0].nz);
    let mut scratch_mask: Grid2D<bool> = Grid2D::filled(levels[0].nr, levels[0].nz, false);

    let mut level_max_iter = max_iterations;
    let mut final_residual = f64::INFINITY;
    let mut total_iterations = 0u64;
    let mut converged = false;

    for (idx, level) in levels.iter().enumerate() {
        if idx > 0 {
            let prev = levels[idx - 1];
            let ratio = (prev.h / level.h).round().max(1.0) as usize;
            let mut fine_v: Grid2D<f64> = Grid2D::new(level.nr, level.nz);
            prolongate(&v, &mut fine_v, ratio);
            v = fine_v;
            level_max_iter = (level_max_iter / 2).max(1);
        }

        let level_pinched = if idx + 1 == levels.len() { pinched } else { None };
        let tags = classify(geometry, level.nr, level.nz, level.h, 0.0, 1.0, level_pinched);
        let eps = build_eps(geometry, level);
        let kappa = KAPPA_PREFACTOR * level.h * level.h;

        let (iters, residual, level_converged) = relax_level(
            &mut v,
            &tags,
            &eps,
            level.h,
            kappa,
            0.0,
            0.0,
            0.0,
            LAPLACE_TOL,
            level_max_iter,
            &mut scratch_mask,
        );

        total_iterations += iters;
        final_residual = residual;
        converged = level_converged;

        info!(
            "weighting solve level {idx} (h = {} mm) finished after {iters} iterations, residual {residual:e}",
            level.h
        );
    }

    if !converged {
        warn!(
            "weighting solve did not converge: residual {final_residual:e} after {total_iterations} iterations"
        );
    }

    let finest = *levels.last().expect("schedule always has at least one level");

    WeightingSolution {
        potential: v,
        h: finest.h,
        report: SolveReport {
            converged,
            iterations: total_iterations,
            final_residual,
            pinched_pixels: pinched.map_or(0, |mask| mask.iter().filter(|p| **p).count()),
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn relax_level(
    v: &mut Grid2D<f64>,
    tags: &Grid2D<CellTag>,
    eps: &Grid2D<f64>,
    h: f64,
    kappa: f64,
    chi: f64,
    n0: f64,
    m: f64,
    tolerance: f64,
    max_iterations: u64,
    undepleted: &mut Grid2D<bool>,
) -> (u64, f64, bool) {
    let mut iter = 0u64;
    let mut residual = f64::INFINITY;
    let mut converged = false;

    while iter < max_iterations {
        let max_delta = relax_sweep(v, tags, eps, h, kappa, chi, n0, m, undepleted);
        iter += 1;
        residual = max_delta;

        if iter % CONV_CHECK_ITER == 0 {
            debug!("sweep {iter}: max residual {max_delta:e}");
            if max_delta < tolerance {
                converged = true;
                break;
            }
        }
    }

    (iter, residual, converged)
}

#[allow(clippy::too_many_arguments)]
fn relax_sweep(
    v: &mut Grid2D<f64>,
    tags: &Grid2D<CellTag>,
    eps: &Grid2D<f64>,
    h: f64,
    kappa: f64,
    chi: f64,
    n0: f64,
    m: f64,
    undepleted: &mut Grid2D<bool>,
) -> f64 {
    let nr = v.nr();
    let nz = v.nz();
    let old = v.clone();
    let mut max_delta = 0.0_f64;
    let mut pinched_sum = 0.0_f64;
    let mut pinched_count = 0usize;

    for i in 0..nr {
        for k in 0..nz {
            let new_val = match tags[(i, k)] {
                CellTag::Fixed(val) => val,
                CellTag::Bulk => {
                    let jacobi = relax_bulk(&old, eps, i, k, h, kappa, chi, n0, m);
                    let raw = old[(i, k)] + SOR_ACC * (jacobi - old[(i, k)]);
                    if chi > 0.0 && raw < 0.0 {
                        undepleted[(i, k)] = true;
                        0.0
                    } else {
                        if chi > 0.0 {
                            undepleted[(i, k)] = false;
                        }
                        raw
                    }
                }
                CellTag::EdgeR(delta) => {
                    relax_edge(&old, eps, i, k, h, kappa, chi, n0, m, EdgeFace::RMinus, delta)
                }
                CellTag::EdgeZ(delta) => {
                    relax_edge(&old, eps, i, k, h, kappa, chi, n0, m, EdgeFace::ZMinus, delta)
                }
                CellTag::Pinched => {
                    let avg = adjacent_bulk_average(&old, tags, i, k);
                    pinched_sum += avg;
                    pinched_count += 1;
                    avg
                }
            };

            let delta = (new_val - old[(i, k)]).abs();
            if delta > max_delta {
                max_delta = delta;
            }
            v[(i, k)] = new_val;
        }
    }

    if pinched_count > 0 {
        let shared = pinched_sum / pinched_count as f64;
        for i in 0..nr {
            for k in 0..nz {
                if tags[(i, k)] == CellTag::Pinched {
                    v[(i, k)] = shared;
                }
            }
        }
    }

    max_delta
}

/// area-weighted average of a pixel's neighbors that are tagged BULK,
/// falling back to all four neighbors if none are
fn adjacent_bulk_average(v: &Grid2D<f64>, tags: &Grid2D<CellTag>, i: usize, k: usize) -> f64 {
    let nr = v.nr();
    let nz = v.nz();
    let mut neighbors = Vec::with_capacity(4);
    if i > 0 {
        neighbors.push((i - 1, k));
    }
    if i + 1 < nr {
        neighbors.push((i + 1, k));
    }
    if k > 0 {
        neighbors.push((i, k - 1));
    }
    if k + 1 < nz {
        neighbors.push((i, k + 1));
    }

    let bulk: Vec<f64> = neighbors
        .iter()
        .filter(|&&(ni, nk)| tags[(ni, nk)] == CellTag::Bulk)
        .map(|&(ni, nk)| v[(ni, nk)])
        .collect();

    let source = if bulk.is_empty() {
        neighbors.iter().map(|&(ni, nk)| v[(ni, nk)]).collect()
    } else {
        bulk
    };

    source.iter().sum::<f64>() / source.len().max(1) as f64
}

fn build_eps(geometry: &Geometry, level: &GridLevel) -> Grid2D<f64> {
    let mut eps: Grid2D<f64> = Grid2D::new(level.nr, level.nz);
    for i in 0..level.nr {
        for k in 0..level.nz {
            let r = i as f64 * level.h;
            let z = k as f64 * level.h;
            eps[(i, k)] = permittivity_at(geometry, r, z);
        }
    }
    eps
}

fn init_linear_guess(v: &mut Grid2D<f64>, geometry: &Geometry, level: &GridLevel, bias_v: f64) {
    for i in 0..level.nr {
        for k in 0..level.nz {
            let r = i as f64 * level.h;
            let z = k as f64 * level.h;
            let zn = (z / geometry.l_z).clamp(0.0, 1.0);
            let rn = (r / geometry.r_max).clamp(0.0, 1.0);
            v[(i, k)] = bias_v * zn * (1.0 - rn) + bias_v * rn;
        }
    }
}

fn compute_efield(v: &Grid2D<f64>, h: f64) -> (Grid2D<f64>, Grid2D<f64>) {
    let nr = v.nr();
    let nz = v.nz();
    let mut e_r: Grid2D<f64> = Grid2D::new(nr, nz);
    let mut e_z: Grid2D<f64> = Grid2D::new(nr, nz);

    for i in 0..nr {
        for k in 0..nz {
            let dvdr = if i == 0 {
                0.0
            } else if i + 1 < nr {
                (v[(i + 1, k)] - v[(i - 1, k)]) / (2.0 * h)
            } else {
                (v[(i, k)] - v[(i - 1, k)]) / h
            };

            let dvdz = if k == 0 {
                if k + 1 < nz {
                    (v[(i, k + 1)] - v[(i, k)]) / h
                } else {
                    0.0
                }
            } else if k + 1 < nz {
                (v[(i, k + 1)] - v[(i, k - 1)]) / (2.0 * h)
            } else {
                (v[(i, k)] - v[(i, k - 1)]) / h
            };

            e_r[(i, k)] = -dvdr * MM_PER_CM;
            e_z[(i, k)] = -dvdz * MM_PER_CM;
        }
    }

    (e_r, e_z)
}
