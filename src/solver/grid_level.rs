//! multi-grid schedule
//!
//! chooses a coarse-to-fine sequence of grid spacings and prolongates a
//! converged coarse solution onto the next finer level

use crate::field::grid::Grid2D;

/// one level of the multi-grid schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLevel {
    /// (mm) grid spacing at this level
    pub h: f64,
    /// number of nodes along r
    pub nr: usize,
    /// number of nodes along z
    pub nz: usize,
}

/// builds a 1, 2, or 3 level coarse-to-fine schedule ending at `h_final`
///
/// # Arguments
/// - `l_z`: `f64` (mm) axial length
/// - `r_max`: `f64` (mm) outer radius
/// - `h_final`: `f64` (mm) target (finest) grid spacing
///
/// # Returns
/// `Vec<GridLevel>`, coarsest first
pub fn schedule(l_z: f64, r_max: f64, h_final: f64) -> Vec<GridLevel> {
    let scale = (l_z * r_max).sqrt();
    let target_coarse_cells = 100.0_f64;

    let mut ratio = (scale / h_final / target_coarse_cells).round().max(1.0) as usize;

    // keep the schedule to at most 3 levels, each an integer refinement of
    // the last
    let mut ratios = Vec::new();
    while ratio > 1 && ratios.len() < 2 {
        let step = if ratio >= 4 { 4 } else { ratio };
        ratios.push(step);
        ratio /= step;
    }
    ratios.reverse();

    let mut levels = Vec::new();
    let mut h = h_final * ratios.iter().product::<usize>() as f64;
    levels.push(level_at(l_z, r_max, h));
    for r in ratios {
        h /= r as f64;
        levels.push(level_at(l_z, r_max, h));
    }

    levels
}

fn level_at(l_z: f64, r_max: f64, h: f64) -> GridLevel {
    GridLevel {
        h,
        nr: (r_max / h).floor() as usize + 1,
        nz: (l_z / h).floor() as usize + 1,
    }
}

/// prolongates a coarse potential onto a finer grid by bilinear
/// interpolation, one coarse pixel's four corners at a time
///
/// # Arguments
/// - `coarse`: `&Grid2D<f64>`
/// - `fine`: `&mut Grid2D<f64>`
/// - `ratio`: `usize` number of fine cells per coarse cell along each axis
///
/// # Returns
///
/// # Errors
pub fn prolongate(coarse: &Grid2D<f64>, fine: &mut Grid2D<f64>, ratio: usize) {
    let ratio = ratio.max(1);
    for ci in 0..coarse.nr() {
        for ck in 0..coarse.nz() {
            let fi0 = ci * ratio;
            let fk0 = ck * ratio;

            let v00 = coarse[(ci, ck)];
            let v10 = if ci + 1 < coarse.nr() {
                coarse[(ci + 1, ck)]
            } else {
                v00
            };
            let v01 = if ck + 1 < coarse.nz() {
                coarse[(ci, ck + 1)]
            } else {
                v00
            };
            let v11 = if ci + 1 < coarse.nr() && ck + 1 < coarse.nz() {
                coarse[(ci + 1, ck + 1)]
            } else {
                v00
            };

            for di in 0..=ratio {
                for dk in 0..=ratio {
                    let fi = fi0 + di;
                    let fk = fk0 + dk;
                    if fi >= fine.nr() || fk >= fine.nz() {
                        continue;
                    }
                    let tr = di as f64 / ratio as f64;
                    let tz = dk as f64 / ratio as f64;
                    fine[(fi, fk)] = (1.0 - tr) * (1.0 - tz) * v00
                        + tr * (1.0 - tz) * v10
                        + (1.0 - tr) * tz * v01
                        + tr * tz * v11;
                }
            }
        }
    }
}
