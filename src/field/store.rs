//! field store
//!
//! holds the precomputed E-field and weighting-potential grids and performs
//! bilinear interpolation to arbitrary (r, z); this is the sole consumer of
//! the field/weighting-potential files the relaxation solver writes

use crate::error::SimError;
use crate::field::grid::Grid2D;
use crate::helpers::vec3::Vec3;
use crate::io::field_file::{parse_field_file, parse_wp_file};
use std::path::Path;

/// `FieldStore` struct
///
/// a cylindrically symmetric E-field grid and, optionally, a weighting-
/// potential grid, both addressed as x, y ↦ r = sqrt(x² + y²)
#[derive(Debug, Clone)]
pub struct FieldStore {
    r0: f64,
    z0: f64,
    dr: f64,
    dz: f64,
    e_r: Grid2D<f64>,
    e_z: Grid2D<f64>,
    wp: Option<Grid2D<f64>>,
}

impl FieldStore {
    /// loads the E-field grid (and, if present, the weighting-potential
    /// grid) from disk
    ///
    /// # Arguments
    /// - `field_path`: `&Path` path to the field file
    /// - `wp_path`: `Option<&Path>` path to the weighting-potential file
    ///
    /// # Returns
    /// `Result<FieldStore, SimError>`
    ///
    /// # Errors
    /// - either file cannot be read (`SimError::IoError`)
    /// - either file is structurally invalid (`SimError::MalformedTable`)
    /// - the field file does not describe a rectangular, ascending grid
    ///   (`SimError::MalformedTable`)
    pub fn load(field_path: &Path, wp_path: Option<&Path>) -> Result<FieldStore, SimError> {
        let rows = parse_field_file(field_path)?;
        let (r0, z0, dr, dz, nr, nz) = grid_shape(
            rows.iter().map(|r| r.r),
            rows.iter().map(|r| r.z),
            rows.len(),
        )?;

        let mut e_r: Grid2D<f64> = Grid2D::new(nr, nz);
        let mut e_z: Grid2D<f64> = Grid2D::new(nr, nz);
        for (n, row) in rows.iter().enumerate() {
            let i = n / nz;
            let k = n % nz;
            e_r[(i, k)] = row.e_r;
            e_z[(i, k)] = row.e_z;
        }

        let wp = match wp_path {
            Some(path) => {
                let wp_rows = parse_wp_file(path)?;
                let (wr0, wz0, wdr, wdz, wnr, wnz) = grid_shape(
                    wp_rows.iter().map(|r| r.r),
                    wp_rows.iter().map(|r| r.z),
                    wp_rows.len(),
                )?;
                if (wr0, wz0, wdr, wdz, wnr, wnz) != (r0, z0, dr, dz, nr, nz) {
                    return Err(SimError::MalformedTable(
                        "weighting-potential grid does not match field grid".into(),
                    ));
                }
                let mut grid: Grid2D<f64> = Grid2D::new(nr, nz);
                for (n, row) in wp_rows.iter().enumerate() {
                    let i = n / nz;
                    let k = n % nz;
                    grid[(i, k)] = row.wp;
                }
                Some(grid)
            }
            None => None,
        };

        Ok(FieldStore {
            r0,
            z0,
            dr,
            dz,
            e_r,
            e_z,
            wp,
        })
    }

    /// interpolates the E-field at `p`
    ///
    /// # Arguments
    /// - `p`: `Vec3` cartesian position in mm
    ///
    /// # Returns
    /// `Result<Vec3, SimError>` cartesian E-field in V/cm
    ///
    /// # Errors
    /// - `p` projects outside the loaded grid (`SimError::OutOfField`)
    pub fn efield_at(&self, p: Vec3) -> Result<Vec3, SimError> {
        let r = p.r();
        let (w00, w10, w01, w11, i, k) = self.weights(r, p.z)?;

        let er = bilinear(&self.e_r, w00, w10, w01, w11, i, k);
        let ez = bilinear(&self.e_z, w00, w10, w01, w11, i, k);

        let (cos_phi, sin_phi) = if r > 0.0 {
            (p.x / r, p.y / r)
        } else {
            (0.0, 0.0)
        };

        Ok(Vec3::new(er * cos_phi, er * sin_phi, ez))
    }

    /// interpolates the weighting potential at `p`
    ///
    /// # Arguments
    /// - `p`: `Vec3` cartesian position in mm
    ///
    /// # Returns
    /// `Result<f64, SimError>`, dimensionless, in [0, 1]
    ///
    /// # Errors
    /// - no weighting-potential grid was loaded (`SimError::OutOfField`)
    /// - `p` projects outside the loaded grid (`SimError::OutOfField`)
    pub fn wpotential_at(&self, p: Vec3) -> Result<f64, SimError> {
        let grid = self.wp.as_ref().ok_or(SimError::OutOfField {
            r: p.r(),
            z: p.z,
        })?;

        let (w00, w10, w01, w11, i, k) = self.weights(p.r(), p.z)?;
        Ok(bilinear(grid, w00, w10, w01, w11, i, k))
    }

    fn weights(&self, r: f64, z: f64) -> Result<(f64, f64, f64, f64, usize, usize), SimError> {
        let nr = self.e_r.nr();
        let nz = self.e_r.nz();

        let ru = (r - self.r0) / self.dr;
        let zu = (z - self.z0) / self.dz;

        if ru < 0.0 || zu < 0.0 || ru > (nr - 1) as f64 || zu > (nz - 1) as f64 {
            return Err(SimError::OutOfField { r, z });
        }

        let i = (ru.floor() as usize).min(nr.saturating_sub(2).max(0));
        let k = (zu.floor() as usize).min(nz.saturating_sub(2).max(0));

        let tr = (ru - i as f64).clamp(0.0, 1.0);
        let tz = (zu - k as f64).clamp(0.0, 1.0);

        let w00 = (1.0 - tr) * (1.0 - tz);
        let w10 = tr * (1.0 - tz);
        let w01 = (1.0 - tr) * tz;
        let w11 = tr * tz;

        Ok((w00, w10, w01, w11, i, k))
    }
}

fn bilinear(
    grid: &Grid2D<f64>,
    w00: f64,
    w10: f64,
    w01: f64,
    w11: f64,
    i: usize,
    k: usize,
) -> f64 {
    let i1 = (i + 1).min(grid.nr() - 1);
    let k1 = (k + 1).min(grid.nz() - 1);
    w00 * grid[(i, k)] + w10 * grid[(i1, k)] + w01 * grid[(i, k1)] + w11 * grid[(i1, k1)]
}

/// infers grid origin and spacing from a field/wp file's row ordering
///
/// rows are outer loop over r, inner loop over z; `z_values` repeats the
/// same ascending run `len / nz` times
fn grid_shape(
    r_values: impl Iterator<Item = f64>,
    z_values: impl Iterator<Item = f64>,
    len: usize,
) -> Result<(f64, f64, f64, f64, usize, usize), SimError> {
    let z_values: Vec<f64> = z_values.collect();
    let r_values: Vec<f64> = r_values.collect();

    if len == 0 {
        return Err(SimError::MalformedTable("empty grid file".into()));
    }

    let z0 = z_values[0];
    let nz = z_values
        .iter()
        .skip(1)
        .position(|&z| z <= z0)
        .map(|p| p + 1)
        .unwrap_or(z_values.len());

    if nz == 0 || len % nz != 0 {
        return Err(SimError::MalformedTable(
            "grid file rows do not form a rectangular grid".into(),
        ));
    }
    let nr = len / nz;

    let dz = if nz > 1 { z_values[1] - z0 } else { 1.0 };
    let r0 = r_values[0];
    let dr = if nr > 1 { r_values[nz] - r0 } else { 1.0 };

    if dz <= 0.0 || dr <= 0.0 {
        return Err(SimError::MalformedTable(
            "grid file is not ascending in r and z".into(),
        ));
    }

    Ok((r0, z0, dr, dz, nr, nz))
}
