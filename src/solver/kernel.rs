//! per-pixel classification and relaxation kernel
//!
//! the core Jacobi-like stencil shared by the bias (Poisson) and weighting
//! (Laplace) passes; only the space-charge term and the Dirichlet values
//! differ between the two

use crate::constants::{EPS_GE, EPS_VACUUM};
use crate::field::grid::Grid2D;
use crate::geometry::Geometry;

/// classification of a single grid pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellTag {
    /// ordinary pixel relaxed by the core stencil
    Bulk,
    /// Dirichlet boundary pixel holding a fixed potential
    Fixed(f64),
    /// pixel immediately outside the point contact's radius, where the true
    /// boundary falls between pixel centers; carries the sub-pixel distance
    /// (as a fraction of `h`) from this pixel to the boundary
    EdgeR(f64),
    /// as `EdgeR`, but the off-pixel boundary runs along z
    EdgeZ(f64),
    /// pixel in an undepleted island isolated from the point contact
    /// (weighting pass only)
    Pinched,
}

/// classifies every pixel of an (nr, nz) grid at spacing `h` against a
/// detector geometry
///
/// # Arguments
/// - `geometry`: `&Geometry`
/// - `nr`, `nz`: `usize` grid extents (node counts along r, z)
/// - `h`: `f64` grid spacing (mm)
/// - `bias_v`: `f64` value held by the outer electrode (0 for the
///   weighting pass)
/// - `contact_v`: `f64` value held by the point contact (0 for the bias
///   pass, 1 for the weighting pass)
/// - `pinched`: `Option<&Grid2D<bool>>` mask of pixels left undepleted by a
///   prior bias-pass solve, only consulted for the weighting pass
///
/// # Returns
/// `Grid2D<CellTag>`
pub fn classify(
    geometry: &Geometry,
    nr: usize,
    nz: usize,
    h: f64,
    bias_v: f64,
    contact_v: f64,
    pinched: Option<&Grid2D<bool>>,
) -> Grid2D<CellTag> {
    let mut tags: Grid2D<CellTag> = Grid2D::filled(nr, nz, CellTag::Bulk);

    for i in 0..nr {
        for k in 0..nz {
            let r = i as f64 * h;
            let z = k as f64 * h;

            let tag = if z <= geometry.l_c && r <= geometry.r_c {
                CellTag::Fixed(contact_v)
            } else if !geometry.inside(r, z) {
                CellTag::Fixed(bias_v)
            } else if z <= geometry.l_c && r > geometry.r_c && (r - geometry.r_c) < h {
                CellTag::EdgeR(((geometry.r_c / h) - (geometry.r_c / h).floor()).max(1e-6))
            } else if r <= geometry.r_c && z > geometry.l_c && (z - geometry.l_c) < h {
                CellTag::EdgeZ(((geometry.l_c / h) - (geometry.l_c / h).floor()).max(1e-6))
            } else if let Some(mask) = pinched {
                if mask[(i, k)] {
                    CellTag::Pinched
                } else {
                    CellTag::Bulk
                }
            } else {
                CellTag::Bulk
            };

            tags[(i, k)] = tag;
        }
    }

    tags
}

/// local relative permittivity at a pixel: vacuum inside the ditch, Ge
/// elsewhere
///
/// # Arguments
/// - `geometry`: `&Geometry`
/// - `r`, `z`: `f64` (mm) pixel position
///
/// # Returns
/// `f64`
pub fn permittivity_at(geometry: &Geometry, r: f64, z: f64) -> f64 {
    let in_ditch = geometry.d_w > 0.0
        && z <= geometry.d_d
        && r >= geometry.r_w
        && r <= geometry.r_w + geometry.d_w;
    if in_ditch {
        EPS_VACUUM
    } else {
        EPS_GE
    }
}

/// relaxes a single BULK pixel using the four-neighbor cylindrical stencil
///
/// # Arguments
/// - `v`: `&Grid2D<f64>` previous iterate (read-only, Jacobi style)
/// - `eps`: `&Grid2D<f64>` per-pixel relative permittivity
/// - `i`, `k`: `usize` pixel indices
/// - `h`: `f64` (mm) grid spacing
/// - `kappa`: `f64` bulk-charge-to-potential coefficient for this level
/// - `chi`: `f64` 1.0 for the bias (Poisson) pass, 0.0 for weighting
///   (Laplace)
/// - `n0`, `m`: `f64` impurity profile coefficients, rho(z) = n0 + m*z
///
/// # Returns
/// `f64` relaxed value at (i, k)
#[allow(clippy::too_many_arguments)]
pub fn relax_bulk(
    v: &Grid2D<f64>,
    eps: &Grid2D<f64>,
    i: usize,
    k: usize,
    h: f64,
    kappa: f64,
    chi: f64,
    n0: f64,
    m: f64,
) -> f64 {
    let nr = v.nr();
    let nz = v.nz();
    let r = i as f64 * h;

    let (w_rp, w_rm) = if r > 0.0 {
        (1.0 + 1.0 / (2.0 * r / h), 1.0 - 1.0 / (2.0 * r / h))
    } else {
        (1.0, 1.0)
    };

    let eps_here = eps[(i, k)];

    let (v_rp, eps_rp) = if i + 1 < nr {
        (v[(i + 1, k)], 0.5 * (eps_here + eps[(i + 1, k)]))
    } else {
        (v[(i, k)], eps_here)
    };

    let (v_rm, w_rm_eff, eps_rm) = if i > 0 {
        (v[(i - 1, k)], w_rm, 0.5 * (eps_here + eps[(i - 1, k)]))
    } else {
        // reflection symmetry at r=0: fold the missing r-1 neighbor onto r+1
        (v[(i + 1, k)], w_rp, eps_rp)
    };

    let (v_zp, eps_zp) = if k + 1 < nz {
        (v[(i, k + 1)], 0.5 * (eps_here + eps[(i, k + 1)]))
    } else {
        (v[(i, k)], eps_here)
    };

    let (v_zm, eps_zm) = if k > 0 {
        (v[(i, k - 1)], 0.5 * (eps_here + eps[(i, k - 1)]))
    } else {
        // reflection symmetry at z=0
        (v[(i, k + 1)], eps_zp)
    };

    let num = eps_rp * w_rp * v_rp
        + eps_rm * w_rm_eff * v_rm
        + eps_zp * v_zp
        + eps_zm * v_zm;
    let den = eps_rp * w_rp + eps_rm * w_rm_eff + eps_zp + eps_zm;

    let space_charge = chi * kappa * (n0 + m * z_of(k, h));
    num / den + space_charge
}

/// identifies which face of the four-neighbor stencil a sub-pixel boundary
/// weight scales; `classify` only ever produces an EDGE pixel on the side
/// facing r=0 or z=0, so the contact-side face is always the "minus" one
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeFace {
    /// the r-1 neighbor, used by `EdgeR` pixels (contact lies toward r=0)
    RMinus,
    /// the z-1 neighbor, used by `EdgeZ` pixels (contact lies toward z=0)
    ZMinus,
}

/// relaxes an EDGE_R/EDGE_Z pixel: the same four-neighbor cylindrical stencil
/// as `relax_bulk`, except the contact-side face term is scaled by
/// f = 1/(1-delta) and the bulk-charge volume is scaled by |2*delta|, per
/// SPEC_FULL.md 4.D
///
/// # Arguments
/// - `v`, `eps`, `i`, `k`, `h`, `kappa`, `chi`, `n0`, `m`: as `relax_bulk`
/// - `face`: `EdgeFace` which stencil face carries the contact boundary
/// - `delta`: `f64` sub-pixel distance from the pixel to the contact
///   boundary, as a fraction of `h`, in (0, 1)
///
/// # Returns
/// `f64` relaxed value at (i, k)
#[allow(clippy::too_many_arguments)]
pub fn relax_edge(
    v: &Grid2D<f64>,
    eps: &Grid2D<f64>,
    i: usize,
    k: usize,
    h: f64,
    kappa: f64,
    chi: f64,
    n0: f64,
    m: f64,
    face: EdgeFace,
    delta: f64,
) -> f64 {
    let nr = v.nr();
    let nz = v.nz();
    let r = i as f64 * h;

    let (w_rp, w_rm) = if r > 0.0 {
        (1.0 + 1.0 / (2.0 * r / h), 1.0 - 1.0 / (2.0 * r / h))
    } else {
        (1.0, 1.0)
    };

    let eps_here = eps[(i, k)];

    let (v_rp, eps_rp) = if i + 1 < nr {
        (v[(i + 1, k)], 0.5 * (eps_here + eps[(i + 1, k)]))
    } else {
        (v[(i, k)], eps_here)
    };

    let (v_rm, w_rm_eff, eps_rm) = if i > 0 {
        (v[(i - 1, k)], w_rm, 0.5 * (eps_here + eps[(i - 1, k)]))
    } else {
        (v[(i + 1, k)], w_rp, eps_rp)
    };

    let (v_zp, eps_zp) = if k + 1 < nz {
        (v[(i, k + 1)], 0.5 * (eps_here + eps[(i, k + 1)]))
    } else {
        (v[(i, k)], eps_here)
    };

    let (v_zm, eps_zm) = if k > 0 {
        (v[(i, k - 1)], 0.5 * (eps_here + eps[(i, k - 1)]))
    } else {
        (v[(i, k + 1)], eps_zp)
    };

    // f = 1/(1-delta): `classify` only tags a pixel EDGE_R/EDGE_Z when it lies
    // just outside the contact (delta in (0,1)), the "outside" case of 4.D
    let f = (1.0 / (1.0 - delta)).min(1.0e3);

    let (rp_term, rm_term, zp_term, zm_term) = match face {
        EdgeFace::RMinus => (eps_rp * w_rp, eps_rm * w_rm_eff * f, eps_zp, eps_zm),
        EdgeFace::ZMinus => (eps_rp * w_rp, eps_rm * w_rm_eff, eps_zp, eps_zm * f),
    };

    let num = rp_term * v_rp + rm_term * v_rm + zp_term * v_zp + zm_term * v_zm;
    let den = rp_term + rm_term + zp_term + zm_term;

    let space_charge = chi * kappa * (n0 + m * z_of(k, h)) * (2.0 * delta).abs();
    num / den + space_charge
}

fn z_of(k: usize, h: f64) -> f64 {
    k as f64 * h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_geometry() -> Geometry {
        Geometry::new(50.5, 34.5, 0.0, 2.1, 1.4, 0.0, 0.0, 0.0, 0.0).unwrap()
    }

    /// tests that the point contact is classified as a Dirichlet pixel
    ///
    /// # Errors
    /// - a point-contact pixel is not tagged `Fixed`
    #[test]
    fn classifies_point_contact_as_fixed() {
        let geom = flat_geometry();
        let tags = classify(&geom, 20, 60, 1.0, 2500.0, 0.0, None);
        assert_eq!(tags[(0, 0)], CellTag::Fixed(0.0));
    }

    /// tests that a point beyond the outer radius is classified as the bias
    /// electrode
    ///
    /// # Errors
    /// - a pixel outside the crystal is not tagged with the bias voltage
    #[test]
    fn classifies_outer_can_as_bias() {
        let geom = flat_geometry();
        let tags = classify(&geom, 40, 60, 1.0, 2500.0, 0.0, None);
        assert_eq!(tags[(39, 30)], CellTag::Fixed(2500.0));
    }

    /// tests that an interior bulk pixel relaxes toward the average of its
    /// neighbors when there is no space charge
    ///
    /// # Errors
    /// - the relaxed value is not the neighbor average for chi = 0
    #[test]
    fn bulk_relaxation_averages_neighbors_without_space_charge() {
        let mut v: Grid2D<f64> = Grid2D::new(5, 5);
        v[(2, 1)] = 1.0;
        v[(2, 3)] = 1.0;
        v[(1, 2)] = 1.0;
        v[(3, 2)] = 1.0;
        let eps: Grid2D<f64> = Grid2D::filled(5, 5, EPS_GE);

        let relaxed = relax_bulk(&v, &eps, 2, 2, 1.0, 1.0, 0.0, 0.0, 0.0);
        assert!((relaxed - 1.0).abs() < 1e-12);
    }

    /// tests that `relax_edge` pulls the relaxed value toward the r-1
    /// neighbor as `delta` shrinks the pixel's distance to the contact
    ///
    /// # Errors
    /// - a smaller `delta` does not increase the weight on the r-1 neighbor
    #[test]
    fn relax_edge_weights_contact_side_face_by_delta() {
        let mut v: Grid2D<f64> = Grid2D::new(5, 5);
        v[(1, 2)] = 0.0; // contact-side (r-1) neighbor
        v[(3, 2)] = 1.0;
        v[(2, 1)] = 1.0;
        v[(2, 3)] = 1.0;
        let eps: Grid2D<f64> = Grid2D::filled(5, 5, EPS_GE);

        let far = relax_edge(&v, &eps, 2, 2, 1.0, 1.0, 0.0, 0.0, 0.0, EdgeFace::RMinus, 0.1);
        let near = relax_edge(&v, &eps, 2, 2, 1.0, 1.0, 0.0, 0.0, 0.0, EdgeFace::RMinus, 0.9);
        assert!(near < far, "near-contact delta should pull harder toward the 0.0 neighbor");
    }

    /// tests that `relax_edge` scales the bulk-charge term by `|2*delta|`
    /// rather than applying it at full pixel volume
    ///
    /// # Errors
    /// - the space-charge contribution does not shrink as `delta` shrinks
    #[test]
    fn relax_edge_scales_space_charge_by_delta() {
        let v: Grid2D<f64> = Grid2D::new(5, 5);
        let eps: Grid2D<f64> = Grid2D::filled(5, 5, EPS_GE);

        let small_delta = relax_edge(&v, &eps, 2, 2, 1.0, 1.0, 1.0, 1.0, 0.0, EdgeFace::ZMinus, 0.1);
        let large_delta = relax_edge(&v, &eps, 2, 2, 1.0, 1.0, 1.0, 1.0, 0.0, EdgeFace::ZMinus, 0.9);
        assert!(small_delta.abs() < large_delta.abs());
    }
}
