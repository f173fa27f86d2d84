//! geometry module
//!
//! describes the cross-sectional geometry of the simulated crystal and
//! decides whether a point lies inside the active volume

use crate::error::SimError;

/// `Geometry` struct
///
/// immutable cross-sectional description of a coaxial PPC/BEGe crystal
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// (mm) axial length
    pub l_z: f64,

    /// (mm) outer radius
    pub r_max: f64,

    /// (mm) top bullet radius, 0 if the top is not bulletized
    pub b_t: f64,

    /// (mm) point-contact length
    pub l_c: f64,

    /// (mm) point-contact radius
    pub r_c: f64,

    /// (mm) 45 degree bottom-taper length, 0 if untapered
    pub l_t: f64,

    /// (mm) wrap-around radius, 0 if there is no wrap-around contact
    pub r_w: f64,

    /// (mm) ditch depth, 0 if there is no ditch
    pub d_d: f64,

    /// (mm) ditch width, 0 if there is no ditch
    pub d_w: f64,
}

impl Geometry {
    /// `Geometry` constructor
    ///
    /// # Arguments
    /// - `l_z`: f64 (mm) axial length
    /// - `r_max`: f64 (mm) outer radius
    /// - `b_t`: f64 (mm) top bullet radius
    /// - `l_c`: f64 (mm) point-contact length
    /// - `r_c`: f64 (mm) point-contact radius
    /// - `l_t`: f64 (mm) bottom-taper length
    /// - `r_w`: f64 (mm) wrap-around radius
    /// - `d_d`: f64 (mm) ditch depth
    /// - `d_w`: f64 (mm) ditch width
    ///
    /// # Returns
    /// `Result<Geometry, SimError>`
    ///
    /// # Errors
    /// - `r_c` is negative, or exceeds `r_max`
    /// - `l_c` is negative, or exceeds `l_z`
    /// - both a wrap-around/ditch and a taper are meaningfully populated
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        l_z: f64,
        r_max: f64,
        b_t: f64,
        l_c: f64,
        r_c: f64,
        l_t: f64,
        r_w: f64,
        d_d: f64,
        d_w: f64,
    ) -> Result<Geometry, SimError> {
        if r_c < 0.0 || r_c > r_max {
            return Err(SimError::ConfigError(format!(
                "point-contact radius {r_c} must satisfy 0 <= pc_radius <= xtal_radius ({r_max})"
            )));
        }
        if l_c < 0.0 || l_c > l_z {
            return Err(SimError::ConfigError(format!(
                "point-contact length {l_c} must satisfy 0 <= pc_length <= xtal_length ({l_z})"
            )));
        }
        if l_t > 0.0 && (r_w > 0.0 || d_d > 0.0 || d_w > 0.0) {
            return Err(SimError::ConfigError(
                "taper_length and wrap_around_radius/ditch_depth/ditch_thickness are mutually exclusive"
                    .into(),
            ));
        }

        Ok(Geometry {
            l_z,
            r_max,
            b_t,
            l_c,
            r_c,
            l_t,
            r_w,
            d_d,
            d_w,
        })
    }

    /// decides whether a point given in cylindrical coordinates lies inside the
    /// active crystal volume
    ///
    /// # Arguments
    /// - `r`: f64 (mm) radial coordinate
    /// - `z`: f64 (mm) axial coordinate
    ///
    /// # Returns
    /// `bool`, true iff (r, z) is inside the crystal and outside every cavity
    pub fn inside(&self, r: f64, z: f64) -> bool {
        if !(0.0..self.l_z).contains(&z) || r > self.r_max {
            return false;
        }

        // bulletized top cap
        if self.b_t > 0.0 && z > self.l_z - self.b_t {
            let dz = z - (self.l_z - self.b_t);
            let bullet_limit =
                (self.r_max - self.b_t) + (self.b_t * self.b_t - dz * dz).max(0.0).sqrt();
            if r > bullet_limit {
                return false;
            }
        }

        // point-contact cavity
        if z <= self.l_c && r <= self.r_c {
            return false;
        }

        // 45 degree bottom taper
        if self.l_t > 0.0 && z < self.l_t && r > self.l_z - self.l_t + z {
            return false;
        }

        true
    }

    /// decides whether a cartesian point lies inside the active crystal volume
    ///
    /// # Arguments
    /// - `x`: f64 (mm)
    /// - `y`: f64 (mm)
    /// - `z`: f64 (mm)
    ///
    /// # Returns
    /// `bool`
    pub fn inside_xyz(&self, x: f64, y: f64, z: f64) -> bool {
        let r = (x * x + y * y).sqrt();
        self.inside(r, z)
    }
}
